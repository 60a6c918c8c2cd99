// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::store::SessionStore;
use orchestra_core::{FakeClock, SeqIdGen};
use tempfile::TempDir;

struct Fixture {
    project: TempDir,
    store: SessionStore<FakeClock>,
    session: Session,
    ids: SeqIdGen,
}

fn fixture() -> Fixture {
    let project = TempDir::new().unwrap();
    let store = SessionStore::new(project.path(), FakeClock::at(500));
    let ids = SeqIdGen::default();
    let session = store.create("task", &ids).unwrap();
    Fixture {
        project,
        store,
        session,
        ids,
    }
}

#[test]
fn snapshot_and_revert_restores_bytes() {
    let mut fx = fixture();
    let file = fx.project.path().join("src/main.py");
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(&file, b"original contents\n").unwrap();

    let meta = fx
        .store
        .create_checkpoint(
            &mut fx.session,
            fx.project.path(),
            "before-executing",
            &["src/main.py".to_string()],
            &fx.ids,
        )
        .unwrap();

    std::fs::write(&file, b"mutated by executor").unwrap();
    let touched = fx
        .store
        .revert_to(&fx.session, fx.project.path(), &meta.id)
        .unwrap();

    assert_eq!(touched, 1);
    assert_eq!(std::fs::read(&file).unwrap(), b"original contents\n");
}

#[test]
fn revert_deletes_files_absent_at_snapshot_time() {
    let mut fx = fixture();
    let meta = fx
        .store
        .create_checkpoint(
            &mut fx.session,
            fx.project.path(),
            "pre",
            &["new.py".to_string()],
            &fx.ids,
        )
        .unwrap();

    let file = fx.project.path().join("new.py");
    std::fs::write(&file, b"generated later").unwrap();
    fx.store
        .revert_to(&fx.session, fx.project.path(), &meta.id)
        .unwrap();
    assert!(!file.exists());
}

#[test]
fn manifest_records_hashes() {
    let mut fx = fixture();
    let file = fx.project.path().join("a.txt");
    std::fs::write(&file, b"abc").unwrap();
    let meta = fx
        .store
        .create_checkpoint(
            &mut fx.session,
            fx.project.path(),
            "label",
            &["a.txt".to_string(), "missing.txt".to_string()],
            &fx.ids,
        )
        .unwrap();

    let manifest = fx.store.load_checkpoint(&fx.session, &meta.id).unwrap();
    assert_eq!(manifest.label, "label");
    assert_eq!(manifest.files.len(), 2);
    assert_eq!(manifest.files[0].hash, hash_bytes(b"abc"));
    assert!(manifest.files[0].stored);
    assert!(!manifest.files[1].stored);
    assert!(manifest.files[1].hash.is_empty());
}

#[test]
fn checkpoint_meta_recorded_on_session() {
    let mut fx = fixture();
    fx.store
        .create_checkpoint(&mut fx.session, fx.project.path(), "one", &[], &fx.ids)
        .unwrap();
    let loaded = fx.store.load(fx.session.id.as_str()).unwrap().unwrap();
    assert_eq!(loaded.checkpoints.len(), 1);
    assert_eq!(loaded.checkpoints[0].label, "one");
}

#[test]
fn revert_single_file() {
    let mut fx = fixture();
    let keep = fx.project.path().join("keep.rs");
    let other = fx.project.path().join("other.rs");
    std::fs::write(&keep, b"keep v1").unwrap();
    std::fs::write(&other, b"other v1").unwrap();
    let meta = fx
        .store
        .create_checkpoint(
            &mut fx.session,
            fx.project.path(),
            "pre",
            &["keep.rs".to_string(), "other.rs".to_string()],
            &fx.ids,
        )
        .unwrap();

    std::fs::write(&keep, b"keep v2").unwrap();
    std::fs::write(&other, b"other v2").unwrap();

    assert!(fx
        .store
        .revert_file(&fx.session, fx.project.path(), &meta.id, "keep.rs")
        .unwrap());
    assert_eq!(std::fs::read(&keep).unwrap(), b"keep v1");
    // Untouched path keeps its edits.
    assert_eq!(std::fs::read(&other).unwrap(), b"other v2");

    assert!(!fx
        .store
        .revert_file(&fx.session, fx.project.path(), &meta.id, "unknown.rs")
        .unwrap());
}

#[test]
fn missing_checkpoint_is_an_error() {
    let fx = fixture();
    let err = fx
        .store
        .load_checkpoint(&fx.session, &CheckpointId::new("nope"))
        .unwrap_err();
    assert!(matches!(err, StoreError::CheckpointNotFound(_)));
}
