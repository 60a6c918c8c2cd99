// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File checkpoints
//!
//! A checkpoint snapshots the plan's working files immediately before a
//! mutating phase: blob copies plus a sha256 manifest. Reverting restores
//! byte-identical contents, deleting files that did not exist at snapshot
//! time.

use crate::store::{SessionStore, StoreError};
use orchestra_core::{CheckpointId, CheckpointMeta, Clock, IdGen, Session};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const CHECKPOINTS_DIR: &str = "checkpoints";
const MANIFEST_FILE: &str = "manifest.json";

/// One snapshotted path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointFile {
    pub path: String,
    /// sha256 of the snapshot, empty for absent files.
    pub hash: String,
    /// False when the working file did not exist at snapshot time.
    pub stored: bool,
    /// Blob file name inside the checkpoint dir, when stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointManifest {
    pub id: CheckpointId,
    pub label: String,
    pub created_at_ms: u64,
    pub files: Vec<CheckpointFile>,
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl<C: Clock> SessionStore<C> {
    fn checkpoint_dir(&self, session: &Session, id: &CheckpointId) -> PathBuf {
        self.session_dir(&session.id)
            .join(CHECKPOINTS_DIR)
            .join(id.as_str())
    }

    /// Snapshot `paths` (relative to `project_root`) into a new checkpoint
    /// and record it on the session.
    pub fn create_checkpoint(
        &self,
        session: &mut Session,
        project_root: &Path,
        label: &str,
        paths: &[String],
        ids: &impl IdGen,
    ) -> Result<CheckpointMeta, StoreError> {
        let id = CheckpointId::new(ids.next());
        let dir = self.checkpoint_dir(session, &id);
        let files_dir = dir.join("files");
        std::fs::create_dir_all(&files_dir)?;

        let mut files = Vec::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            let source = project_root.join(path);
            if source.is_file() {
                let bytes = std::fs::read(&source)?;
                let blob = format!("{index:04}");
                std::fs::write(files_dir.join(&blob), &bytes)?;
                files.push(CheckpointFile {
                    path: path.clone(),
                    hash: hash_bytes(&bytes),
                    stored: true,
                    blob: Some(blob),
                });
            } else {
                files.push(CheckpointFile {
                    path: path.clone(),
                    hash: String::new(),
                    stored: false,
                    blob: None,
                });
            }
        }

        let manifest = CheckpointManifest {
            id: id.clone(),
            label: label.to_string(),
            created_at_ms: self.clock().epoch_ms(),
            files,
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;
        std::fs::write(dir.join(MANIFEST_FILE), manifest_bytes)?;

        let meta = CheckpointMeta {
            id,
            label: label.to_string(),
            created_at_ms: manifest.created_at_ms,
            files: paths.to_vec(),
        };
        session.checkpoints.push(meta.clone());
        self.save(session)?;
        tracing::info!(
            session = %session.id,
            checkpoint = %meta.id,
            label,
            files = paths.len(),
            "checkpoint created"
        );
        Ok(meta)
    }

    pub fn load_checkpoint(
        &self,
        session: &Session,
        id: &CheckpointId,
    ) -> Result<CheckpointManifest, StoreError> {
        let path = self.checkpoint_dir(session, id).join(MANIFEST_FILE);
        if !path.exists() {
            return Err(StoreError::CheckpointNotFound(id.to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Restore every file of the checkpoint into the working tree. Returns
    /// the number of paths touched.
    pub fn revert_to(
        &self,
        session: &Session,
        project_root: &Path,
        id: &CheckpointId,
    ) -> Result<usize, StoreError> {
        let manifest = self.load_checkpoint(session, id)?;
        let files_dir = self.checkpoint_dir(session, id).join("files");
        let mut touched = 0;
        for file in &manifest.files {
            let target = project_root.join(&file.path);
            match (&file.blob, file.stored) {
                (Some(blob), true) => {
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::copy(files_dir.join(blob), &target)?;
                    touched += 1;
                }
                _ => {
                    // The file did not exist at snapshot time.
                    if target.exists() {
                        std::fs::remove_file(&target)?;
                        touched += 1;
                    }
                }
            }
        }
        tracing::info!(
            session = %session.id,
            checkpoint = %id,
            touched,
            "checkpoint restored"
        );
        Ok(touched)
    }

    /// Restore a single file from the checkpoint, when snapshotted.
    pub fn revert_file(
        &self,
        session: &Session,
        project_root: &Path,
        id: &CheckpointId,
        path: &str,
    ) -> Result<bool, StoreError> {
        let manifest = self.load_checkpoint(session, id)?;
        let files_dir = self.checkpoint_dir(session, id).join("files");
        let Some(file) = manifest.files.iter().find(|f| f.path == path) else {
            return Ok(false);
        };
        let target = project_root.join(&file.path);
        if let (Some(blob), true) = (&file.blob, file.stored) {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(files_dir.join(blob), &target)?;
        } else if target.exists() {
            std::fs::remove_file(&target)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
