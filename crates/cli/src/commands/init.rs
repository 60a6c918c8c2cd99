// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `init`: write a default configuration file

use anyhow::bail;
use orchestra_core::{Config, CONFIG_FILE_NAME};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let path = root.join(CONFIG_FILE_NAME);
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    std::fs::write(&path, Config::default_json())?;
    println!("wrote {}", path.display());
    Ok(())
}
