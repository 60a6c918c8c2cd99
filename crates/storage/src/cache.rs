// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt cache
//!
//! Optional optimization: identical (backend, prompt) pairs reuse the last
//! response. Process-local policy with bounded eviction: entries expire
//! after a TTL and the least-recently-used entries are dropped beyond the
//! size cap. Never consulted inside the audit loop, so observable kernel
//! behavior is unchanged.

use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CACHE_DIR: &str = "cache";

const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_MAX_ENTRIES: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    backend: String,
    created_at_ms: u64,
    last_used_ms: u64,
    hits: u64,
    response: String,
}

/// Listing row for `orchestra cache --list`.
#[derive(Debug, Clone)]
pub struct CacheEntryMeta {
    pub key: String,
    pub backend: String,
    pub created_at_ms: u64,
    pub hits: u64,
    pub response_bytes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub total_hits: u64,
}

/// Disk-backed prompt cache under `.orchestra/cache/`.
pub struct PromptCache {
    dir: PathBuf,
    ttl: Duration,
    max_entries: usize,
}

impl PromptCache {
    /// `store_root` is the `.orchestra` directory.
    pub fn new(store_root: &Path) -> Self {
        Self {
            dir: store_root.join(CACHE_DIR),
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn key(backend: &str, prompt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(backend.as_bytes());
        hasher.update(b"\0");
        hasher.update(prompt.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn read_entry(&self, path: &Path) -> Option<CacheEntry> {
        let raw = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Cached response, if fresh. Bumps hit count and recency best-effort.
    pub fn get(&self, backend: &str, prompt: &str, now_ms: u64) -> Option<String> {
        let key = Self::key(backend, prompt);
        let path = self.entry_path(&key);
        let mut entry = self.read_entry(&path)?;
        if now_ms.saturating_sub(entry.created_at_ms) > self.ttl.as_millis() as u64 {
            let _ = std::fs::remove_file(&path);
            return None;
        }
        entry.hits += 1;
        entry.last_used_ms = now_ms;
        if let Ok(bytes) = serde_json::to_vec(&entry) {
            let _ = std::fs::write(&path, bytes);
        }
        Some(entry.response)
    }

    pub fn put(
        &self,
        backend: &str,
        prompt: &str,
        response: &str,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let key = Self::key(backend, prompt);
        let entry = CacheEntry {
            key: key.clone(),
            backend: backend.to_string(),
            created_at_ms: now_ms,
            last_used_ms: now_ms,
            hits: 0,
            response: response.to_string(),
        };
        std::fs::write(self.entry_path(&key), serde_json::to_vec(&entry)?)?;
        self.evict()?;
        Ok(())
    }

    /// Drop least-recently-used entries beyond the cap.
    fn evict(&self) -> Result<(), StoreError> {
        let mut entries = self.load_all()?;
        if entries.len() <= self.max_entries {
            return Ok(());
        }
        entries.sort_by_key(|e| e.last_used_ms);
        let excess = entries.len() - self.max_entries;
        for entry in entries.into_iter().take(excess) {
            let _ = std::fs::remove_file(self.entry_path(&entry.key));
        }
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<CacheEntry>, StoreError> {
        let mut entries = Vec::new();
        if !self.dir.exists() {
            return Ok(entries);
        }
        for file in std::fs::read_dir(&self.dir)? {
            let path = file?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(entry) = self.read_entry(&path) {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    pub fn stats(&self) -> Result<CacheStats, StoreError> {
        let entries = self.load_all()?;
        Ok(CacheStats {
            entries: entries.len(),
            total_bytes: entries.iter().map(|e| e.response.len() as u64).sum(),
            total_hits: entries.iter().map(|e| e.hits).sum(),
        })
    }

    pub fn list(&self) -> Result<Vec<CacheEntryMeta>, StoreError> {
        let mut entries = self.load_all()?;
        entries.sort_by(|a, b| b.last_used_ms.cmp(&a.last_used_ms));
        Ok(entries
            .into_iter()
            .map(|e| CacheEntryMeta {
                key: e.key,
                backend: e.backend,
                created_at_ms: e.created_at_ms,
                hits: e.hits,
                response_bytes: e.response.len(),
            })
            .collect())
    }

    pub fn clear(&self) -> Result<usize, StoreError> {
        let entries = self.load_all()?;
        let count = entries.len();
        for entry in entries {
            let _ = std::fs::remove_file(self.entry_path(&entry.key));
        }
        Ok(count)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
