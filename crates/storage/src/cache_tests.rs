// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn cache() -> (TempDir, PromptCache) {
    let dir = TempDir::new().unwrap();
    let cache = PromptCache::new(dir.path());
    (dir, cache)
}

#[test]
fn put_then_get() {
    let (_dir, cache) = cache();
    cache.put("claude", "prompt one", "response one", 1_000).unwrap();
    assert_eq!(
        cache.get("claude", "prompt one", 1_500).as_deref(),
        Some("response one")
    );
    // Different backend, same prompt: distinct key.
    assert!(cache.get("codex", "prompt one", 1_500).is_none());
}

#[test]
fn entries_expire_after_ttl() {
    let (_dir, cache) = cache();
    let cache = cache.with_ttl(std::time::Duration::from_millis(100));
    cache.put("claude", "p", "r", 1_000).unwrap();
    assert!(cache.get("claude", "p", 1_050).is_some());
    assert!(cache.get("claude", "p", 2_000).is_none());
    // Expired entries are removed from disk.
    assert_eq!(cache.stats().unwrap().entries, 0);
}

#[test]
fn eviction_drops_least_recently_used() {
    let (_dir, cache) = cache();
    let cache = cache.with_max_entries(2);
    cache.put("b", "p1", "r1", 1_000).unwrap();
    cache.put("b", "p2", "r2", 1_001).unwrap();
    // Refresh p1 so p2 becomes the LRU entry.
    cache.get("b", "p1", 1_100);
    cache.put("b", "p3", "r3", 1_200).unwrap();

    assert!(cache.get("b", "p1", 1_300).is_some());
    assert!(cache.get("b", "p2", 1_300).is_none());
    assert!(cache.get("b", "p3", 1_300).is_some());
    assert_eq!(cache.stats().unwrap().entries, 2);
}

#[test]
fn stats_and_list_reflect_hits() {
    let (_dir, cache) = cache();
    cache.put("claude", "p", "four", 1_000).unwrap();
    cache.get("claude", "p", 1_001);
    cache.get("claude", "p", 1_002);

    let stats = cache.stats().unwrap();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.total_bytes, 4);
    assert_eq!(stats.total_hits, 2);

    let listing = cache.list().unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].backend, "claude");
    assert_eq!(listing[0].hits, 2);
    assert_eq!(listing[0].response_bytes, 4);
}

#[test]
fn clear_empties_the_cache() {
    let (_dir, cache) = cache();
    cache.put("a", "p1", "r", 1_000).unwrap();
    cache.put("a", "p2", "r", 1_000).unwrap();
    assert_eq!(cache.clear().unwrap(), 2);
    assert_eq!(cache.stats().unwrap().entries, 0);
    assert_eq!(cache.clear().unwrap(), 0);
}

#[test]
fn keys_are_stable_and_distinct() {
    let a = PromptCache::key("claude", "x");
    let b = PromptCache::key("claude", "x");
    let c = PromptCache::key("claude", "y");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 64);
}
