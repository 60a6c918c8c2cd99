// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

#[test]
fn new_and_as_str() {
    let id = SessionId::new("abc-123");
    assert_eq!(id.as_str(), "abc-123");
    assert_eq!(id.to_string(), "abc-123");
}

#[test]
fn short_truncates() {
    let id = SessionId::new("0123456789abcdef");
    assert_eq!(id.short(8), "01234567");
    assert_eq!(id.short(99), "0123456789abcdef");
}

#[test]
fn from_str_and_string() {
    let a: BackendId = "claude".into();
    let b: BackendId = String::from("claude").into();
    assert_eq!(a, b);
}

#[test]
fn borrow_enables_str_lookup() {
    let mut map = HashMap::new();
    map.insert(BackendId::new("gemini"), 1);
    assert_eq!(map.get("gemini"), Some(&1));
}

#[test]
fn uuid_gen_is_unique() {
    let gen = UuidIdGen;
    assert_ne!(gen.next(), gen.next());
}

#[test]
fn seq_gen_counts_up() {
    let gen = SeqIdGen::default();
    assert_eq!(gen.next(), "id-0");
    assert_eq!(gen.next(), "id-1");
    let clone = gen.clone();
    assert_eq!(clone.next(), "id-2");
}
