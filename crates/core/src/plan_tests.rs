// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const PLAN: &str = "\
# Plan

Some narrative about the approach.

## FILE: src/lib.rs

Library root with the public API.
Re-exports the parser module.

## FILE: src/parser.rs

Tokenizer and recursive-descent parser.

### FILE: tests/parser_test.rs
";

#[test]
fn parses_heading_directives_in_order() {
    let directives = parse_plan(PLAN);
    assert_eq!(
        directives.iter().map(|d| d.path.as_str()).collect::<Vec<_>>(),
        ["src/lib.rs", "src/parser.rs", "tests/parser_test.rs"]
    );
    assert_eq!(
        directives[0].summary,
        "Library root with the public API. Re-exports the parser module."
    );
    assert_eq!(directives[2].summary, "");
}

#[test]
fn parses_bullet_directives() {
    let plan = "\
Files to create:

- `src/main.rs` — CLI entry point
- `src/config.rs`: configuration loading
* `README.md`
";
    let directives = parse_plan(plan);
    assert_eq!(
        directives.iter().map(|d| d.path.as_str()).collect::<Vec<_>>(),
        ["src/main.rs", "src/config.rs", "README.md"]
    );
    assert_eq!(directives[0].summary, "CLI entry point");
    assert_eq!(directives[1].summary, "configuration loading");
    assert_eq!(directives[2].summary, "");
}

#[test]
fn duplicate_paths_keep_first() {
    let plan = "## FILE: a.py\nfirst\n## FILE: a.py\nsecond\n";
    let directives = parse_plan(plan);
    assert_eq!(directives.len(), 1);
    assert_eq!(directives[0].summary, "first");
}

#[test]
fn narrative_without_directives_yields_empty() {
    assert!(parse_plan("just words\n\nand more words").is_empty());
    assert!(plan_paths("").is_empty());
}

#[test]
fn mixed_forms_preserve_order() {
    let plan = "- `first.go` — one\n## FILE: second.go\ntwo\n";
    assert_eq!(plan_paths(plan), ["first.go", "second.go"]);
}

#[test]
fn serialize_then_parse_round_trips_paths() {
    let directives = parse_plan(PLAN);
    let rendered = serialize_plan(&directives);
    let reparsed = parse_plan(&rendered);
    assert_eq!(
        reparsed.iter().map(|d| d.path.as_str()).collect::<Vec<_>>(),
        directives.iter().map(|d| d.path.as_str()).collect::<Vec<_>>()
    );
    // Summaries survive the round trip too.
    assert_eq!(reparsed[0].summary, directives[0].summary);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn path_strategy() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,8}(/[a-z][a-z0-9_]{0,8}){0,2}\\.[a-z]{1,3}"
    }

    proptest! {
        #[test]
        fn round_trip_preserves_ordered_paths(
            paths in proptest::collection::vec(path_strategy(), 0..8)
        ) {
            let directives: Vec<FileDirective> = paths
                .iter()
                .map(|p| FileDirective { path: p.clone(), summary: "does a thing.".into() })
                .collect();
            let rendered = serialize_plan(&directives);
            let mut expected: Vec<String> = Vec::new();
            for p in &paths {
                if !expected.contains(p) {
                    expected.push(p.clone());
                }
            }
            prop_assert_eq!(plan_paths(&rendered), expected);
        }
    }
}
