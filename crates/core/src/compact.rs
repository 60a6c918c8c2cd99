// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context compaction
//!
//! A deterministic five-stage reduction applied when a backend rejects a
//! prompt as too large: whitespace collapse, duplicate-sentence
//! elimination, code-block summarization, verbose-phrase stripping, and a
//! conditional aggressive summarization pass. Compacting already-compacted
//! text is a no-op, and the pipeline never fails.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Default reduction target: keep at most half of the input.
pub const DEFAULT_TARGET: f64 = 0.5;

/// Code blocks longer than this are summarized.
const CODE_SUMMARY_THRESHOLD: usize = 500;

/// Sentences shorter than this are treated as noise fragments.
const MIN_SENTENCE_LEN: usize = 5;

/// Aggressive summarization never keeps fewer sentences than this, unless
/// the input has fewer.
const SENTENCE_FLOOR: usize = 10;

/// Minimum score for a sentence to survive aggressive summarization.
const KEEP_SCORE: i32 = 2;

const ELISION_MARKER: &str = "// ... (code omitted for brevity) ...";

/// Result of one compaction call.
#[derive(Debug, Clone, PartialEq)]
pub struct Compaction {
    pub compacted: String,
    pub original_len: usize,
    pub compacted_len: usize,
    pub reduction_percent: f64,
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}

/// Whether `text` risks exceeding a backend's context window. Uses an 80%
/// safety margin because estimates undercount for non-ASCII input.
pub fn would_exceed(text: &str, limit: u64) -> bool {
    estimate_tokens(text) * 10 > limit * 8
}

/// Compact `text`, aiming to reduce it by `target` (a fraction in 0..1).
///
/// Stages 1-4 always run; the aggressive fifth stage runs only when they
/// fall short of the target. Idempotent on its own output.
pub fn compact(text: &str, target: f64) -> Compaction {
    let target = target.clamp(0.0, 0.95);
    let original_len = text.len();

    // Stages 1-4, run to a fixpoint: stripping a filler phrase can expose a
    // sentence that stage 2 would now drop, and idempotence requires that
    // the output is stable under the whole pipeline.
    let mut current = text.to_string();
    for _ in 0..8 {
        let next = reduce_once(&current);
        if next == current {
            break;
        }
        current = next;
    }

    let realized = reduction(original_len, current.len());
    let compacted = if realized < target {
        let mut segments = split_fenced(&current);
        aggressive_summarize(&mut segments);
        reassemble(&segments)
    } else {
        current
    };

    let compacted_len = compacted.len();
    Compaction {
        reduction_percent: reduction(original_len, compacted_len) * 100.0,
        compacted,
        original_len,
        compacted_len,
    }
}

/// One round of stages 1-4.
fn reduce_once(text: &str) -> String {
    let mut segments = split_fenced(text);
    for segment in &mut segments {
        match segment {
            Segment::Text(body) => *body = collapse_whitespace(body),
            Segment::Code { .. } => {}
        }
    }
    dedupe_sentences(&mut segments);
    for segment in &mut segments {
        match segment {
            Segment::Code { body, .. } => summarize_code_body(body),
            Segment::Text(body) => *body = strip_filler(body),
        }
    }
    reassemble(&segments)
}

fn reduction(original: usize, current: usize) -> f64 {
    if original == 0 {
        0.0
    } else {
        1.0 - current as f64 / original as f64
    }
}

// ---------------------------------------------------------------------------
// Segmentation: fenced code blocks are carried through the text stages intact.
// ---------------------------------------------------------------------------

enum Segment {
    Text(String),
    Code {
        /// Opening fence line, including the language tag.
        fence: String,
        body: Vec<String>,
    },
}

fn split_fenced(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text_buf = Vec::new();
    let mut code: Option<(String, Vec<String>)> = None;

    for line in text.lines() {
        if let Some((fence, mut body)) = code.take() {
            if line.trim() == "```" {
                segments.push(Segment::Code { fence, body });
            } else {
                body.push(line.to_string());
                code = Some((fence, body));
            }
        } else if line.trim_start().starts_with("```") {
            if !text_buf.is_empty() {
                segments.push(Segment::Text(text_buf.join("\n")));
                text_buf.clear();
            }
            code = Some((line.trim_start().to_string(), Vec::new()));
        } else {
            text_buf.push(line);
        }
    }
    // Unclosed fence: keep what we have as a code segment.
    if let Some((fence, body)) = code {
        segments.push(Segment::Code { fence, body });
    }
    if !text_buf.is_empty() {
        segments.push(Segment::Text(text_buf.join("\n")));
    }
    segments
}

fn reassemble(segments: &[Segment]) -> String {
    let mut parts = Vec::new();
    for segment in segments {
        match segment {
            Segment::Text(body) => {
                if !body.trim().is_empty() {
                    parts.push(body.trim().to_string());
                }
            }
            Segment::Code { fence, body } => {
                let mut block = String::new();
                block.push_str(fence);
                for line in body {
                    block.push('\n');
                    block.push_str(line);
                }
                block.push_str("\n```");
                parts.push(block);
            }
        }
    }
    parts.join("\n\n")
}

// ---------------------------------------------------------------------------
// Stage 1: whitespace collapse
// ---------------------------------------------------------------------------

fn collapse_whitespace(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut blank_run = 0usize;
    for line in text.lines() {
        let collapsed: String = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            if blank_run == 1 {
                out.push(String::new());
            }
        } else {
            blank_run = 0;
            out.push(collapsed);
        }
    }
    out.join("\n").trim().to_string()
}

// ---------------------------------------------------------------------------
// Stage 2: duplicate-sentence elimination (seen-set is global across text)
// ---------------------------------------------------------------------------

fn dedupe_sentences(segments: &mut [Segment]) {
    let mut seen = HashSet::new();
    for segment in segments {
        if let Segment::Text(body) = segment {
            let paragraphs: Vec<String> = body
                .split("\n\n")
                .filter_map(|paragraph| {
                    let kept: Vec<String> = split_sentences(paragraph)
                        .into_iter()
                        .filter(|sentence| {
                            let trimmed = sentence.trim();
                            if trimmed.len() < MIN_SENTENCE_LEN {
                                return false;
                            }
                            seen.insert(normalize_sentence(trimmed))
                        })
                        .map(|s| s.trim().to_string())
                        .collect();
                    (!kept.is_empty()).then(|| kept.join(" "))
                })
                .collect();
            *body = paragraphs.join("\n\n");
        }
    }
}

/// Split on sentence terminators, keeping the terminator with the sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().is_none_or(|next| next.is_whitespace());
            if at_boundary {
                sentences.push(current.clone());
                current.clear();
            }
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current);
    }
    sentences
}

fn normalize_sentence(sentence: &str) -> String {
    sentence
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Stage 3: code-block summarization
// ---------------------------------------------------------------------------

fn summarize_code_body(body: &mut Vec<String>) {
    let chars: usize = body.iter().map(|l| l.len() + 1).sum();
    if chars <= CODE_SUMMARY_THRESHOLD || body.len() <= 9 {
        return;
    }
    let mut summarized: Vec<String> = body[..5].to_vec();
    summarized.push(ELISION_MARKER.to_string());
    summarized.extend_from_slice(&body[body.len() - 3..]);
    *body = summarized;
}

// ---------------------------------------------------------------------------
// Stage 4: verbose-phrase stripping
// ---------------------------------------------------------------------------

#[allow(clippy::expect_used)]
static FILLER: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)\b(please note that|it is important to|it should be noted that|as mentioned earlier,?|make sure to|be sure to|keep in mind that|in order to|feel free to|it goes without saying that)\s+",
    )
    .expect("constant regex pattern is valid")
});

fn strip_filler(text: &str) -> String {
    // Stripping can expose a new leading match, so run to a fixpoint.
    let mut current = text.to_string();
    for _ in 0..8 {
        let next = FILLER.replace_all(&current, "").to_string();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

// ---------------------------------------------------------------------------
// Stage 5: aggressive summarization (conditional)
// ---------------------------------------------------------------------------

#[allow(clippy::expect_used)]
static ACTION_VERBS: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)\b(create|add|implement|write|fix|update|remove|delete|ensure|use|return|define|test|run|generate|refactor|validate|build|parse|handle)\b",
    )
    .expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static REQUIREMENT_WORDS: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)\b(must|should|required|shall|needs? to|have to)\b")
        .expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static CODE_REFERENCE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"`[^`]+`|\b[\w/-]+\.[a-z]{1,4}\b|::|\(\)")
        .expect("constant regex pattern is valid")
});

fn score_sentence(sentence: &str) -> i32 {
    let mut score = 0;
    if ACTION_VERBS.is_match(sentence) {
        score += 3;
    }
    if REQUIREMENT_WORDS.is_match(sentence) {
        score += 2;
    }
    if CODE_REFERENCE.is_match(sentence) {
        score += 2;
    }
    if sentence.len() > 200 {
        score -= 1;
    }
    score
}

/// A sentence with its position, preserved so survivors keep original order
/// and paragraph boundaries.
struct Scored {
    segment: usize,
    paragraph: usize,
    text: String,
    score: i32,
}

/// Keep the sentences that carry instructions: every sentence scoring at
/// least [`KEEP_SCORE`] survives, topped up to a floor of ten survivors so
/// short prompts are never gutted. Code blocks and paragraph boundaries are
/// untouched. The rule is pointwise, which is what makes re-compaction a
/// no-op.
fn aggressive_summarize(segments: &mut [Segment]) {
    let mut sentences: Vec<Scored> = Vec::new();
    for (seg_idx, segment) in segments.iter().enumerate() {
        if let Segment::Text(body) = segment {
            for (para_idx, paragraph) in body.split("\n\n").enumerate() {
                for sentence in split_sentences(paragraph) {
                    let trimmed = sentence.trim().to_string();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let score = score_sentence(&trimmed);
                    sentences.push(Scored {
                        segment: seg_idx,
                        paragraph: para_idx,
                        text: trimmed,
                        score,
                    });
                }
            }
        }
    }

    let total = sentences.len();
    let floor = SENTENCE_FLOOR.min(total);
    let mut keep: Vec<bool> = sentences.iter().map(|s| s.score >= KEEP_SCORE).collect();
    let mut kept = keep.iter().filter(|k| **k).count();
    if kept < floor {
        // Top up with the best-scoring remainder, earliest first on ties.
        let mut candidates: Vec<usize> = (0..total).filter(|i| !keep[*i]).collect();
        candidates.sort_by_key(|&i| (-sentences[i].score, i));
        for i in candidates {
            if kept >= floor {
                break;
            }
            keep[i] = true;
            kept += 1;
        }
    }

    for (seg_idx, segment) in segments.iter_mut().enumerate() {
        if let Segment::Text(body) = segment {
            let mut paragraphs: Vec<String> = Vec::new();
            let para_count = body.split("\n\n").count();
            for para_idx in 0..para_count {
                let survivors: Vec<&str> = sentences
                    .iter()
                    .zip(&keep)
                    .filter(|(s, keep)| s.segment == seg_idx && s.paragraph == para_idx && **keep)
                    .map(|(s, _)| s.text.as_str())
                    .collect();
                if !survivors.is_empty() {
                    paragraphs.push(survivors.join(" "));
                }
            }
            *body = paragraphs.join("\n\n");
        }
    }
}

#[cfg(test)]
#[path = "compact_tests.rs"]
mod tests;
