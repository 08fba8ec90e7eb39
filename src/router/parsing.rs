// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Coercion of free-text model answers into typed attribute responses

use std::sync::OnceLock;

use regex::Regex;

/// Semantic answers are truncated to this many words
pub const SEMANTIC_WORD_LIMIT: usize = 10;

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-?\d+\.?\d*").expect("valid number pattern"))
}

/// `"Yes"` only when the answer mentions yes and not no; `"No"` otherwise
pub fn parse_binary(response: &str) -> &'static str {
    let lower = response.trim().to_lowercase();
    let has_yes = lower.contains("yes");
    let has_no = lower.contains("no");

    if has_yes && !has_no {
        "Yes"
    } else {
        "No"
    }
}

/// First signed decimal number in the answer, or `0.0`
pub fn parse_numeric(response: &str) -> f64 {
    number_pattern()
        .find(response)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0)
}

/// First [`SEMANTIC_WORD_LIMIT`] whitespace-separated words, single-spaced
pub fn parse_semantic(response: &str) -> String {
    response
        .split_whitespace()
        .take(SEMANTIC_WORD_LIMIT)
        .collect::<Vec<_>>()
        .join(" ")
}
