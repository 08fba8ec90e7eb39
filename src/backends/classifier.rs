// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Keyword task classifier used when no trained classifier is deployed

use anyhow::Result;
use async_trait::async_trait;

use super::{mentions_area, TaskClassifier, TaskKind};

const GROUNDING_KEYWORDS: [&str; 4] = ["find", "locate", "segment", "detect"];
const CAPTION_KEYWORDS: [&str; 2] = ["caption", "describe"];

/// Keyword rules, first match wins:
/// `area` → area, find/locate/segment/detect → grounding,
/// caption/describe → caption, a question mark → vqa, anything else → caption.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn classify_text(text: &str) -> TaskKind {
        let lower = text.to_lowercase();
        if mentions_area(&lower) {
            TaskKind::Area
        } else if GROUNDING_KEYWORDS.iter().any(|k| lower.contains(k)) {
            TaskKind::Grounding
        } else if CAPTION_KEYWORDS.iter().any(|k| lower.contains(k)) {
            TaskKind::Caption
        } else if lower.contains('?') {
            TaskKind::Vqa
        } else {
            TaskKind::Caption
        }
    }
}

#[async_trait]
impl TaskClassifier for HeuristicClassifier {
    async fn classify(&self, text: &str) -> Result<TaskKind> {
        Ok(Self::classify_text(text))
    }
}
