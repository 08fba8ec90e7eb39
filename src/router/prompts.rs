// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Output-format instructions appended to sub-query prompts

const CAPTION_SUFFIX: &str = " Provide a concise summary for simple images (approx. 50 words) and a comprehensive description for complex images, staying within a 10 to 200 word limit. Give your output STRICTLY in a single paragraph.";

pub fn caption_prompt(instruction: &str) -> String {
    format!("{}{}", instruction, CAPTION_SUFFIX)
}

pub fn binary_prompt(instruction: &str) -> String {
    format!("{} Answer strictly with only 'Yes' or 'No', nothing else.", instruction)
}

pub fn numeric_prompt(instruction: &str) -> String {
    format!("{} Answer with only a numeric value, nothing else.", instruction)
}

pub fn semantic_prompt(instruction: &str) -> String {
    format!("{} Answer in only 1 to 5 words, nothing more.", instruction)
}
