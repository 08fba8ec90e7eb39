// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Query routing: backend choice, concurrent fan-out and response assembly

pub mod dispatch;
pub mod error;
pub mod parsing;
pub mod prompts;
pub mod query;

pub use dispatch::{resolve_document_image, PredictInput, Prediction, QueryRouter};
pub use error::RouterError;
pub use parsing::{parse_binary, parse_numeric, parse_semantic, SEMANTIC_WORD_LIMIT};
pub use query::{
    AttributeQuery, GroundedObject, GroundingQuery, ImageMetadata, InputImage, NumericQuery,
    Queries, QueryDocument, TextQuery,
};
