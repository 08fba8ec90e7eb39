// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multi-part query document
//!
//! The document is returned to the caller with every present sub-query's
//! `response` filled in. Fields this service does not know about are carried
//! through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geometry::Obb;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDocument {
    #[serde(default)]
    pub input_image: InputImage,
    #[serde(default)]
    pub queries: Queries,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ImageMetadata>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InputImage {
    /// Ground sample distance in meters per pixel
    pub fn gsd(&self) -> Option<f64> {
        self.metadata.as_ref().and_then(|m| m.spatial_resolution_m)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial_resolution_m: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Queries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_query: Option<TextQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_query: Option<GroundingQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_query: Option<AttributeQuery>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A sub-query answered with free text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextQuery {
    #[serde(default)]
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingQuery {
    #[serde(default)]
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Vec<GroundedObject>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundedObject {
    #[serde(rename = "object-id")]
    pub object_id: String,
    pub obbox: Obb,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<TextQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<TextQuery>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericQuery {
    #[serde(default)]
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NumericQuery {
    /// Numeric questions about area are measured on a mask instead of asked
    pub fn is_area(&self) -> bool {
        self.instruction.to_lowercase().contains("area")
    }
}
