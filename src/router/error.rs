// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

/// Failures surfaced by the router
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("No images provided. Send `images`, `image`, or `image_paths`.")]
    NoImages,

    #[error("{0}")]
    InvalidImage(String),

    #[error("select={select} is out of range for {frames} frame(s)")]
    SelectOutOfRange { select: i64, frames: usize },

    #[error("Missing image_url in input_image")]
    MissingImageUrl,

    #[error("Failed to load image: {0}")]
    ImageLoad(String),

    #[error("Model execution failed: {0}")]
    Backend(String),

    #[error("Geometry task failed: {0}")]
    Geometry(String),
}

impl RouterError {
    /// Input errors, reported before any backend is called
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RouterError::NoImages
                | RouterError::InvalidImage(_)
                | RouterError::SelectOutOfRange { .. }
                | RouterError::MissingImageUrl
                | RouterError::ImageLoad(_)
        )
    }

    pub(crate) fn backend(err: anyhow::Error) -> Self {
        RouterError::Backend(format!("{:#}", err))
    }
}
