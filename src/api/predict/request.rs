// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-backend prediction request

use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::router::{PredictInput, RouterError};
use crate::vision::image_utils::{decode_base64_image, load_image_path};

/// Body of `POST /predict`, `/earthmind` and `/remotesam`.
///
/// Frames come from the first present of `images`, `image`, `image_paths`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Base64-encoded frames
    #[serde(default)]
    pub images: Option<Vec<String>>,

    /// A single base64-encoded frame
    #[serde(default)]
    pub image: Option<String>,

    /// Server-local frame paths
    #[serde(default)]
    pub image_paths: Option<Vec<String>>,

    #[serde(default)]
    pub text: String,

    /// 1-based frame index
    #[serde(default)]
    pub select: Option<i64>,

    /// Backend override: `earthmind` or `remotesam`
    #[serde(default)]
    pub model: Option<String>,

    /// Ground sample distance (meters per pixel) for area questions
    #[serde(default)]
    pub gsd: Option<f64>,
}

impl PredictRequest {
    /// Decode every frame as RGB
    pub fn decode_frames(&self) -> Result<Vec<DynamicImage>, RouterError> {
        let frames = if let Some(images) = &self.images {
            images
                .iter()
                .map(|b64| decode_frame(b64))
                .collect::<Result<Vec<_>, _>>()?
        } else if let Some(image) = &self.image {
            vec![decode_frame(image)?]
        } else if let Some(paths) = &self.image_paths {
            paths
                .iter()
                .map(|p| open_frame(p))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            return Err(RouterError::NoImages);
        };

        if frames.is_empty() {
            return Err(RouterError::NoImages);
        }
        Ok(frames)
    }

    pub fn into_input(self) -> Result<PredictInput, RouterError> {
        let frames = self.decode_frames()?;
        Ok(PredictInput {
            text: self.text,
            frames,
            select: self.select.unwrap_or(-1),
            model: self.model,
            gsd: self.gsd,
        })
    }
}

fn decode_frame(b64: &str) -> Result<DynamicImage, RouterError> {
    decode_base64_image(b64)
        .map(|img| DynamicImage::ImageRgb8(img.to_rgb8()))
        .map_err(|e| RouterError::InvalidImage(format!("Failed to parse base64 image: {}", e)))
}

fn open_frame(path: &str) -> Result<DynamicImage, RouterError> {
    if !Path::new(path).exists() {
        return Err(RouterError::InvalidImage(format!("Image path not found: {}", path)));
    }
    load_image_path(path)
        .map(|img| DynamicImage::ImageRgb8(img.to_rgb8()))
        .map_err(|e| RouterError::InvalidImage(format!("Failed opening local image: {}", e)))
}
