// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image loading and encoding helpers shared by the HTTP surface and the backends

use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

/// Maximum decoded image size (32MB)
const MAX_IMAGE_SIZE: usize = 32 * 1024 * 1024;

/// User agent sent when fetching remote image references
const FETCH_USER_AGENT: &str = "Mozilla/5.0";

/// Errors raised while turning an image reference into pixels
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Invalid base64 encoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,

    #[error("Image path not found: {0}")]
    PathNotFound(String),

    #[error("Failed to fetch image from {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("Failed to encode image: {0}")]
    EncodeFailed(String),
}

/// Decode a base64-encoded image, accepting an optional `data:image/...;base64,` prefix
pub fn decode_base64_image(base64_str: &str) -> Result<DynamicImage, ImageError> {
    let payload = strip_data_url(base64_str.trim());
    if payload.is_empty() {
        return Err(ImageError::EmptyData);
    }

    let bytes = STANDARD.decode(payload)?;
    decode_image_bytes(&bytes)
}

/// Decode raw image bytes after sniffing the container format
pub fn decode_image_bytes(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(ImageError::TooLarge(bytes.len(), MAX_IMAGE_SIZE));
    }

    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    let format = detect_format(bytes)?;

    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))
}

/// Open an image from a server-local path
pub fn load_image_path<P: AsRef<Path>>(path: P) -> Result<DynamicImage, ImageError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ImageError::PathNotFound(path.display().to_string()));
    }

    let bytes = std::fs::read(path).map_err(|e| ImageError::DecodeFailed(e.to_string()))?;
    decode_image_bytes(&bytes)
}

/// Resolve a query-document image reference.
///
/// Accepts `http(s)://` URLs, existing local paths, `data:` URLs and bare base64 payloads,
/// tried in that order.
pub async fn load_image_reference(
    client: &reqwest::Client,
    reference: &str,
) -> Result<DynamicImage, ImageError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(ImageError::EmptyData);
    }

    if let Ok(url) = url::Url::parse(reference) {
        if url.scheme() == "http" || url.scheme() == "https" {
            return fetch_image(client, url.as_str()).await;
        }
    }

    if Path::new(reference).exists() {
        return load_image_path(reference);
    }

    decode_base64_image(reference).map_err(|_| ImageError::PathNotFound(reference.to_string()))
}

async fn fetch_image(client: &reqwest::Client, url: &str) -> Result<DynamicImage, ImageError> {
    let fetch_error = |reason: String| ImageError::FetchFailed {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, FETCH_USER_AGENT)
        .send()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    if !response.status().is_success() {
        return Err(fetch_error(format!("HTTP {}", response.status())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    decode_image_bytes(&bytes)
}

/// Detect image format from magic bytes
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),
        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),
        _ => Err(ImageError::UnsupportedFormat),
    }
}

/// Encode an image losslessly as PNG and wrap it in base64 for JSON transport
pub fn encode_png_base64(image: &DynamicImage) -> Result<String, ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| ImageError::EncodeFailed(e.to_string()))?;
    Ok(STANDARD.encode(buffer.into_inner()))
}

fn strip_data_url(input: &str) -> &str {
    if input.starts_with("data:") {
        if let Some((_, payload)) = input.split_once(";base64,") {
            return payload;
        }
    }
    input
}
