// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Segmentation mask normalisation and wire format
//!
//! Backends may return masks as boolean, `[0, 1]` float, 8/16-bit gray or
//! multi-channel images. Everything downstream works on a single-channel 8-bit
//! mask where any nonzero pixel is foreground.

use image::{DynamicImage, GenericImageView, GrayImage, Luma, Pixel, Primitive};
use thiserror::Error;

use crate::vision::image_utils::{decode_base64_image, encode_png_base64, ImageError};

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("Failed to decode mask: {0}")]
    Decode(#[source] ImageError),

    #[error("Failed to encode mask: {0}")]
    Encode(#[source] ImageError),
}

/// Collapse `mask` to one 8-bit channel.
///
/// Single-channel inputs are used as is, multi-channel inputs are averaged over
/// all channels. If the largest value is at most 1 the mask is treated as
/// boolean / unit-float and scaled by 255; otherwise values saturate into `u8`.
pub fn normalize_mask(mask: &DynamicImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let values: Vec<f32> = match mask {
        DynamicImage::ImageLuma8(img) => channel_means(img),
        DynamicImage::ImageLumaA8(img) => channel_means(img),
        DynamicImage::ImageRgb8(img) => channel_means(img),
        DynamicImage::ImageRgba8(img) => channel_means(img),
        DynamicImage::ImageLuma16(img) => channel_means(img),
        DynamicImage::ImageLumaA16(img) => channel_means(img),
        DynamicImage::ImageRgb16(img) => channel_means(img),
        DynamicImage::ImageRgba16(img) => channel_means(img),
        DynamicImage::ImageRgb32F(img) => channel_means(img),
        DynamicImage::ImageRgba32F(img) => channel_means(img),
        other => channel_means(&other.to_rgba32f()),
    };

    let max = values.iter().copied().fold(0.0f32, f32::max);
    let scale = if max <= 1.0 { 255.0 } else { 1.0 };

    let pixels = values
        .into_iter()
        .map(|v| (v * scale).clamp(0.0, 255.0) as u8)
        .collect();

    GrayImage::from_raw(width, height, pixels).unwrap_or_else(|| GrayImage::new(width, height))
}

/// Foreground as 255, background as 0
pub fn binarize(mask: &GrayImage) -> GrayImage {
    let mut out = mask.clone();
    for p in out.pixels_mut() {
        if p[0] != 0 {
            *p = Luma([255]);
        }
    }
    out
}

pub fn count_foreground(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] != 0).count()
}

/// Decode a base64 PNG (or any supported container) mask and normalise it
pub fn decode_mask(encoded: &str) -> Result<GrayImage, MaskError> {
    let image = decode_base64_image(encoded).map_err(MaskError::Decode)?;
    Ok(normalize_mask(&image))
}

/// Normalise and encode a mask as base64 PNG for transport
pub fn encode_mask(mask: &DynamicImage) -> Result<String, MaskError> {
    let gray = normalize_mask(mask);
    encode_png_base64(&DynamicImage::ImageLuma8(gray)).map_err(MaskError::Encode)
}

fn channel_means<P>(img: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Vec<f32>
where
    P: Pixel,
    P::Subpixel: Primitive + Into<f32>,
{
    img.pixels()
        .map(|p| {
            let channels = p.channels();
            let sum: f32 = channels.iter().map(|&c| c.into()).sum();
            sum / channels.len() as f32
        })
        .collect()
}
