// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Real-world area of the dominant object in a segmentation mask

use image::{DynamicImage, GrayImage};

use super::contour::{external_contours, fill_contour, largest_contour};
use super::mask::{count_foreground, normalize_mask};

/// Ground sample distance used when a request does not provide one
pub const DEFAULT_GSD: f64 = 1.0;

/// Area in square meters of the largest region of any mask image
pub fn mask_area(mask: &DynamicImage, gsd: f64) -> f64 {
    area_from_gray(&normalize_mask(mask), gsd)
}

/// Pixel count of the largest filled external contour times `gsd²`.
///
/// Only the dominant region counts; holes inside it are filled. Empty masks
/// measure zero.
pub fn area_from_gray(mask: &GrayImage, gsd: f64) -> f64 {
    if count_foreground(mask) == 0 {
        return 0.0;
    }

    let Some(contour) = largest_contour(external_contours(mask)) else {
        return 0.0;
    };

    let (width, height) = mask.dimensions();
    let filled = fill_contour(width, height, &contour);
    let pixels = count_foreground(&filled) as f64;
    pixels * gsd * gsd
}
