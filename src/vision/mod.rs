// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image handling for the router
//!
//! This module provides:
//! - Image reference loading (base64, data URLs, local paths, remote URLs)
//! - Dynamic tiling of large scenes into a fixed-size grid
//! - Attention-guided tile selection to bound encoder cost

pub mod heatmap;
pub mod image_utils;
pub mod preprocess;
pub mod tiling;

pub use heatmap::{select_tile_indices, Heatmap};
pub use image_utils::{
    decode_base64_image, decode_image_bytes, detect_format, encode_png_base64, load_image_path,
    load_image_reference, ImageError,
};
pub use preprocess::{AttentionSource, TilePreprocessor, TokenGrid};
pub use tiling::{tile_image, Tile, TileGrid};
