// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Mask geometry: instance separation, oriented boxes and area
//!
//! All functions here are pure and CPU bound. Async callers should run them
//! on the blocking pool.

pub mod area;
pub mod contour;
pub mod mask;
pub mod obb;
pub mod watershed;

pub use area::{area_from_gray, mask_area, DEFAULT_GSD};
pub use mask::{decode_mask, encode_mask, normalize_mask, MaskError};
pub use obb::{extract_from_gray, extract_obbs, Obb};
pub use watershed::{watershed, Markers, WATERSHED_BOUNDARY};
