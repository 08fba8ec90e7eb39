// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Oriented bounding box extraction from segmentation masks
//!
//! Touching instances are separated with a distance-transform seeded
//! watershed before one minimum-area rectangle is fitted per instance.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::distance_transform::{euclidean_squared_distance_transform, Norm};
use imageproc::geometry::min_area_rect;
use imageproc::morphology::{dilate, open};
use imageproc::point::Point;
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::contour::{bounding_corners, contour_area, external_contours, largest_contour};
use super::mask::{binarize, count_foreground, normalize_mask};
use super::watershed::{watershed, Markers};

/// Opening radius (3x3 kernel, two iterations)
const OPEN_RADIUS: u8 = 2;
/// Sure-background dilation radius (3x3 kernel, three iterations)
const BACKGROUND_DILATE_RADIUS: u8 = 3;
/// Fraction of the peak distance above which a pixel is a sure-foreground seed
const SURE_FOREGROUND_RATIO: f64 = 0.2;
/// Instances smaller than this fraction of the mean instance area are dropped
const MIN_AREA_RATIO: f64 = 0.25;

/// Four rectangle corners, each normalised by image width / height.
///
/// Serialised flat as `[x1, y1, x2, y2, x3, y3, x4, y4]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Obb(pub [f64; 8]);

impl Obb {
    pub fn corners(&self) -> [(f64, f64); 4] {
        let c = &self.0;
        [(c[0], c[1]), (c[2], c[3]), (c[4], c[5]), (c[6], c[7])]
    }

    fn from_points(points: &[Point<i32>; 4], width: u32, height: u32) -> Self {
        let w = f64::from(width.max(1));
        let h = f64::from(height.max(1));
        let mut coords = [0.0; 8];
        for (i, p) in points.iter().enumerate() {
            coords[2 * i] = (f64::from(p.x) / w).clamp(0.0, 1.0);
            coords[2 * i + 1] = (f64::from(p.y) / h).clamp(0.0, 1.0);
        }
        Obb(coords)
    }
}

/// Normalise any mask image and extract its oriented boxes
pub fn extract_obbs(mask: &DynamicImage) -> Vec<Obb> {
    extract_from_gray(&normalize_mask(mask))
}

/// Extract one oriented box per separated instance of a single-channel mask.
///
/// Empty masks, masks erased by the opening and degenerate distance
/// transforms all yield an empty list.
pub fn extract_from_gray(mask: &GrayImage) -> Vec<Obb> {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 || count_foreground(mask) == 0 {
        return Vec::new();
    }

    let opening = open(&binarize(mask), Norm::LInf, OPEN_RADIUS);

    let distances = squared_distance_to_background(&opening);
    let max_sq = distances.iter().copied().fold(0.0f64, f64::max);
    if max_sq <= 0.0 {
        return Vec::new();
    }
    let seed_cut = SURE_FOREGROUND_RATIO * SURE_FOREGROUND_RATIO * max_sq;

    let sure_fg = GrayImage::from_fn(width, height, |x, y| {
        let d = distances[y as usize * width as usize + x as usize];
        Luma([if d > seed_cut { 255 } else { 0 }])
    });
    let sure_bg = dilate(&opening, Norm::LInf, BACKGROUND_DILATE_RADIUS);
    let components = label_seeds(&sure_fg);

    // Background becomes 1, seeds 2.., the uncertain band 0.
    let mut markers = Markers::from_fn(width, height, |x, y| {
        let unknown = sure_bg.get_pixel(x, y)[0] != 0 && sure_fg.get_pixel(x, y)[0] == 0;
        if unknown {
            0
        } else {
            components.get_pixel(x + 1, y + 1)[0] as i32 + 1
        }
    });
    watershed(&opening, &mut markers);

    let contours: Vec<Vec<Point<i32>>> = markers
        .unique_labels()
        .into_iter()
        .filter(|&label| label >= 2)
        .filter_map(|label| largest_contour(external_contours(&markers.label_mask(label))))
        .collect();
    if contours.is_empty() {
        return Vec::new();
    }

    let areas: Vec<f64> = contours.iter().map(|c| contour_area(c)).collect();
    let mean_area = areas.iter().sum::<f64>() / areas.len() as f64;
    let min_area = MIN_AREA_RATIO * mean_area;

    let obbs: Vec<Obb> = contours
        .iter()
        .zip(&areas)
        .filter(|(_, area)| **area >= min_area)
        .map(|(contour, &area)| {
            let corners = if contour.len() < 3 || area == 0.0 {
                bounding_corners(contour)
            } else {
                min_area_rect(contour)
            };
            Obb::from_points(&corners, width, height)
        })
        .collect();

    debug!(
        "Extracted {} boxes from {} instances (mean area {:.1})",
        obbs.len(),
        contours.len(),
        mean_area
    );
    obbs
}

/// Connected seed labels, computed inside a one-pixel zero frame.
///
/// `imageproc` cannot label a 1x1 image; read the result at `(x + 1, y + 1)`.
fn label_seeds(sure_fg: &GrayImage) -> ImageBuffer<Luma<u32>, Vec<u32>> {
    let (width, height) = sure_fg.dimensions();
    let mut framed = GrayImage::new(width + 2, height + 2);
    image::imageops::replace(&mut framed, sure_fg, 1, 1);
    connected_components(&framed, Connectivity::Eight, Luma([0u8]))
}

/// Squared Euclidean distance from every foreground pixel to the nearest
/// background pixel, row-major. A mask with no background is measured
/// against a virtual one-pixel background frame.
fn squared_distance_to_background(mask: &GrayImage) -> Vec<f64> {
    let (width, height) = mask.dimensions();
    let pad = if mask.pixels().any(|p| p[0] == 0) { 0 } else { 1 };

    let inverted = GrayImage::from_fn(width + 2 * pad, height + 2 * pad, |x, y| {
        let inside = x >= pad && y >= pad && x < width + pad && y < height + pad;
        if inside && mask.get_pixel(x - pad, y - pad)[0] != 0 {
            Luma([0])
        } else {
            Luma([255])
        }
    });
    let dist = euclidean_squared_distance_transform(&inverted);

    let mut out = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            out.push(dist.get_pixel(x + pad, y + pad)[0]);
        }
    }
    out
}
