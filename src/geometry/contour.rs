// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Contour helpers on top of `imageproc::contours`

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

/// Outer borders of the top-level foreground regions of `mask`.
///
/// The mask is traced inside a one-pixel zero frame so regions touching the
/// image edge still get an outer border; points are in `mask` coordinates.
pub fn external_contours(mask: &GrayImage) -> Vec<Vec<Point<i32>>> {
    let (width, height) = mask.dimensions();
    let mut framed = GrayImage::new(width + 2, height + 2);
    image::imageops::replace(&mut framed, mask, 1, 1);

    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            c.points
                .into_iter()
                .map(|p| Point::new(p.x - 1, p.y - 1))
                .collect()
        })
        .collect()
}

/// Enclosed area of a closed polygon (shoelace formula)
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += i64::from(p.x) * i64::from(q.y) - i64::from(q.x) * i64::from(p.y);
    }
    twice_area.abs() as f64 / 2.0
}

/// The contour with the largest enclosed area; the first one wins ties
pub fn largest_contour(contours: Vec<Vec<Point<i32>>>) -> Option<Vec<Point<i32>>> {
    let mut best: Option<(f64, Vec<Point<i32>>)> = None;
    for contour in contours {
        let area = contour_area(&contour);
        match &best {
            Some((best_area, _)) if area <= *best_area => {}
            _ => best = Some((area, contour)),
        }
    }
    best.map(|(_, contour)| contour)
}

/// Drop points lying on a straight segment between their neighbours
pub fn compress_chain(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let prev = points[(i + n - 1) % n];
        let cur = points[i];
        let next = points[(i + 1) % n];
        let d1 = (cur.x - prev.x, cur.y - prev.y);
        let d2 = (next.x - cur.x, next.y - cur.y);
        let cross = d1.0 * d2.1 - d1.1 * d2.0;
        let same_direction = d1.0 * d2.0 + d1.1 * d2.1 > 0;
        if cross != 0 || !same_direction {
            out.push(cur);
        }
    }

    if out.is_empty() {
        points[..1].to_vec()
    } else {
        out
    }
}

/// Rasterise a filled contour (interior plus border) onto a blank mask
pub fn fill_contour(width: u32, height: u32, points: &[Point<i32>]) -> GrayImage {
    let mut canvas = GrayImage::new(width, height);

    let mut polygon = compress_chain(points);
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    if polygon.len() >= 3 {
        draw_polygon_mut(&mut canvas, &polygon, Luma([255u8]));
    }

    // Border pixels are part of the region regardless of the fill rule.
    for p in points {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
            canvas.put_pixel(p.x as u32, p.y as u32, Luma([255]));
        }
    }
    canvas
}

/// Axis-aligned corners of a point set, clockwise from top-left
pub fn bounding_corners(points: &[Point<i32>]) -> [Point<i32>; 4] {
    let min_x = points.iter().map(|p| p.x).min().unwrap_or(0);
    let max_x = points.iter().map(|p| p.x).max().unwrap_or(0);
    let min_y = points.iter().map(|p| p.y).min().unwrap_or(0);
    let max_y = points.iter().map(|p| p.y).max().unwrap_or(0);
    [
        Point::new(min_x, min_y),
        Point::new(max_x, min_y),
        Point::new(max_x, max_y),
        Point::new(min_x, max_y),
    ]
}
