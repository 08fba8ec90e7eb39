// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Marker-seeded priority-flood watershed on an 8-bit intensity image
//!
//! Marker semantics:
//! - `> 0`: seed label
//! - `0`: unknown, to be flooded
//! - [`WATERSHED_BOUNDARY`]: ridge between two different labels
//!
//! The outermost image row/column is always a boundary. Unknown pixels are
//! flooded from their labelled 4-neighbours in order of increasing intensity
//! difference; a pixel reached by two different labels becomes a boundary.

use std::collections::VecDeque;

use image::GrayImage;

/// Marker value for ridge pixels separating two basins
pub const WATERSHED_BOUNDARY: i32 = -1;

const IN_QUEUE: i32 = -2;
const NUM_LEVELS: usize = 256;

/// Label matrix stored row-major, `width * height` entries
#[derive(Debug, Clone, PartialEq)]
pub struct Markers {
    width: u32,
    height: u32,
    labels: Vec<i32>,
}

impl Markers {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            labels: vec![0; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> i32) -> Self {
        let mut labels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                labels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            labels,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> i32 {
        self.labels[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, label: i32) {
        let idx = self.index(x, y);
        self.labels[idx] = label;
    }

    /// Distinct labels present, ascending
    pub fn unique_labels(&self) -> Vec<i32> {
        let mut labels = self.labels.clone();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// Pixels carrying `label` as a 0/255 mask
    pub fn label_mask(&self, label: i32) -> GrayImage {
        let data = self
            .labels
            .iter()
            .map(|&l| if l == label { 255 } else { 0 })
            .collect();
        GrayImage::from_raw(self.width, self.height, data)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Flood `markers` over `image` in place
pub fn watershed(image: &GrayImage, markers: &mut Markers) {
    let (width, height) = image.dimensions();
    debug_assert_eq!((width, height), (markers.width, markers.height));
    if width == 0 || height == 0 {
        return;
    }

    let w = width as usize;
    let h = height as usize;
    let pixels = image.as_raw();
    let labels = &mut markers.labels;
    let diff = |a: usize, b: usize| (i32::from(pixels[a]) - i32::from(pixels[b])).unsigned_abs() as usize;

    let mut queues: Vec<VecDeque<usize>> = vec![VecDeque::new(); NUM_LEVELS];

    for x in 0..w {
        labels[x] = WATERSHED_BOUNDARY;
        labels[(h - 1) * w + x] = WATERSHED_BOUNDARY;
    }
    for y in 0..h {
        labels[y * w] = WATERSHED_BOUNDARY;
        labels[y * w + w - 1] = WATERSHED_BOUNDARY;
    }

    // Seed the queues with unknown pixels touching a label.
    for y in 1..h.saturating_sub(1) {
        for x in 1..w - 1 {
            let idx = y * w + x;
            if labels[idx] < 0 {
                labels[idx] = 0;
            }
            if labels[idx] != 0 {
                continue;
            }

            let mut priority = usize::MAX;
            for n in [idx - 1, idx + 1, idx - w, idx + w] {
                if labels[n] > 0 {
                    priority = priority.min(diff(idx, n));
                }
            }
            if priority != usize::MAX {
                queues[priority].push_back(idx);
                labels[idx] = IN_QUEUE;
            }
        }
    }

    let mut level = 0;
    loop {
        while level < NUM_LEVELS && queues[level].is_empty() {
            level += 1;
        }
        if level == NUM_LEVELS {
            break;
        }
        let Some(idx) = queues[level].pop_front() else {
            continue;
        };

        let neighbours = [idx - 1, idx + 1, idx - w, idx + w];

        let mut label = 0;
        for &n in &neighbours {
            let t = labels[n];
            if t > 0 {
                if label == 0 {
                    label = t;
                } else if t != label {
                    label = WATERSHED_BOUNDARY;
                }
            }
        }
        labels[idx] = label;
        if label == WATERSHED_BOUNDARY {
            continue;
        }

        for &n in &neighbours {
            if labels[n] == 0 {
                let p = diff(n, idx);
                queues[p].push_back(n);
                labels[n] = IN_QUEUE;
                level = level.min(p);
            }
        }
    }
}
