// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Relevance heatmaps and attention-guided tile selection

use ndarray::Array2;
use tracing::{debug, warn};

/// Multiplier over the neighbourhood mean for a tile to count as a local peak
const LOCAL_PEAK_FACTOR: f32 = 1.2;

/// A 2D grid of relevance scores
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    grid: Array2<f32>,
}

impl Heatmap {
    pub fn new(grid: Array2<f32>) -> Self {
        Self { grid }
    }

    /// Build a heatmap from a flat token sequence.
    ///
    /// When `values.len()` does not match `expected_rows * expected_cols`, the
    /// sequence is reshaped to the integer factor pair `(h, w)` whose ratio
    /// `w / h` lies within `[0.5, 2.0] * aspect_ratio`, searching downward from
    /// `h = sqrt(len / aspect_ratio)`. If no pair qualifies the grid degrades to
    /// a single row. Non-finite scores are treated as zero.
    pub fn from_tokens(
        values: Vec<f32>,
        expected_rows: usize,
        expected_cols: usize,
        aspect_ratio: f64,
    ) -> Self {
        let values: Vec<f32> = values
            .into_iter()
            .map(|v| if v.is_finite() { v } else { 0.0 })
            .collect();
        let total = values.len();

        let (rows, cols) = if total == expected_rows * expected_cols && total > 0 {
            (expected_rows, expected_cols)
        } else {
            let shape = factor_shape(total, aspect_ratio);
            debug!(
                "Heatmap has {} tokens, expected {}x{}; reshaped to {}x{}",
                total, expected_rows, expected_cols, shape.0, shape.1
            );
            shape
        };

        // Shape always multiplies to `total`, so this cannot fail.
        let grid = Array2::from_shape_vec((rows, cols), values)
            .unwrap_or_else(|_| Array2::zeros((rows, cols)));
        Self { grid }
    }

    pub fn rows(&self) -> usize {
        self.grid.nrows()
    }

    pub fn cols(&self) -> usize {
        self.grid.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    pub fn grid(&self) -> &Array2<f32> {
        &self.grid
    }

    /// Resize to `rows x cols` by area averaging: every output cell is the mean
    /// of the input cells `[floor(i*in/out), ceil((i+1)*in/out))` along each axis.
    pub fn resize_area(&self, rows: usize, cols: usize) -> Heatmap {
        let (in_rows, in_cols) = self.grid.dim();
        if in_rows == 0 || in_cols == 0 || rows == 0 || cols == 0 {
            return Heatmap::new(Array2::zeros((rows, cols)));
        }

        let grid = Array2::from_shape_fn((rows, cols), |(r, c)| {
            let (r0, r1) = pool_bounds(r, in_rows, rows);
            let (c0, c1) = pool_bounds(c, in_cols, cols);
            let window = self.grid.slice(ndarray::s![r0..r1, c0..c1]);
            window.sum() / window.len() as f32
        });
        Heatmap::new(grid)
    }

    /// Min-max normalise to `[0, 1]`; a flat heatmap becomes all zeros
    pub fn normalized(&self) -> Heatmap {
        let min = self.grid.iter().copied().fold(f32::INFINITY, f32::min);
        let max = self.grid.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        if max > min {
            let range = max - min;
            Heatmap::new(self.grid.mapv(|v| (v - min) / range))
        } else {
            Heatmap::new(Array2::zeros(self.grid.dim()))
        }
    }

    /// Mean of the up-to-8 grid neighbours of `(row, col)`; zero for a 1x1 grid
    pub fn neighbour_mean(&self, row: usize, col: usize) -> f32 {
        let (rows, cols) = self.grid.dim();
        let mut sum = 0.0;
        let mut count = 0usize;

        for r in row.saturating_sub(1)..=(row + 1).min(rows.saturating_sub(1)) {
            for c in col.saturating_sub(1)..=(col + 1).min(cols.saturating_sub(1)) {
                if r == row && c == col {
                    continue;
                }
                sum += self.grid[[r, c]];
                count += 1;
            }
        }

        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }

    /// Raster index of the first maximum
    pub fn argmax(&self) -> usize {
        let mut best_idx = 0;
        let mut best = f32::NEG_INFINITY;
        for (idx, &v) in self.grid.iter().enumerate() {
            if v > best {
                best = v;
                best_idx = idx;
            }
        }
        best_idx
    }
}

/// Select the relevant cells of a `rows x cols` tile grid.
///
/// The heatmap is area-resized onto the grid and min-max normalised. A cell is
/// kept when its score exceeds `threshold`, or when it is a local peak: above
/// `1.2x` its neighbourhood mean and above the grid mean. An empty selection
/// falls back to the single highest-scoring cell. Indices are raster order.
pub fn select_tile_indices(
    heatmap: &Heatmap,
    rows: usize,
    cols: usize,
    threshold: f32,
) -> Vec<usize> {
    if rows == 0 || cols == 0 {
        return Vec::new();
    }
    if heatmap.is_empty() {
        warn!("Empty relevance heatmap; keeping all {} tiles", rows * cols);
        return (0..rows * cols).collect();
    }

    let on_grid = heatmap.resize_area(rows, cols);
    let norm = on_grid.normalized();
    let global_mean = norm.grid().mean().unwrap_or(0.0);

    let mut selected = Vec::new();
    for ((r, c), &value) in norm.grid().indexed_iter() {
        let high = value > threshold;
        let peak = value > norm.neighbour_mean(r, c) * LOCAL_PEAK_FACTOR && value > global_mean;
        if high || peak {
            selected.push(r * cols + c);
        }
    }

    if selected.is_empty() {
        selected.push(on_grid.argmax());
    }

    debug!(
        "Selected {}/{} tiles (threshold {:.2})",
        selected.len(),
        rows * cols,
        threshold
    );
    selected
}

fn pool_bounds(idx: usize, input: usize, output: usize) -> (usize, usize) {
    let start = idx * input / output;
    let end = ((idx + 1) * input + output - 1) / output;
    (start, end.max(start + 1).min(input))
}

fn factor_shape(total: usize, aspect_ratio: f64) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    let ratio = if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
        aspect_ratio
    } else {
        1.0
    };

    let mut h = (total as f64 / ratio).sqrt() as usize;
    while h > 0 {
        if total % h == 0 {
            let w = total / h;
            let current = w as f64 / h as f64;
            if (0.5 * ratio..=2.0 * ratio).contains(&current) {
                return (h, w);
            }
        }
        h -= 1;
    }
    (1, total)
}
