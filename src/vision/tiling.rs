// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Dynamic tiling of a single image into a fixed-size square grid
//!
//! The grid shape is the `(cols, rows)` factorization, within the tile limits,
//! whose ratio best matches the image aspect ratio. The resized image is cut in
//! raster order and an optional whole-image thumbnail is appended last.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// A square crop of the resized image and its position in the grid
#[derive(Debug, Clone)]
pub struct Tile {
    pub image: DynamicImage,
    pub col: u32,
    pub row: u32,
}

/// Output of [`tile_image`]: grid tiles in raster order plus the optional thumbnail
#[derive(Debug, Clone)]
pub struct TileGrid {
    pub tiles: Vec<Tile>,
    pub cols: u32,
    pub rows: u32,
    pub thumbnail: Option<DynamicImage>,
}

impl TileGrid {
    /// Number of images handed to the encoder (grid tiles + thumbnail)
    pub fn len(&self) -> usize {
        self.tiles.len() + usize::from(self.thumbnail.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All tiles in encoder order: raster grid first, thumbnail last
    pub fn into_images(self) -> Vec<DynamicImage> {
        let mut images: Vec<DynamicImage> = self.tiles.into_iter().map(|t| t.image).collect();
        images.extend(self.thumbnail);
        images
    }

    /// Keep only the grid tiles at `indices` (raster order, deduplicated) and
    /// always append the thumbnail when present.
    pub fn select(self, indices: &[usize]) -> Vec<DynamicImage> {
        let mut keep = indices.to_vec();
        keep.sort_unstable();
        keep.dedup();

        let mut images: Vec<DynamicImage> = self
            .tiles
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| keep.binary_search(idx).is_ok())
            .map(|(_, tile)| tile.image)
            .collect();
        images.extend(self.thumbnail);
        images
    }
}

/// Candidate `(cols, rows)` pairs with `min_tiles <= cols*rows <= max_tiles`,
/// ordered by tile count and then by `(cols, rows)`.
pub fn target_ratios(min_tiles: u32, max_tiles: u32) -> Vec<(u32, u32)> {
    let min_tiles = min_tiles.max(1);
    let max_tiles = max_tiles.max(min_tiles);

    let mut ratios = Vec::new();
    for cols in 1..=max_tiles {
        for rows in 1..=max_tiles {
            let count = cols * rows;
            if count >= min_tiles && count <= max_tiles {
                ratios.push((cols, rows));
            }
        }
    }
    ratios.sort_by_key(|&(cols, rows)| (cols * rows, cols, rows));
    ratios
}

/// Pick the grid whose ratio is closest to `aspect_ratio`.
///
/// On an exact tie the later candidate wins only when the source image covers
/// more than half of that candidate's scaled target area.
pub fn closest_aspect_ratio(
    aspect_ratio: f64,
    ratios: &[(u32, u32)],
    width: u32,
    height: u32,
    tile_size: u32,
) -> (u32, u32) {
    let area = f64::from(width) * f64::from(height);
    let tile_area = f64::from(tile_size) * f64::from(tile_size);

    let mut best_diff = f64::INFINITY;
    let mut best = (1, 1);

    for &(cols, rows) in ratios {
        let diff = (aspect_ratio - f64::from(cols) / f64::from(rows)).abs();
        if diff < best_diff {
            best_diff = diff;
            best = (cols, rows);
        } else if diff == best_diff && area > 0.5 * tile_area * f64::from(cols * rows) {
            best = (cols, rows);
        }
    }
    best
}

/// Cut `image` into a `cols x rows` grid of `tile_size` squares.
pub fn tile_image(
    image: &DynamicImage,
    tile_size: u32,
    min_tiles: u32,
    max_tiles: u32,
    use_thumbnail: bool,
) -> TileGrid {
    let (width, height) = image.dimensions();
    let tile_size = tile_size.max(1);
    let aspect_ratio = f64::from(width.max(1)) / f64::from(height.max(1));

    let ratios = target_ratios(min_tiles, max_tiles);
    let (cols, rows) = closest_aspect_ratio(aspect_ratio, &ratios, width, height, tile_size);

    let resized = image.resize_exact(cols * tile_size, rows * tile_size, FilterType::CatmullRom);

    let mut tiles = Vec::with_capacity((cols * rows) as usize);
    for idx in 0..cols * rows {
        let col = idx % cols;
        let row = idx / cols;
        tiles.push(Tile {
            image: resized.crop_imm(col * tile_size, row * tile_size, tile_size, tile_size),
            col,
            row,
        });
    }

    let thumbnail = if use_thumbnail && tiles.len() != 1 {
        Some(image.resize_exact(tile_size, tile_size, FilterType::CatmullRom))
    } else {
        None
    };

    TileGrid {
        tiles,
        cols,
        rows,
        thumbnail,
    }
}
