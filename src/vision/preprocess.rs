// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Attention-guided tile preprocessing for the caption / VQA backend
//!
//! Small images are tiled and passed through whole. Images whose pixel area
//! exceeds the configured threshold are tiled, scored by an attention source
//! on a square thumbnail, and pruned to the relevant tiles.

use std::sync::Arc;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::heatmap::{select_tile_indices, Heatmap};
use super::tiling::tile_image;
use crate::config::TilingConfig;

/// Flat row-major token relevance scores as reported by an attention source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenGrid {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f32>,
}

/// Produces a per-token relevance map for a prompt over an image
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttentionSource: Send + Sync {
    async fn attention_map(&self, image: &DynamicImage, prompt: &str) -> anyhow::Result<TokenGrid>;
}

pub struct TilePreprocessor {
    config: TilingConfig,
    attention: Option<Arc<dyn AttentionSource>>,
}

impl TilePreprocessor {
    pub fn new(config: TilingConfig, attention: Option<Arc<dyn AttentionSource>>) -> Self {
        Self { config, attention }
    }

    /// Tile `image` and keep the tiles relevant to `prompt`.
    ///
    /// Never fails: a missing or failing attention source keeps every tile.
    pub async fn prepare(&self, image: &DynamicImage, prompt: &str) -> Vec<DynamicImage> {
        let cfg = &self.config;
        let grid = tile_image(
            image,
            cfg.tile_size,
            cfg.min_tiles,
            cfg.max_tiles,
            cfg.use_thumbnail,
        );

        let (width, height) = image.dimensions();
        let image_area = u64::from(width) * u64::from(height);
        if image_area <= cfg.area_threshold {
            debug!(
                "Image area ({}) <= {}; using all {} tiles",
                image_area,
                cfg.area_threshold,
                grid.len()
            );
            return grid.into_images();
        }

        let Some(attention) = &self.attention else {
            debug!("No attention source configured; using all {} tiles", grid.len());
            return grid.into_images();
        };

        info!(
            "Image area ({}) > {}; pruning {}x{} tile grid",
            image_area, cfg.area_threshold, grid.cols, grid.rows
        );

        let thumbnail = image.resize_exact(cfg.tile_size, cfg.tile_size, FilterType::CatmullRom);
        let tokens = match attention.attention_map(&thumbnail, prompt).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("Attention map failed, keeping all tiles: {}", e);
                return grid.into_images();
            }
        };

        let heatmap = Heatmap::from_tokens(tokens.values, tokens.rows, tokens.cols, 1.0);
        let indices = select_tile_indices(
            &heatmap,
            grid.rows as usize,
            grid.cols as usize,
            cfg.selection_threshold,
        );
        grid.select(&indices)
    }
}
