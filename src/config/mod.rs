// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Router configuration: TOML file, `GEONLI_*` environment overrides, CLI flags

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tile grid and attention-guided selection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Edge length in pixels of each square tile
    pub tile_size: u32,
    pub min_tiles: u32,
    pub max_tiles: u32,
    /// Append a whole-image thumbnail when the grid has more than one tile
    pub use_thumbnail: bool,
    /// Images with `width * height` above this are pruned by relevance
    pub area_threshold: u64,
    /// Normalised heatmap score above which a tile is always kept
    pub selection_threshold: f32,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            tile_size: 448,
            min_tiles: 1,
            max_tiles: 12,
            use_thumbnail: true,
            area_threshold: 600_000,
            selection_threshold: 0.25,
        }
    }
}

/// Top-level service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub listen_addr: String,
    /// Caption / VQA collaborator
    pub earthmind_endpoint: Option<String>,
    /// Segmentation collaborator
    pub remotesam_endpoint: Option<String>,
    pub classifier_endpoint: Option<String>,
    pub refiner_endpoint: Option<String>,
    pub attention_endpoint: Option<String>,
    pub request_timeout_secs: u64,
    /// Fall back to the keyword classifier when no classifier endpoint is set
    pub heuristic_classifier: bool,
    pub tiling: TilingConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            earthmind_endpoint: None,
            remotesam_endpoint: None,
            classifier_endpoint: None,
            refiner_endpoint: None,
            attention_endpoint: None,
            request_timeout_secs: 300,
            heuristic_classifier: true,
            tiling: TilingConfig::default(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: RouterConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Override fields from `GEONLI_*` environment variables.
    /// Unparseable numeric values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("GEONLI_LISTEN_ADDR") {
            self.listen_addr = val;
        }

        let endpoints = [
            ("GEONLI_EARTHMIND_ENDPOINT", &mut self.earthmind_endpoint),
            ("GEONLI_REMOTESAM_ENDPOINT", &mut self.remotesam_endpoint),
            ("GEONLI_CLASSIFIER_ENDPOINT", &mut self.classifier_endpoint),
            ("GEONLI_REFINER_ENDPOINT", &mut self.refiner_endpoint),
            ("GEONLI_ATTENTION_ENDPOINT", &mut self.attention_endpoint),
        ];
        for (key, slot) in endpoints {
            if let Ok(val) = std::env::var(key) {
                if !val.trim().is_empty() {
                    *slot = Some(val);
                }
            }
        }

        if let Ok(val) = std::env::var("GEONLI_REQUEST_TIMEOUT_SECS") {
            if let Ok(num) = val.parse() {
                self.request_timeout_secs = num;
            }
        }

        if let Ok(val) = std::env::var("GEONLI_HEURISTIC_CLASSIFIER") {
            if let Ok(flag) = val.parse() {
                self.heuristic_classifier = flag;
            }
        }

        if let Ok(val) = std::env::var("GEONLI_TILE_SIZE") {
            if let Ok(num) = val.parse() {
                self.tiling.tile_size = num;
            }
        }

        if let Ok(val) = std::env::var("GEONLI_MAX_TILES") {
            if let Ok(num) = val.parse() {
                self.tiling.max_tiles = num;
            }
        }

        if let Ok(val) = std::env::var("GEONLI_AREA_THRESHOLD") {
            if let Ok(num) = val.parse() {
                self.tiling.area_threshold = num;
            }
        }
    }

    /// Check the fields required to serve requests
    pub fn validate(&self) -> Result<()> {
        if self.earthmind_endpoint.is_none() {
            anyhow::bail!("earthmind_endpoint is not configured");
        }
        if self.remotesam_endpoint.is_none() {
            anyhow::bail!("remotesam_endpoint is not configured");
        }
        if self.tiling.tile_size == 0 {
            anyhow::bail!("tiling.tile_size must be positive");
        }
        if self.tiling.min_tiles > self.tiling.max_tiles {
            anyhow::bail!(
                "tiling.min_tiles ({}) exceeds tiling.max_tiles ({})",
                self.tiling.min_tiles,
                self.tiling.max_tiles
            );
        }
        Ok(())
    }
}
