// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::config::RouterConfig;

/// GeoNLI query router
#[derive(Parser, Debug, Default)]
#[command(name = "geonli-router")]
#[command(version)]
#[command(about = "Routes remote-sensing questions to caption and segmentation backends", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short = 'c', env = "GEONLI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind, e.g. 0.0.0.0:8000
    #[arg(long)]
    pub listen: Option<String>,

    /// Caption / VQA backend base URL
    #[arg(long)]
    pub earthmind_endpoint: Option<String>,

    /// Segmentation backend base URL
    #[arg(long)]
    pub remotesam_endpoint: Option<String>,

    /// Task classifier base URL
    #[arg(long)]
    pub classifier_endpoint: Option<String>,

    /// Prompt refiner base URL
    #[arg(long)]
    pub refiner_endpoint: Option<String>,

    /// Attention map service base URL used for tile selection
    #[arg(long)]
    pub attention_endpoint: Option<String>,

    /// Per-request backend timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Disable the keyword classifier fallback (routing falls back to a coin flip)
    #[arg(long)]
    pub no_heuristic_classifier: bool,
}

impl Cli {
    /// Resolve configuration: file (or defaults), then environment, then flags
    pub fn load_config(&self) -> Result<RouterConfig> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                RouterConfig::from_file(path)?
            }
            None => RouterConfig::default(),
        };
        config.apply_env();
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut RouterConfig) {
        if let Some(addr) = &self.listen {
            config.listen_addr = addr.clone();
        }
        let endpoints = [
            (&self.earthmind_endpoint, &mut config.earthmind_endpoint),
            (&self.remotesam_endpoint, &mut config.remotesam_endpoint),
            (&self.classifier_endpoint, &mut config.classifier_endpoint),
            (&self.refiner_endpoint, &mut config.refiner_endpoint),
            (&self.attention_endpoint, &mut config.attention_endpoint),
        ];
        for (flag, slot) in endpoints {
            if flag.is_some() {
                *slot = flag.clone();
            }
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout_secs = secs;
        }
        if self.no_heuristic_classifier {
            config.heuristic_classifier = false;
        }
    }
}
