// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use geonli_router::{
    api::{start_server, AppState},
    backends::BackendContext,
    cli::Cli,
    router::QueryRouter,
    version,
};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting {}", version::get_version_string());

    let cli = Cli::parse();
    let config = cli.load_config()?;

    let backends = BackendContext::from_config(&config)?;
    tracing::info!(
        "Backends: earthmind={:?} remotesam={:?} classifier={} refiner={}",
        config.earthmind_endpoint,
        config.remotesam_endpoint,
        backends.classifier.is_some(),
        backends.refiner.is_some(),
    );

    let state = AppState::new(
        QueryRouter::new(backends),
        Duration::from_secs(config.request_timeout_secs),
    )?;

    tokio::select! {
        result = start_server(&config.listen_addr, state) => result?,
        _ = signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
