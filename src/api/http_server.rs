// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::errors::ApiError;
use super::geonli::eval_handler;
use super::handlers::{health_handler, version_handler};
use super::predict::{earthmind_handler, predict_handler, remotesam_handler};
use crate::router::QueryRouter;

/// Request bodies carry base64 frames, so the limit sits well above axum's default
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<QueryRouter>,
    /// Client used to fetch remote `image_url` references
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(router: QueryRouter, fetch_timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder().timeout(fetch_timeout).build()?;
        Ok(Self {
            router: Arc::new(router),
            http_client,
        })
    }
}

/// Build the service router with every endpoint mounted
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/predict", post(predict_handler))
        .route("/earthmind", post(earthmind_handler))
        .route("/remotesam", post(remotesam_handler))
        .route("/geoNLI/eval", post(eval_handler))
        .fallback(|| async { ApiError::NotFound("no such endpoint".to_string()) })
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(listen_addr: &str, state: AppState) -> anyhow::Result<()> {
    let addr = listen_addr.parse::<SocketAddr>()?;
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("GeoNLI router listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
