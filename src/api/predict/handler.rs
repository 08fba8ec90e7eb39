// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-backend prediction handlers

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};

use super::request::PredictRequest;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::backends::ModelKind;
use crate::router::Prediction;

/// POST /predict - route to whichever backend fits the prompt
pub async fn predict_handler(
    State(state): State<AppState>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<Prediction>, ApiError> {
    handle_predict(state, body, None).await
}

/// POST /earthmind - always use the caption / VQA backend
pub async fn earthmind_handler(
    State(state): State<AppState>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<Prediction>, ApiError> {
    handle_predict(state, body, Some(ModelKind::EarthMind)).await
}

/// POST /remotesam - always use the segmentation backend
pub async fn remotesam_handler(
    State(state): State<AppState>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<Prediction>, ApiError> {
    handle_predict(state, body, Some(ModelKind::RemoteSam)).await
}

async fn handle_predict(
    state: AppState,
    body: Result<Json<PredictRequest>, JsonRejection>,
    forced: Option<ModelKind>,
) -> Result<Json<Prediction>, ApiError> {
    let Json(request) = body?;
    let input = request.into_input()?;
    let prediction = state.router.route(input, forced).await?;
    Ok(Json(prediction))
}
