// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use tracing::info;

use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::router::{resolve_document_image, QueryDocument};

/// POST /geoNLI/eval - answer every sub-query of the document in place
pub async fn eval_handler(
    State(state): State<AppState>,
    body: Result<Json<QueryDocument>, JsonRejection>,
) -> Result<Json<QueryDocument>, ApiError> {
    let Json(doc) = body?;

    let image = resolve_document_image(&state.http_client, &doc.input_image).await?;
    info!(
        "Evaluating query document on {}x{} image",
        image.width(),
        image.height()
    );

    let answered = state.router.evaluate(doc, image).await?;
    Ok(Json(answered))
}
