// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /predict, /earthmind and /remotesam

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use super::common::*;

#[tokio::test]
async fn test_health_lists_models() {
    let response = get(echo_app(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["models"], json!(["earthmind", "remotesam"]));
}

#[tokio::test]
async fn test_version_reports_features() {
    let response = get(echo_app(), "/version").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["features"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f == "structured-eval"));
}

#[tokio::test]
async fn test_invalid_json_is_400() {
    let response = post_raw(echo_app(), "/predict", "{not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "Invalid JSON body");
}

#[tokio::test]
async fn test_missing_images_is_400() {
    let response = post_json(echo_app(), "/earthmind", &json!({"text": "Describe"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["detail"],
        "No images provided. Send `images`, `image`, or `image_paths`."
    );
}

#[tokio::test]
async fn test_bad_base64_is_400() {
    let response = post_json(
        echo_app(),
        "/predict",
        &json!({"image": "not an image", "text": "Describe"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_path_is_400() {
    let response = post_json(
        echo_app(),
        "/remotesam",
        &json!({"image_paths": ["/no/such/frame.png"], "text": "Find roads"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["detail"],
        "Image path not found: /no/such/frame.png"
    );
}

#[tokio::test]
async fn test_forced_endpoints() {
    let body = json!({"image": png_base64(), "text": "Describe this image"});

    let response = post_json(echo_app(), "/earthmind", &body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let prediction = body_json(response).await;
    assert_eq!(
        prediction["prediction"],
        "earthmind saw 1 frame(s): Describe this image"
    );
    assert!(prediction.get("mask").is_none());
    assert!(prediction.get("obbs").is_none());

    let response = post_json(echo_app(), "/remotesam", &body).await;
    let prediction = body_json(response).await;
    assert!(prediction["prediction"]
        .as_str()
        .unwrap()
        .starts_with("remotesam"));
}

#[tokio::test]
async fn test_frames_from_local_paths() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    image::RgbImage::new(8, 8).save(&path).unwrap();
    let path = path.to_string_lossy().to_string();

    let response = post_json(
        echo_app(),
        "/earthmind",
        &json!({"image_paths": [path.clone(), path], "text": "Compare"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["prediction"],
        "earthmind saw 2 frame(s): Compare"
    );
}

#[tokio::test]
async fn test_select_out_of_range_is_400() {
    let response = post_json(
        echo_app(),
        "/earthmind",
        &json!({"images": [png_base64()], "text": "Describe", "select": 4}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_backend_failure_is_500() {
    let app = app_with(Arc::new(FailingBackend), Arc::new(FailingBackend));
    let response = post_json(
        app,
        "/earthmind",
        &json!({"image": png_base64(), "text": "Describe"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body_json(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Model execution failed"));
    assert!(detail.contains("CUDA out of memory"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let response = get(echo_app(), "/v1/models").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
