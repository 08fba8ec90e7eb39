// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Single-backend routing: classifier choice, overrides and the area path

use std::sync::Arc;

use geonli_router::backends::{ModelKind, TaskKind};
use geonli_router::router::{PredictInput, QueryRouter, RouterError};

use super::common::*;

fn input(text: &str) -> PredictInput {
    PredictInput {
        text: text.to_string(),
        frames: vec![scene()],
        select: -1,
        model: None,
        gsd: None,
    }
}

#[tokio::test]
async fn test_area_question_measures_mask() {
    let earthmind = ScriptedBackend::answering("unused");
    let mask = mask_b64(64, 64, &[(5, 5, 10, 20)]);
    let reply_mask = mask.clone();
    let remotesam = ScriptedBackend::new(move |_| Ok(with_mask(reply_mask.clone())));
    let router = QueryRouter::new(
        context(&earthmind, &remotesam).with_classifier(Arc::new(FixedClassifier(TaskKind::Caption))),
    );

    let prediction = router
        .route(input("What is the area of the lake?"), None)
        .await
        .unwrap();

    assert_eq!(prediction.model, ModelKind::RemoteSam);
    assert_eq!(prediction.prediction, "200.0");
    assert_eq!(prediction.area_sq_meters, Some(200.0));
    assert_eq!(prediction.gsd_used, Some(1.0));
    assert_eq!(prediction.mask.as_deref(), Some(mask.as_str()));
    assert!(prediction.obbs.is_none());
    assert_eq!(earthmind.call_count(), 0);
}

#[tokio::test]
async fn test_area_scales_with_gsd() {
    let earthmind = ScriptedBackend::answering("unused");
    let remotesam =
        ScriptedBackend::new(|_| Ok(with_mask(mask_b64(64, 64, &[(5, 5, 10, 20)]))));
    let router = QueryRouter::new(context(&earthmind, &remotesam));

    let mut request = input("Estimate the AREA of the field");
    request.gsd = Some(2.0);
    let prediction = router.route(request, None).await.unwrap();

    assert_eq!(prediction.area_sq_meters, Some(800.0));
    assert_eq!(prediction.gsd_used, Some(2.0));
    assert_eq!(prediction.prediction, "800.0");
}

#[tokio::test]
async fn test_area_without_mask_reports_error() {
    let earthmind = ScriptedBackend::answering("unused");
    let remotesam = ScriptedBackend::answering("nothing found");
    let router = QueryRouter::new(context(&earthmind, &remotesam));

    let prediction = router.route(input("area of the pond"), None).await.unwrap();

    assert_eq!(prediction.prediction, "0.0");
    assert!(prediction.error.is_some());
    assert!(prediction.area_sq_meters.is_none());
}

#[tokio::test]
async fn test_classifier_sends_captions_to_earthmind() {
    let earthmind = ScriptedBackend::answering("A river delta.");
    let remotesam = ScriptedBackend::answering("unused");
    let router = QueryRouter::new(
        context(&earthmind, &remotesam).with_classifier(Arc::new(FixedClassifier(TaskKind::Caption))),
    );

    let prediction = router.route(input("Describe this image"), None).await.unwrap();

    assert_eq!(prediction.model, ModelKind::EarthMind);
    assert_eq!(prediction.prediction, "A river delta.");
    assert!(prediction.mask.is_none());
    assert!(prediction.obbs.is_none());
    assert_eq!(earthmind.calls(), vec!["Describe this image".to_string()]);
    assert_eq!(remotesam.call_count(), 0);
}

#[tokio::test]
async fn test_grounding_goes_to_segmentation_with_boxes() {
    let earthmind = ScriptedBackend::answering("unused");
    let remotesam = ScriptedBackend::new(|_| {
        Ok(with_mask(mask_b64(64, 64, &[(4, 4, 16, 16), (40, 36, 18, 12)])))
    });
    let router = QueryRouter::new(
        context(&earthmind, &remotesam)
            .with_classifier(Arc::new(FixedClassifier(TaskKind::Grounding)))
            .with_refiner(Arc::new(TaggingRefiner)),
    );

    let prediction = router
        .route(input("Locate all storage tanks"), None)
        .await
        .unwrap();

    assert_eq!(prediction.model, ModelKind::RemoteSam);
    assert_eq!(
        remotesam.calls(),
        vec!["refined: Locate all storage tanks".to_string()]
    );
    let obbs = prediction.obbs.unwrap();
    assert_eq!(obbs.len(), 2);
    assert!(prediction.mask.is_some());
}

#[tokio::test]
async fn test_forced_route_bypasses_area_path() {
    let earthmind = ScriptedBackend::answering("The area is mostly farmland.");
    let remotesam = ScriptedBackend::answering("unused");
    let router = QueryRouter::new(context(&earthmind, &remotesam));

    let prediction = router
        .route(input("Describe the area"), Some(ModelKind::EarthMind))
        .await
        .unwrap();

    assert_eq!(prediction.prediction, "The area is mostly farmland.");
    assert!(prediction.area_sq_meters.is_none());
    assert_eq!(remotesam.call_count(), 0);
}

#[tokio::test]
async fn test_body_model_override() {
    let earthmind = ScriptedBackend::answering("unused");
    let remotesam = ScriptedBackend::answering("segmented");
    let router = QueryRouter::new(
        context(&earthmind, &remotesam).with_classifier(Arc::new(FixedClassifier(TaskKind::Caption))),
    );

    let mut request = input("Describe this image");
    request.model = Some("remotesam".to_string());
    let prediction = router.route(request, None).await.unwrap();

    assert_eq!(prediction.model, ModelKind::RemoteSam);
    assert_eq!(earthmind.call_count(), 0);
}

#[tokio::test]
async fn test_body_model_bypasses_area_path() {
    let earthmind = ScriptedBackend::answering("The area is mostly farmland.");
    let remotesam = ScriptedBackend::answering("unused");
    let router = QueryRouter::new(context(&earthmind, &remotesam));

    let mut request = input("Describe the area");
    request.model = Some("earthmind".to_string());
    let prediction = router.route(request, None).await.unwrap();

    assert_eq!(prediction.model, ModelKind::EarthMind);
    assert!(prediction.area_sq_meters.is_none());
    assert_eq!(remotesam.call_count(), 0);
}

#[tokio::test]
async fn test_select_out_of_range() {
    let earthmind = ScriptedBackend::answering("unused");
    let remotesam = ScriptedBackend::answering("unused");
    let router = QueryRouter::new(context(&earthmind, &remotesam));

    let mut request = input("Describe");
    request.select = 3;
    let err = router
        .route(request, Some(ModelKind::EarthMind))
        .await
        .unwrap_err();

    assert!(matches!(err, RouterError::SelectOutOfRange { select: 3, frames: 1 }));
    assert!(err.is_client_error());
    assert_eq!(earthmind.call_count(), 0);
}
