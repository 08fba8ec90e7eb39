// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Structured document evaluation: one backend call per present sub-query,
//! answers written only to their own slots.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use geonli_router::backends::{BackendContext, BackendResult};
use geonli_router::router::{QueryDocument, QueryRouter, RouterError};
use serde_json::{json, Value};

use super::common::*;

fn document(queries: Value) -> QueryDocument {
    serde_json::from_value(json!({
        "input_image": {
            "image_id": "P0001.png",
            "image_url": "https://example.invalid/P0001.png",
            "metadata": {"width": 64, "height": 64, "spatial_resolution_m": 0.5}
        },
        "queries": queries
    }))
    .unwrap()
}

/// Answers depend on which format instruction the prompt carries
fn by_suffix(prompt: &str) -> anyhow::Result<BackendResult> {
    let answer = if prompt.contains("'Yes' or 'No'") {
        "Yes, there is."
    } else if prompt.contains("numeric value") {
        "There are 12 cars"
    } else if prompt.contains("1 to 5 words") {
        "dark grey asphalt roof with some extra words here and there again"
    } else {
        "A harbour with several ships."
    };
    Ok(BackendResult::text(answer))
}

#[tokio::test]
async fn test_caption_and_binary_make_two_calls() {
    let earthmind = ScriptedBackend::new(by_suffix);
    let remotesam = ScriptedBackend::answering("unused");
    let router = QueryRouter::new(context(&earthmind, &remotesam));

    let doc = document(json!({
        "caption_query": {"instruction": "Describe the scene."},
        "attribute_query": {"binary": {"instruction": "Is there a ship?"}}
    }));

    let out = router.evaluate(doc, scene()).await.unwrap();

    assert_eq!(earthmind.call_count(), 2);
    assert_eq!(remotesam.call_count(), 0);

    let caption = out.queries.caption_query.unwrap();
    assert_eq!(caption.response.as_deref(), Some("A harbour with several ships."));
    let binary = out.queries.attribute_query.unwrap().binary.unwrap();
    assert_eq!(binary.response.as_deref(), Some("Yes"));
}

#[tokio::test]
async fn test_numeric_adds_third_call() {
    let earthmind = ScriptedBackend::new(by_suffix);
    let remotesam = ScriptedBackend::answering("unused");
    let router = QueryRouter::new(context(&earthmind, &remotesam));

    let doc = document(json!({
        "caption_query": {"instruction": "Describe the scene."},
        "attribute_query": {
            "binary": {"instruction": "Is there a ship?"},
            "numeric": {"instruction": "How many cars are parked?"}
        }
    }));

    let out = router.evaluate(doc, scene()).await.unwrap();

    assert_eq!(earthmind.call_count(), 3);
    let numeric = out.queries.attribute_query.unwrap().numeric.unwrap();
    assert_eq!(numeric.response, Some(12.0));
}

#[tokio::test]
async fn test_answers_stay_in_their_slots() {
    let earthmind = ScriptedBackend::new(by_suffix);
    let remotesam = ScriptedBackend::new(|_| {
        Ok(with_mask(mask_b64(64, 64, &[(8, 8, 20, 10), (40, 40, 12, 12)])))
    });
    let router = QueryRouter::new(context(&earthmind, &remotesam));

    let doc = document(json!({
        "caption_query": {"instruction": "Describe the scene."},
        "grounding_query": {"instruction": "Locate the buildings."},
        "attribute_query": {
            "binary": {"instruction": "Is there a ship?"},
            "numeric": {"instruction": "How many cars are parked?"},
            "semantic": {"instruction": "What colour is the roof?"}
        }
    }));

    let out = router.evaluate(doc, scene()).await.unwrap();
    let queries = out.queries;

    assert_eq!(
        queries.caption_query.unwrap().response.as_deref(),
        Some("A harbour with several ships.")
    );

    let attrs = queries.attribute_query.unwrap();
    assert_eq!(attrs.binary.unwrap().response.as_deref(), Some("Yes"));
    assert_eq!(attrs.numeric.unwrap().response, Some(12.0));
    let semantic = attrs.semantic.unwrap().response.unwrap();
    assert_eq!(semantic.split_whitespace().count(), 10);
    assert!(semantic.starts_with("dark grey asphalt roof"));

    let objects = queries.grounding_query.unwrap().response.unwrap();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0].object_id, "1");
    assert_eq!(objects[1].object_id, "2");
    for object in &objects {
        assert!(object.obbox.0.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    assert_eq!(earthmind.call_count(), 4);
    assert_eq!(remotesam.call_count(), 1);
}

#[tokio::test]
async fn test_sub_queries_run_concurrently() {
    // Four earthmind calls plus one grounding call, all parked at once
    let gate = Arc::new(tokio::sync::Barrier::new(5));
    let earthmind = ScriptedBackend::new(by_suffix);
    let remotesam = ScriptedBackend::new(|_| Ok(with_mask(mask_b64(64, 64, &[(8, 8, 20, 10)]))));
    let router = QueryRouter::new(BackendContext::new(
        Arc::new(GatedBackend {
            gate: gate.clone(),
            inner: earthmind.clone(),
        }),
        Arc::new(GatedBackend {
            gate,
            inner: remotesam.clone(),
        }),
    ));

    let doc = document(json!({
        "caption_query": {"instruction": "Describe the scene."},
        "grounding_query": {"instruction": "Locate the buildings."},
        "attribute_query": {
            "binary": {"instruction": "Is there a ship?"},
            "numeric": {"instruction": "How many cars are parked?"},
            "semantic": {"instruction": "What colour is the roof?"}
        }
    }));

    let out = tokio::time::timeout(Duration::from_secs(5), router.evaluate(doc, scene()))
        .await
        .expect("sub-queries were awaited one after another")
        .unwrap();

    assert_eq!(earthmind.call_count(), 4);
    assert_eq!(remotesam.call_count(), 1);
    assert_eq!(out.queries.grounding_query.unwrap().response.unwrap().len(), 1);
}

#[tokio::test]
async fn test_grounding_refines_before_segmenting() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let earthmind = ScriptedBackend::new(by_suffix);
    let segment_log = log.clone();
    let remotesam = ScriptedBackend::new(move |prompt| {
        segment_log.lock().unwrap().push(format!("segment {}", prompt));
        Ok(with_mask(mask_b64(64, 64, &[(8, 8, 20, 10)])))
    });
    let router = QueryRouter::new(
        context(&earthmind, &remotesam).with_refiner(Arc::new(LoggingRefiner(log.clone()))),
    );

    let doc = document(json!({
        "caption_query": {"instruction": "Describe the scene."},
        "grounding_query": {"instruction": "Locate the buildings."}
    }));

    router.evaluate(doc, scene()).await.unwrap();

    let events = log.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "refine Locate the buildings.".to_string(),
            "segment refined: Locate the buildings.".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_area_numeric_uses_segmentation_and_gsd() {
    let earthmind = ScriptedBackend::new(by_suffix);
    let remotesam =
        ScriptedBackend::new(|_| Ok(with_mask(mask_b64(64, 64, &[(4, 4, 10, 20)]))));
    let router = QueryRouter::new(
        context(&earthmind, &remotesam).with_refiner(std::sync::Arc::new(TaggingRefiner)),
    );

    let doc = document(json!({
        "attribute_query": {
            "numeric": {"instruction": "What is the area of the lake?"}
        }
    }));

    let out = router.evaluate(doc, scene()).await.unwrap();

    assert_eq!(earthmind.call_count(), 0);
    assert_eq!(
        remotesam.calls(),
        vec!["refined: What is the area of the lake?".to_string()]
    );
    // 200 px at 0.5 m/px
    let numeric = out.queries.attribute_query.unwrap().numeric.unwrap();
    assert_eq!(numeric.response, Some(50.0));
}

#[tokio::test]
async fn test_area_failure_answers_zero() {
    let earthmind = ScriptedBackend::new(by_suffix);
    let remotesam = ScriptedBackend::new(|_| Err(anyhow!("segmentation service down")));
    let router = QueryRouter::new(context(&earthmind, &remotesam));

    let doc = document(json!({
        "caption_query": {"instruction": "Describe the scene."},
        "attribute_query": {"numeric": {"instruction": "Total area of water?"}}
    }));

    let out = router.evaluate(doc, scene()).await.unwrap();
    let numeric = out.queries.attribute_query.unwrap().numeric.unwrap();
    assert_eq!(numeric.response, Some(0.0));
    assert!(out.queries.caption_query.unwrap().response.is_some());
}

#[tokio::test]
async fn test_caption_failure_fails_document() {
    let earthmind = ScriptedBackend::new(|_| Err(anyhow!("model crashed")));
    let remotesam = ScriptedBackend::answering("unused");
    let router = QueryRouter::new(context(&earthmind, &remotesam));

    let doc = document(json!({"caption_query": {"instruction": "Describe the scene."}}));

    let err = router.evaluate(doc, scene()).await.unwrap_err();
    assert!(matches!(err, RouterError::Backend(_)));
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn test_unknown_fields_survive() {
    let earthmind = ScriptedBackend::new(by_suffix);
    let remotesam = ScriptedBackend::answering("unused");
    let router = QueryRouter::new(context(&earthmind, &remotesam));

    let doc = document(json!({
        "caption_query": {"instruction": "Describe the scene.", "query_id": 7}
    }));

    let out = router.evaluate(doc, scene()).await.unwrap();
    let value = serde_json::to_value(&out).unwrap();

    assert_eq!(value["input_image"]["image_id"], "P0001.png");
    assert_eq!(value["input_image"]["metadata"]["width"], 64);
    assert_eq!(value["queries"]["caption_query"]["query_id"], 7);
    assert!(value["queries"].get("grounding_query").is_none());
    assert_eq!(earthmind.call_count(), 1);
}
