// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Scripted collaborators shared by the router tests

use std::sync::{Arc, Mutex};

use tokio::sync::Barrier;

use anyhow::Result;
use async_trait::async_trait;
use geonli_router::backends::{
    BackendContext, BackendResult, InferenceBackend, PromptRefiner, TaskClassifier, TaskKind,
};
use geonli_router::geometry::encode_mask;
use image::{DynamicImage, GrayImage, Luma, RgbImage};

type Reply = Box<dyn Fn(&str) -> Result<BackendResult> + Send + Sync>;

/// Backend that records every prompt and answers via a closure
pub struct ScriptedBackend {
    calls: Mutex<Vec<String>>,
    reply: Reply,
}

impl ScriptedBackend {
    pub fn new(reply: impl Fn(&str) -> Result<BackendResult> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            reply: Box::new(reply),
        })
    }

    pub fn answering(text: &'static str) -> Arc<Self> {
        Self::new(move |_| Ok(BackendResult::text(text)))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn predict(
        &self,
        text: &str,
        _frames: &[DynamicImage],
        _select: i64,
        _task_type: Option<TaskKind>,
    ) -> Result<BackendResult> {
        self.calls.lock().unwrap().push(text.to_string());
        (self.reply)(text)
    }
}

/// Backend that holds every call at a shared barrier before answering
pub struct GatedBackend {
    pub gate: Arc<Barrier>,
    pub inner: Arc<ScriptedBackend>,
}

#[async_trait]
impl InferenceBackend for GatedBackend {
    async fn predict(
        &self,
        text: &str,
        frames: &[DynamicImage],
        select: i64,
        task_type: Option<TaskKind>,
    ) -> Result<BackendResult> {
        self.gate.wait().await;
        self.inner.predict(text, frames, select, task_type).await
    }
}

pub struct FixedClassifier(pub TaskKind);

#[async_trait]
impl TaskClassifier for FixedClassifier {
    async fn classify(&self, _text: &str) -> Result<TaskKind> {
        Ok(self.0)
    }
}

/// Refiner that prefixes prompts so tests can see it ran
pub struct TaggingRefiner;

#[async_trait]
impl PromptRefiner for TaggingRefiner {
    async fn refine_prompt(&self, text: &str) -> Result<String> {
        Ok(format!("refined: {}", text))
    }
}

/// Refiner that appends to a shared event log
pub struct LoggingRefiner(pub Arc<Mutex<Vec<String>>>);

#[async_trait]
impl PromptRefiner for LoggingRefiner {
    async fn refine_prompt(&self, text: &str) -> Result<String> {
        self.0.lock().unwrap().push(format!("refine {}", text));
        Ok(format!("refined: {}", text))
    }
}

pub fn context(earthmind: &Arc<ScriptedBackend>, remotesam: &Arc<ScriptedBackend>) -> BackendContext {
    BackendContext::new(earthmind.clone(), remotesam.clone())
}

pub fn scene() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::new(64, 64))
}

/// Base64 PNG mask with the given `(x, y, w, h)` rectangles set to 255
pub fn mask_b64(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> String {
    let mut mask = GrayImage::new(width, height);
    for &(x0, y0, w, h) in rects {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }
    encode_mask(&DynamicImage::ImageLuma8(mask)).unwrap()
}

pub fn with_mask(mask: String) -> BackendResult {
    BackendResult {
        prediction: "segmented".to_string(),
        mask: Some(mask),
        obbs: None,
    }
}
