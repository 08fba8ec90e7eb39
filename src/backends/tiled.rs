// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption / VQA backend wrapper that prunes large frames to relevant tiles

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use tracing::debug;

use super::{BackendResult, FramePolicy, InferenceBackend, TaskKind};
use crate::vision::preprocess::TilePreprocessor;

/// Runs attention-guided tile selection for VQA questions before forwarding.
///
/// VQA requests use one frame (`select > 0` picks it, otherwise the first)
/// and the inner backend receives the selected tiles with `select = 0`.
/// Every other task type is forwarded unchanged.
pub struct TiledBackend {
    inner: Arc<dyn InferenceBackend>,
    preprocessor: TilePreprocessor,
}

impl TiledBackend {
    pub fn new(inner: Arc<dyn InferenceBackend>, preprocessor: TilePreprocessor) -> Self {
        Self {
            inner,
            preprocessor,
        }
    }
}

#[async_trait]
impl InferenceBackend for TiledBackend {
    async fn predict(
        &self,
        text: &str,
        frames: &[DynamicImage],
        select: i64,
        task_type: Option<TaskKind>,
    ) -> Result<BackendResult> {
        if task_type != Some(TaskKind::Vqa) {
            return self.inner.predict(text, frames, select, task_type).await;
        }

        let frame = FramePolicy::Single
            .apply(frames, select)
            .and_then(|f| f.first())
            .with_context(|| {
                format!("select={} is out of range for {} frames", select, frames.len())
            })?;

        let tiles = self.preprocessor.prepare(frame, text).await;
        debug!("Forwarding {} tiles for VQA", tiles.len());
        self.inner.predict(text, &tiles, 0, task_type).await
    }
}
