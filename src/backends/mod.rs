// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inference collaborators behind narrow async contracts
//!
//! The router never talks to a model directly. Caption/VQA and segmentation
//! models, the task classifier and the prompt refiner are all reached through
//! the traits in this module, so they can be swapped or mocked freely.

pub mod classifier;
pub mod http;
pub mod tiled;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::RouterConfig;
use crate::geometry::Obb;
use crate::vision::preprocess::{AttentionSource, TilePreprocessor};

pub use classifier::HeuristicClassifier;
pub use http::{HttpAttentionSource, HttpBackend, HttpClassifier, HttpPromptRefiner};
pub use tiled::TiledBackend;

/// Task label produced by a classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Caption,
    Vqa,
    Grounding,
    Area,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Caption => "caption",
            TaskKind::Vqa => "vqa",
            TaskKind::Grounding => "grounding",
            TaskKind::Area => "area",
        }
    }

    /// Parse a classifier label; `captioning` is accepted as `caption`
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "caption" | "captioning" => Some(TaskKind::Caption),
            "vqa" => Some(TaskKind::Vqa),
            "grounding" => Some(TaskKind::Grounding),
            "area" => Some(TaskKind::Area),
            _ => None,
        }
    }

    /// Tasks answered by the segmentation backend
    pub fn needs_segmentation(&self) -> bool {
        matches!(self, TaskKind::Grounding | TaskKind::Area)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two model backends a request can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Caption / VQA model
    EarthMind,
    /// Segmentation model
    RemoteSam,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::EarthMind, ModelKind::RemoteSam];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::EarthMind => "earthmind",
            ModelKind::RemoteSam => "remotesam",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "earthmind" => Some(ModelKind::EarthMind),
            "remotesam" => Some(ModelKind::RemoteSam),
            _ => None,
        }
    }

    pub fn for_task(task: TaskKind) -> Self {
        if task.needs_segmentation() {
            ModelKind::RemoteSam
        } else {
            ModelKind::EarthMind
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw output of a model backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendResult {
    pub prediction: String,
    /// Base64 PNG single-channel mask
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obbs: Option<Vec<Obb>>,
}

impl BackendResult {
    pub fn text(prediction: impl Into<String>) -> Self {
        Self {
            prediction: prediction.into(),
            ..Default::default()
        }
    }
}

/// How a backend consumes the frame set for a given `select`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePolicy {
    /// `select > 0` picks `frames[select-1]`, otherwise the first frame
    Single,
    /// `select > 0` picks `frames[select-1]`, otherwise every frame
    SelectedOrAll,
}

impl FramePolicy {
    /// Frames a backend should see, or `None` when `select` is out of range
    /// or the frame set is empty.
    pub fn apply<'a>(&self, frames: &'a [DynamicImage], select: i64) -> Option<&'a [DynamicImage]> {
        if frames.is_empty() {
            return None;
        }
        if select > 0 {
            let idx = usize::try_from(select - 1).ok()?;
            return frames.get(idx..=idx);
        }
        match self {
            FramePolicy::Single => Some(&frames[..1]),
            FramePolicy::SelectedOrAll => Some(frames),
        }
    }
}

/// Caption / VQA or segmentation model
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn predict(
        &self,
        text: &str,
        frames: &[DynamicImage],
        select: i64,
        task_type: Option<TaskKind>,
    ) -> Result<BackendResult>;
}

/// Maps free text to a task label
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<TaskKind>;
}

/// Rewrites a grounding / area instruction into a segmentation prompt
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PromptRefiner: Send + Sync {
    async fn refine_prompt(&self, text: &str) -> Result<String>;
}

/// Substring override shared by every classifier
pub(crate) fn mentions_area(text: &str) -> bool {
    text.to_lowercase().contains("area")
}

/// Process-wide, read-only handles to the collaborators
#[derive(Clone)]
pub struct BackendContext {
    pub earthmind: Arc<dyn InferenceBackend>,
    pub remotesam: Arc<dyn InferenceBackend>,
    pub classifier: Option<Arc<dyn TaskClassifier>>,
    pub refiner: Option<Arc<dyn PromptRefiner>>,
}

impl BackendContext {
    pub fn new(earthmind: Arc<dyn InferenceBackend>, remotesam: Arc<dyn InferenceBackend>) -> Self {
        Self {
            earthmind,
            remotesam,
            classifier: None,
            refiner: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn TaskClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_refiner(mut self, refiner: Arc<dyn PromptRefiner>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    pub fn backend(&self, model: ModelKind) -> &Arc<dyn InferenceBackend> {
        match model {
            ModelKind::EarthMind => &self.earthmind,
            ModelKind::RemoteSam => &self.remotesam,
        }
    }

    /// Wire HTTP collaborators from configuration
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        config.validate()?;
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let earthmind_url = config.earthmind_endpoint.as_deref().unwrap_or_default();
        let remotesam_url = config.remotesam_endpoint.as_deref().unwrap_or_default();

        let attention: Option<Arc<dyn AttentionSource>> = match &config.attention_endpoint {
            Some(url) => Some(Arc::new(HttpAttentionSource::new(url, timeout)?)),
            None => None,
        };
        let earthmind_http = HttpBackend::new(earthmind_url, FramePolicy::SelectedOrAll, timeout)?;
        let earthmind = TiledBackend::new(
            Arc::new(earthmind_http),
            TilePreprocessor::new(config.tiling.clone(), attention),
        );
        let remotesam = HttpBackend::new(remotesam_url, FramePolicy::Single, timeout)?;

        let mut context = Self::new(Arc::new(earthmind), Arc::new(remotesam));

        if let Some(url) = &config.classifier_endpoint {
            context = context.with_classifier(Arc::new(HttpClassifier::new(url, timeout)?));
        } else if config.heuristic_classifier {
            info!("No classifier endpoint configured; using keyword classifier");
            context = context.with_classifier(Arc::new(HeuristicClassifier));
        }

        if let Some(url) = &config.refiner_endpoint {
            context = context.with_refiner(Arc::new(HttpPromptRefiner::new(url, timeout)?));
        }

        Ok(context)
    }
}
