// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! JSON-over-HTTP clients for the model collaborators

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::{
    mentions_area, BackendResult, FramePolicy, InferenceBackend, PromptRefiner, TaskClassifier,
    TaskKind,
};
use crate::vision::image_utils::encode_png_base64;
use crate::vision::preprocess::{AttentionSource, TokenGrid};

// --- Wire structs ---

#[derive(Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
    images: Vec<String>,
    select: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_type: Option<TaskKind>,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(serde::Deserialize)]
struct ClassifyResponse {
    label: String,
}

#[derive(serde::Deserialize)]
struct RefineResponse {
    refined: String,
}

#[derive(Serialize)]
struct AttentionRequest<'a> {
    text: &'a str,
    image: String,
}

/// Shared client plumbing: one pooled `reqwest::Client` per collaborator
struct JsonEndpoint {
    client: Client,
    endpoint: String,
}

impl JsonEndpoint {
    fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = endpoint.trim_end_matches('/').to_string();
        Ok(Self { client, endpoint })
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}/{}", self.endpoint, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} returned HTTP {}: {}", url, status, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Invalid response body from {}", url))
    }
}

/// Model backend served at `{endpoint}/predict`
pub struct HttpBackend {
    inner: JsonEndpoint,
    policy: FramePolicy,
}

impl HttpBackend {
    pub fn new(endpoint: &str, policy: FramePolicy, timeout: Duration) -> Result<Self> {
        let inner = JsonEndpoint::new(endpoint, timeout)?;
        info!(
            "Model backend configured: endpoint={}, frames={:?}",
            inner.endpoint, policy
        );
        Ok(Self { inner, policy })
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }
}

#[async_trait]
impl InferenceBackend for HttpBackend {
    async fn predict(
        &self,
        text: &str,
        frames: &[DynamicImage],
        select: i64,
        task_type: Option<TaskKind>,
    ) -> Result<BackendResult> {
        let start = std::time::Instant::now();
        let chosen = self.policy.apply(frames, select).with_context(|| {
            format!("select={} is out of range for {} frames", select, frames.len())
        })?;

        let images = chosen
            .iter()
            .map(encode_png_base64)
            .collect::<Result<Vec<_>, _>>()?;

        let request = PredictRequest {
            text,
            images,
            select,
            task_type,
        };
        let result: BackendResult = self.inner.post("predict", &request).await?;

        debug!(
            "{} answered in {}ms (mask: {})",
            self.inner.endpoint,
            start.elapsed().as_millis(),
            result.mask.is_some()
        );
        Ok(result)
    }
}

/// Remote task classifier served at `{endpoint}/classify`
pub struct HttpClassifier {
    inner: JsonEndpoint,
}

impl HttpClassifier {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            inner: JsonEndpoint::new(endpoint, timeout)?,
        })
    }
}

#[async_trait]
impl TaskClassifier for HttpClassifier {
    async fn classify(&self, text: &str) -> Result<TaskKind> {
        if mentions_area(text) {
            return Ok(TaskKind::Area);
        }

        let response: ClassifyResponse = self.inner.post("classify", &TextRequest { text }).await?;
        Ok(TaskKind::from_label(&response.label).unwrap_or_else(|| {
            debug!("Unknown classifier label '{}', treating as caption", response.label);
            TaskKind::Caption
        }))
    }
}

/// Remote prompt refiner served at `{endpoint}/refine`
pub struct HttpPromptRefiner {
    inner: JsonEndpoint,
}

impl HttpPromptRefiner {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            inner: JsonEndpoint::new(endpoint, timeout)?,
        })
    }
}

#[async_trait]
impl PromptRefiner for HttpPromptRefiner {
    async fn refine_prompt(&self, text: &str) -> Result<String> {
        let response: RefineResponse = self.inner.post("refine", &TextRequest { text }).await?;
        Ok(response.refined)
    }
}

/// Remote attention map provider served at `{endpoint}/attention`
pub struct HttpAttentionSource {
    inner: JsonEndpoint,
}

impl HttpAttentionSource {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            inner: JsonEndpoint::new(endpoint, timeout)?,
        })
    }
}

#[async_trait]
impl AttentionSource for HttpAttentionSource {
    async fn attention_map(&self, image: &DynamicImage, prompt: &str) -> Result<TokenGrid> {
        let request = AttentionRequest {
            text: prompt,
            image: encode_png_base64(image)?,
        };
        self.inner.post("attention", &request).await
    }
}
