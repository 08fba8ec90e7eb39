// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-request backend selection and multi-part fan-out

use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::RouterError;
use super::parsing::{parse_binary, parse_numeric, parse_semantic};
use super::prompts::{binary_prompt, caption_prompt, numeric_prompt, semantic_prompt};
use super::query::{GroundedObject, InputImage, QueryDocument};
use crate::backends::{mentions_area, BackendContext, BackendResult, ModelKind, TaskKind};
use crate::geometry::{area_from_gray, decode_mask, extract_from_gray, Obb, DEFAULT_GSD};
use crate::vision::image_utils::load_image_reference;

/// `select` value meaning "no explicit frame" for document sub-queries
const NO_SELECT: i64 = -1;

const NO_MASK_ERROR: &str = "No mask returned from segmentation";

/// A single-backend request after image decoding
#[derive(Debug, Clone)]
pub struct PredictInput {
    pub text: String,
    pub frames: Vec<DynamicImage>,
    /// 1-based frame index; `<= 0` means no selection
    pub select: i64,
    /// Requested backend name, honoured when it names a known model
    pub model: Option<String>,
    pub gsd: Option<f64>,
}

/// Backend answer merged with derived geometry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    #[serde(skip)]
    pub model: ModelKind,
    pub prediction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obbs: Option<Vec<Obb>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_sq_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gsd_used: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Prediction {
    fn from_result(model: ModelKind, result: BackendResult) -> Self {
        Self {
            model,
            prediction: result.prediction,
            mask: result.mask,
            obbs: result.obbs,
            area_sq_meters: None,
            gsd_used: None,
            error: None,
        }
    }

    fn area_failure(error: impl Into<String>) -> Self {
        Self {
            model: ModelKind::RemoteSam,
            prediction: "0.0".to_string(),
            mask: None,
            obbs: None,
            area_sq_meters: None,
            gsd_used: None,
            error: Some(error.into()),
        }
    }
}

/// Stateless dispatcher over shared collaborator handles
#[derive(Clone)]
pub struct QueryRouter {
    backends: BackendContext,
}

impl QueryRouter {
    pub fn new(backends: BackendContext) -> Self {
        Self { backends }
    }

    pub fn backends(&self) -> &BackendContext {
        &self.backends
    }

    /// Names of the routable models
    pub fn model_names(&self) -> Vec<&'static str> {
        ModelKind::ALL.iter().map(|m| m.as_str()).collect()
    }

    /// Answer one prompt with one backend.
    ///
    /// Area questions without an override are measured on a segmentation mask.
    /// Otherwise the backend is the override (`forced` first, then
    /// `input.model`), the classifier's choice, or a coin flip.
    pub async fn route(
        &self,
        input: PredictInput,
        forced: Option<ModelKind>,
    ) -> Result<Prediction, RouterError> {
        validate_frames(&input.frames, input.select)?;

        let requested = input.model.as_deref().and_then(ModelKind::from_name);
        if input.model.is_some() && requested.is_none() {
            debug!("Ignoring unknown model override {:?}", input.model);
        }
        let override_model = forced.or(requested);

        if override_model.is_none() && mentions_area(&input.text) {
            info!("Router selected: remotesam (area query)");
            let gsd = input.gsd.unwrap_or(DEFAULT_GSD);
            return self
                .area_prediction(&input.text, &input.frames, input.select, gsd)
                .await;
        }

        let model = match override_model {
            Some(model) => model,
            None => self.choose_model(&input.text).await?,
        };
        info!("Router selected: {}", model);

        let (text, task_type) = match model {
            ModelKind::EarthMind => (input.text.clone(), self.task_type(&input.text).await?),
            ModelKind::RemoteSam => (self.refine(&input.text).await?, None),
        };
        let result = self
            .backends
            .backend(model)
            .predict(&text, &input.frames, input.select, task_type)
            .await
            .map_err(RouterError::backend)?;

        let mut prediction = Prediction::from_result(model, result);
        if let Some(mask) = prediction.mask.clone() {
            prediction.obbs = Some(extract_boxes(mask).await?);
        }
        Ok(prediction)
    }

    /// Fill every present sub-query of `doc` using `image`.
    ///
    /// Sub-queries run concurrently. A failed area measurement answers `0.0`;
    /// any other failure fails the whole document.
    pub async fn evaluate(
        &self,
        mut doc: QueryDocument,
        image: DynamicImage,
    ) -> Result<QueryDocument, RouterError> {
        let frames = vec![image];
        let frames = frames.as_slice();
        let gsd = doc.input_image.gsd().unwrap_or(DEFAULT_GSD);

        let queries = &doc.queries;
        let attrs = queries.attribute_query.as_ref();

        let caption = async {
            match &queries.caption_query {
                Some(q) => Some(self.ask_earthmind(&caption_prompt(&q.instruction), frames).await),
                None => None,
            }
        };
        let grounding = async {
            match &queries.grounding_query {
                Some(q) => Some(self.ground(&q.instruction, frames).await),
                None => None,
            }
        };
        let binary = async {
            match attrs.and_then(|a| a.binary.as_ref()) {
                Some(q) => Some(
                    self.ask_earthmind(&binary_prompt(&q.instruction), frames)
                        .await
                        .map(|answer| parse_binary(&answer).to_string()),
                ),
                None => None,
            }
        };
        let numeric = async {
            match attrs.and_then(|a| a.numeric.as_ref()) {
                Some(q) if q.is_area() => Some(Ok(self.measure_area(&q.instruction, frames, gsd).await)),
                Some(q) => Some(
                    self.ask_earthmind(&numeric_prompt(&q.instruction), frames)
                        .await
                        .map(|answer| parse_numeric(&answer)),
                ),
                None => None,
            }
        };
        let semantic = async {
            match attrs.and_then(|a| a.semantic.as_ref()) {
                Some(q) => Some(
                    self.ask_earthmind(&semantic_prompt(&q.instruction), frames)
                        .await
                        .map(|answer| parse_semantic(&answer)),
                ),
                None => None,
            }
        };

        let (caption, grounding, binary, numeric, semantic) =
            tokio::join!(caption, grounding, binary, numeric, semantic);

        let caption = caption.transpose()?;
        let grounding = grounding.transpose()?;
        let binary = binary.transpose()?;
        let numeric = numeric.transpose()?;
        let semantic = semantic.transpose()?;

        let queries = &mut doc.queries;
        if let (Some(answer), Some(q)) = (caption, queries.caption_query.as_mut()) {
            q.response = Some(answer);
        }
        if let (Some(boxes), Some(q)) = (grounding, queries.grounding_query.as_mut()) {
            q.response = Some(
                boxes
                    .into_iter()
                    .enumerate()
                    .map(|(idx, obbox)| GroundedObject {
                        object_id: (idx + 1).to_string(),
                        obbox,
                    })
                    .collect(),
            );
        }
        if let Some(attrs) = queries.attribute_query.as_mut() {
            if let (Some(answer), Some(q)) = (binary, attrs.binary.as_mut()) {
                q.response = Some(answer);
            }
            if let (Some(value), Some(q)) = (numeric, attrs.numeric.as_mut()) {
                q.response = Some(value);
            }
            if let (Some(answer), Some(q)) = (semantic, attrs.semantic.as_mut()) {
                q.response = Some(answer);
            }
        }

        Ok(doc)
    }

    async fn choose_model(&self, text: &str) -> Result<ModelKind, RouterError> {
        match &self.backends.classifier {
            Some(classifier) => {
                let task = classifier.classify(text).await.map_err(RouterError::backend)?;
                info!("Classifier predicted task: {}", task);
                Ok(ModelKind::for_task(task))
            }
            None => {
                let model = if rand::random::<bool>() {
                    ModelKind::EarthMind
                } else {
                    ModelKind::RemoteSam
                };
                debug!("No classifier configured; picked {} at random", model);
                Ok(model)
            }
        }
    }

    async fn task_type(&self, text: &str) -> Result<Option<TaskKind>, RouterError> {
        match &self.backends.classifier {
            Some(classifier) => {
                let task = classifier.classify(text).await.map_err(RouterError::backend)?;
                debug!("Task type for preprocessing: {}", task);
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    async fn refine(&self, text: &str) -> Result<String, RouterError> {
        match &self.backends.refiner {
            Some(refiner) => {
                let refined = refiner.refine_prompt(text).await.map_err(RouterError::backend)?;
                debug!("Refined prompt: {:?} -> {:?}", text, refined);
                Ok(refined)
            }
            None => Ok(text.to_string()),
        }
    }

    async fn ask_earthmind(&self, prompt: &str, frames: &[DynamicImage]) -> Result<String, RouterError> {
        self.backends
            .earthmind
            .predict(prompt, frames, NO_SELECT, None)
            .await
            .map(|r| r.prediction)
            .map_err(RouterError::backend)
    }

    async fn ground(&self, instruction: &str, frames: &[DynamicImage]) -> Result<Vec<Obb>, RouterError> {
        let refined = self.refine(instruction).await?;
        let result = self
            .backends
            .remotesam
            .predict(&refined, frames, NO_SELECT, None)
            .await
            .map_err(RouterError::backend)?;

        match result.mask {
            Some(mask) => extract_boxes(mask).await,
            None => Ok(result.obbs.unwrap_or_default()),
        }
    }

    /// Area in square meters; every failure is logged and measures `0.0`
    async fn measure_area(&self, instruction: &str, frames: &[DynamicImage], gsd: f64) -> f64 {
        let result = match self.refine(instruction).await {
            Ok(refined) => self
                .backends
                .remotesam
                .predict(&refined, frames, NO_SELECT, None)
                .await
                .map_err(RouterError::backend),
            Err(e) => Err(e),
        };

        let mask = match result {
            Ok(BackendResult {
                mask: Some(mask), ..
            }) if !mask.is_empty() => mask,
            Ok(_) => {
                warn!("Area query: {}", NO_MASK_ERROR);
                return 0.0;
            }
            Err(e) => {
                warn!("Area query failed: {}", e);
                return 0.0;
            }
        };

        match compute_area(mask, gsd).await {
            Ok(area) => area,
            Err(e) => {
                warn!("Error calculating area from mask: {}", e);
                0.0
            }
        }
    }

    async fn area_prediction(
        &self,
        text: &str,
        frames: &[DynamicImage],
        select: i64,
        gsd: f64,
    ) -> Result<Prediction, RouterError> {
        let refined = self.refine(text).await?;
        let result = self
            .backends
            .remotesam
            .predict(&refined, frames, select, None)
            .await
            .map_err(RouterError::backend)?;

        let mask = match result.mask {
            Some(mask) if !mask.is_empty() => mask,
            _ => return Ok(Prediction::area_failure(NO_MASK_ERROR)),
        };

        match compute_area(mask.clone(), gsd).await {
            Ok(area) => Ok(Prediction {
                model: ModelKind::RemoteSam,
                prediction: format!("{:?}", area),
                mask: Some(mask),
                obbs: None,
                area_sq_meters: Some(area),
                gsd_used: Some(gsd),
                error: None,
            }),
            Err(e) => {
                warn!("Error calculating area from mask: {}", e);
                Ok(Prediction::area_failure(e.to_string()))
            }
        }
    }
}

/// Decode and load the document's image reference
pub async fn resolve_document_image(
    client: &reqwest::Client,
    input: &InputImage,
) -> Result<DynamicImage, RouterError> {
    let reference = input
        .image_url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .ok_or(RouterError::MissingImageUrl)?;

    load_image_reference(client, reference)
        .await
        .map_err(|e| RouterError::ImageLoad(e.to_string()))
}

fn validate_frames(frames: &[DynamicImage], select: i64) -> Result<(), RouterError> {
    if frames.is_empty() {
        return Err(RouterError::NoImages);
    }
    if select > 0 && select as u64 > frames.len() as u64 {
        return Err(RouterError::SelectOutOfRange {
            select,
            frames: frames.len(),
        });
    }
    Ok(())
}

async fn extract_boxes(mask: String) -> Result<Vec<Obb>, RouterError> {
    tokio::task::spawn_blocking(move || decode_mask(&mask).map(|m| extract_from_gray(&m)))
        .await
        .map_err(|e| RouterError::Geometry(e.to_string()))?
        .map_err(|e| RouterError::Geometry(e.to_string()))
}

async fn compute_area(mask: String, gsd: f64) -> Result<f64, RouterError> {
    tokio::task::spawn_blocking(move || decode_mask(&mask).map(|m| area_from_gray(&m, gsd)))
        .await
        .map_err(|e| RouterError::Geometry(e.to_string()))?
        .map_err(|e| RouterError::Geometry(e.to_string()))
}
