// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod backends;
pub mod cli;
pub mod config;
pub mod geometry;
pub mod router;
pub mod version;
pub mod vision;

// Re-export main types
pub use api::{create_app, AppState};
pub use backends::{BackendContext, BackendResult, InferenceBackend, ModelKind, TaskKind};
pub use config::{RouterConfig, TilingConfig};
pub use geometry::{mask_area, Obb};
pub use router::{PredictInput, Prediction, QueryDocument, QueryRouter, RouterError};
