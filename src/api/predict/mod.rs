// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-backend prediction endpoints
//!
//! Provides POST /predict, /earthmind and /remotesam. The response is the
//! backend result, plus `obbs` when a mask is returned, or the area fields
//! for area questions.

pub mod handler;
pub mod request;

pub use crate::router::Prediction as PredictResponse;
pub use handler::{earthmind_handler, predict_handler, remotesam_handler};
pub use request::PredictRequest;
