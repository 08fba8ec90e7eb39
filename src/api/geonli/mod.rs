// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Structured query evaluation endpoint (POST /geoNLI/eval)

pub mod handler;

pub use handler::eval_handler;
