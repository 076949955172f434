// Copyright (c) 2024 FinstateSync. All rights reserved.
// Licensed under the Microsoft Reference Source License (MS-RSL).
// See LICENSE file for complete terms and conditions.

//! # finstate-sync Core
//!
//! Shared data model, error taxonomy, and configuration for the finstate-sync
//! system. This crate provides the foundation layer that every other crate
//! depends on.

pub mod config;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::*;
