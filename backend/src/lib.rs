//! # Astro Planner
//!
//! Exposure planning and session diagnostics for deep-sky imaging.
//!
//! The crate turns a library of captured frames into per-filter exposure
//! plans, and turns acquisition logs (NINA sequence logs, PHD2 guide and
//! debug logs, stacking rejection logs) into session timelines, guiding
//! burst reports, dither settle statistics and rejection validation scores.
//!
//! ## Architecture
//!
//! - [`models`]: frames, filters, segments, guiding samples and typed log events
//! - [`parsing`]: line-oriented parsers for the supported log formats
//! - [`services`]: pure planning and analysis functions
//! - [`ingest`]: streaming frame ingestion into a caller-owned collection
//! - [`settings`]: persistence port for user preferences
//! - [`config`]: `planner.toml` and environment configuration
//! - [`http`]: Axum-based REST API (feature `http-server`)

#![allow(clippy::result_large_err)]

pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod parsing;
pub mod services;
pub mod settings;

#[cfg(feature = "http-server")]
pub mod http;

pub use config::AnalysisConfig;
pub use error::{ErrorContext, PlannerError, PlannerResult};
