//! HTTP service wiring for the engine.
//!
//! ## Structure
//!
//! - [`config`] - CLI/env configuration (`CliArgs` -> `ServerConfig`).
//! - [`handler`] - axum routes and error mapping.
//! - [`telemetry`] - logging, tracing and metrics setup.

pub mod config;
pub mod handler;
pub mod telemetry;
