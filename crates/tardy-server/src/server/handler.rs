//! HTTP front end for the engine.
//!
//! ## Routes
//!
//! - `GET /process`: processes the configured default request.
//! - `POST /process`: processes the request in the JSON body
//!   (`{"request_id": "...", "content": "..."}`).
//! - `GET /health`: liveness probe.
//!
//! Both `/process` routes answer with the pretty-printed
//! [`ProcessingOrder`](tardy::ProcessingOrder). Its request state is
//! `complete` when every step reported within the polling budget and
//! `in progress` otherwise; partial answers are not errors.

use crate::server::telemetry::{
    increment_request_errors, increment_requests, increment_requests_partial,
    record_pending_steps, record_request_duration,
};
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tardy::{Engine, ProcessingRequest};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    default_request: ProcessingRequest,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, default_request: ProcessingRequest) -> Self {
        Self {
            engine,
            default_request,
        }
    }
}

/// Body accepted by `POST /process`.
#[derive(Debug, Deserialize)]
pub struct ProcessBody {
    pub request_id: String,
    pub content: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/process", get(process_default).post(process_submitted))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn process_default(State(state): State<AppState>) -> Result<Response, ApiError> {
    let request = state.default_request.clone();
    process(&state, request).await
}

async fn process_submitted(
    State(state): State<AppState>,
    Json(body): Json<ProcessBody>,
) -> Result<Response, ApiError> {
    let request = ProcessingRequest::new(body.request_id, body.content);
    process(&state, request).await
}

async fn process(state: &AppState, request: ProcessingRequest) -> Result<Response, ApiError> {
    let start = Instant::now();
    increment_requests();

    let collected = state
        .engine
        .process(request)
        .await
        .inspect_err(|_| increment_request_errors())?;

    if !collected.is_complete() {
        increment_requests_partial();
    }
    record_pending_steps(collected.pending.count() as u64);

    let elapsed = start.elapsed();
    record_request_duration(elapsed.as_secs_f64() * 1_000.0);
    #[cfg(feature = "tracing")]
    tracing::info!(
        "elapsed: {:03}ms; state: {}",
        elapsed.as_millis(),
        collected.order.request.state
    );

    let body = serde_json::to_string_pretty(&collected.order)?;
    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        format!("{body}\n"),
    )
        .into_response())
}

/// Error surfaced to HTTP clients.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<tardy::Error> for ApiError {
    fn from(err: tardy::Error) -> Self {
        let status = match err {
            tardy::Error::ServiceShutdown | tardy::Error::Saturated => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            tardy::Error::InvalidConfig { .. } | tardy::Error::ChannelError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("failed to encode response: {err}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[cfg(feature = "tracing")]
        tracing::warn!("Request failed: {}", self.message);
        (self.status, self.message).into_response()
    }
}
