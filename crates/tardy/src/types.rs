//! Request, response and order records passed between the handler, the worker
//! loop and the collector.
//!
//! A [`ProcessingRequest`] describes the work, each executed step produces one
//! [`ProcessingResponse`], and a [`ProcessingOrder`] ties the request to the
//! responses observed before the polling budget ran out.

use crate::mask::PendingMask;
use core::fmt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a request as seen by its caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestState {
    #[default]
    #[serde(rename = "submitted")]
    Submitted,
    /// At least one step was still outstanding when collection stopped.
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "complete")]
    Complete,
}

impl RequestState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::InProgress => "in progress",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseState {
    Done,
    /// The task reported a failure, or panicked and was caught by the worker
    /// loop. The response content carries the reason.
    Failed,
}

impl fmt::Display for ResponseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// What the caller asked for.
///
/// `client_request_id` and `content` are opaque to the engine. The
/// `service_request_id` is stamped by the engine on submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingRequest {
    pub client_request_id: String,
    pub service_request_id: Option<Uuid>,
    pub content: String,
    pub state: RequestState,
}

impl ProcessingRequest {
    /// Creates a request in the [`RequestState::Submitted`] state.
    pub fn new(client_request_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            client_request_id: client_request_id.into(),
            service_request_id: None,
            content: content.into(),
            state: RequestState::Submitted,
        }
    }
}

/// The result of one executed step.
///
/// `id` is generated fresh for every response and is unrelated to the request
/// identifiers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResponse {
    pub id: Uuid,
    pub content: String,
    pub state: ResponseState,
}

impl ProcessingResponse {
    pub fn done(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            state: ResponseState::Done,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: reason.into(),
            state: ResponseState::Failed,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == ResponseState::Done
    }
}

/// A request together with the responses collected for it, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingOrder {
    pub request: ProcessingRequest,
    pub responses: Vec<ProcessingResponse>,
}

impl ProcessingOrder {
    pub fn new(request: ProcessingRequest) -> Self {
        Self {
            request,
            responses: Vec::new(),
        }
    }

    /// Records the terminal request state for the given collector verdict.
    pub fn finish(&mut self, pending: &PendingMask) {
        self.request.state = if pending.is_empty() {
            RequestState::Complete
        } else {
            RequestState::InProgress
        };
    }

    pub fn is_complete(&self) -> bool {
        self.request.state == RequestState::Complete
    }
}
