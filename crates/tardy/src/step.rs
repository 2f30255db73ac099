//! Steps and their completion channels.
//!
//! A [`Step`] binds a task to the request it works on and owns the sending half
//! of a one-shot completion channel. The receiving half, a [`Completion`], goes
//! to the collector. The sender is consumed by the single send, so the channel
//! carries at most one response and is closed afterwards.

use crate::{
    task::Task,
    types::{ProcessingRequest, ProcessingResponse},
};
use core::panic::AssertUnwindSafe;
use futures::FutureExt;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::oneshot::{self, error::TryRecvError};

/// One schedulable unit of work.
pub struct Step<T> {
    index: usize,
    request: Arc<ProcessingRequest>,
    task: Arc<T>,
    completion: oneshot::Sender<ProcessingResponse>,
}

/// Non-blocking view of a step's completion channel.
#[derive(Debug, PartialEq, Eq)]
pub enum CompletionStatus {
    /// The step finished; this is its one and only response.
    Ready(ProcessingResponse),
    /// The step has not finished yet.
    Pending,
    /// The response was already taken, or the step was dropped without
    /// running.
    Closed,
}

/// Receiving half of a step's completion channel.
#[derive(Debug)]
pub struct Completion {
    index: usize,
    rx: oneshot::Receiver<ProcessingResponse>,
}

impl<T: Task> Step<T> {
    /// Creates step `index` of a request along with its completion handle.
    pub fn new(index: usize, request: Arc<ProcessingRequest>, task: Arc<T>) -> (Self, Completion) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                index,
                request,
                task,
                completion: tx,
            },
            Completion { index, rx },
        )
    }

    pub const fn index(&self) -> usize {
        self.index
    }

    /// Runs the task and delivers its response.
    ///
    /// A panic inside the task is caught and delivered as a failed response,
    /// so the calling worker loop keeps going. If the collector has already
    /// given up the response is dropped.
    #[allow(clippy::used_underscore_binding)]
    pub async fn execute(self, _worker_id: usize) {
        let Self {
            index: _index,
            request,
            task,
            completion,
        } = self;

        // `run` is called inside the guarded future so a panic raised before
        // the task hands back its future is caught as well.
        let guarded = AssertUnwindSafe(async { task.run(&request).await });
        let response = match guarded.catch_unwind().await {
            Ok(response) => response,
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                #[cfg(feature = "tracing")]
                tracing::error!("Worker {_worker_id} step {_index} panicked: {reason}");
                ProcessingResponse::failed(format!("task panicked: {reason}"))
            }
        };

        if completion.send(response).is_err() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {_worker_id} step {_index} finished after collection ended");
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl Completion {
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Checks the channel without waiting.
    pub fn try_take(&mut self) -> CompletionStatus {
        match self.rx.try_recv() {
            Ok(response) => CompletionStatus::Ready(response),
            Err(TryRecvError::Empty) => CompletionStatus::Pending,
            Err(TryRecvError::Closed) => CompletionStatus::Closed,
        }
    }
}
