//! Dispatch queues feeding the worker loops.
//!
//! A dispatch queue is a bounded FIFO of [`WorkRequest`]s. For a single request
//! it is sized to the request's step count so every step can be enqueued
//! up front without waiting on the worker.

use crate::{Error, Result, step::Step};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot,
};

/// Messages understood by a worker loop.
pub enum WorkRequest<T> {
    /// Execute a step and deliver its response.
    Step(Step<T>),
    /// Stop after acknowledging on `response`.
    Shutdown { response: oneshot::Sender<()> },
}

/// Producer side of a dispatch queue.
pub struct DispatchQueue<T> {
    tx: mpsc::Sender<WorkRequest<T>>,
}

impl<T> Clone for DispatchQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// Consumer side of a dispatch queue, drained by exactly one worker loop.
pub type WorkReceiver<T> = mpsc::Receiver<WorkRequest<T>>;

impl<T> DispatchQueue<T> {
    /// Creates a queue holding up to `capacity` requests.
    ///
    /// A zero capacity is rounded up to one slot.
    pub fn bounded(capacity: usize) -> (Self, WorkReceiver<T>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueues a step without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Saturated`] if the queue is full, or
    /// [`Error::ChannelError`] if its worker has stopped.
    pub fn enqueue(&self, step: Step<T>) -> Result<()> {
        self.try_send(WorkRequest::Step(step)).map_err(|e| match e {
            TrySendError::Full(_) => Error::Saturated,
            TrySendError::Closed(_) => Error::ChannelError {
                context: "dispatch queue closed".to_string(),
            },
        })
    }

    /// Offers a work request without waiting, handing it back if the queue
    /// is full or closed.
    pub(crate) fn try_send(
        &self,
        request: WorkRequest<T>,
    ) -> core::result::Result<(), TrySendError<WorkRequest<T>>> {
        self.tx.try_send(request)
    }

    /// Sends any work request, waiting for room if the queue is full.
    ///
    /// Used for control messages such as [`WorkRequest::Shutdown`]; steps go
    /// through [`enqueue`](Self::enqueue).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] if the worker has stopped.
    pub async fn send(&self, request: WorkRequest<T>) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| Error::ChannelError {
                context: "dispatch queue closed".to_string(),
            })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
