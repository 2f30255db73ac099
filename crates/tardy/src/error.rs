//! Error types for the fan-out/collection engine.
//!
//! Timeouts are deliberately absent: a request whose steps do not all finish
//! inside the polling budget is a normal outcome, reported through the
//! [`PendingMask`](crate::PendingMask) and the request state, not an error.
//!
//! ## Error Cases
//! - `InvalidConfig`: the engine or pool was constructed with settings that
//!   would spin or could never produce a result.
//! - `ChannelError`: an internal queue or task handoff failed.
//! - `Saturated`: every queue that could take a step was full.
//! - `ServiceShutdown`: work arrived after the shared pool began shutting down.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the engine.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// Rejected configuration.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Internal channel send/receive failure (e.g., closed queue).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// No queue had room for a step. Dispatch never waits for space.
    #[error("All workers are busy")]
    Saturated,

    /// The shared worker pool is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}
