use crate::types::{ProcessingRequest, ProcessingResponse};

/// The unit of work a step executes.
///
/// A task turns the request it is bound to into exactly one
/// [`ProcessingResponse`]. Failure is reported in-band with
/// [`ProcessingResponse::failed`]; the completion channel has no separate error
/// variant. A task that panics is caught by the worker loop and reported the
/// same way.
///
/// The returned future must be `Send` so the worker loop can run on any tokio
/// worker thread.
pub trait Task: Send + Sync + 'static {
    fn run(&self, request: &ProcessingRequest) -> impl Future<Output = ProcessingResponse> + Send;
}
