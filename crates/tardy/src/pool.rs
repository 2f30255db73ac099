//! Shared worker pool for step execution.
//!
//! Instead of starting one worker loop per request, a [`WorkerPool`] keeps a
//! fixed set of long-lived loops, each with its own bounded queue. Steps are
//! distributed round-robin, so the steps of one request run in parallel across
//! workers and are reported in first-to-finish order. Shutdown is coordinated
//! through a shared [`CancellationToken`].

use crate::{
    Error, Result,
    queue::{DispatchQueue, WorkRequest},
    step::Step,
    task::Task,
    worker::worker_loop,
};
use core::time::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::{
    sync::{mpsc::error::TrySendError, oneshot},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

/// Default number of queued steps per pooled worker.
pub const DEFAULT_WORK_QUEUE_SIZE: usize = 64;

/// Default wait for each worker to acknowledge shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// A cooperative pool of worker loops.
pub struct WorkerPool<T> {
    workers: Vec<DispatchQueue<T>>,
    next_worker: AtomicUsize,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl<T: Task> WorkerPool<T> {
    /// Spawns `num_workers` worker loops on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `num_workers` or `queue_size` is
    /// zero.
    pub fn spawn(
        num_workers: usize,
        queue_size: usize,
        shutdown_timeout: Duration,
    ) -> Result<Self> {
        if num_workers == 0 {
            return Err(Error::InvalidConfig {
                reason: "worker pool needs at least one worker".to_string(),
            });
        }
        if queue_size == 0 {
            return Err(Error::InvalidConfig {
                reason: "worker queue size must be greater than 0".to_string(),
            });
        }

        let mut workers = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let (queue, rx) = DispatchQueue::bounded(queue_size);
            workers.push(queue);
            tokio::spawn(worker_loop(worker_id, rx));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Spawned worker pool with {num_workers} workers");

        Ok(Self {
            workers,
            next_worker: AtomicUsize::new(0),
            shutdown_token: CancellationToken::new(),
            shutdown_timeout,
        })
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Returns the index of the next worker to receive work (round-robin).
    pub fn next_worker_index(&self) -> usize {
        self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len()
    }

    /// Hands a step to the next worker with room in its queue, never waiting.
    ///
    /// Workers are tried round-robin starting from the next index; a full
    /// queue passes the step on to the following worker.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The pool is shutting down (`shutdown_token` was cancelled).
    /// - Every worker's queue is full ([`Error::Saturated`]).
    /// - A worker's channel is closed.
    pub fn send_to_next_worker(&self, step: Step<T>) -> Result<()> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        let start = self.next_worker_index();
        let mut request = WorkRequest::Step(step);
        for offset in 0..self.workers.len() {
            let worker_idx = (start + offset) % self.workers.len();
            match self.workers[worker_idx].try_send(request) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(rejected)) => request = rejected,
                Err(TrySendError::Closed(_)) => {
                    return Err(Error::ChannelError {
                        context: format!("Worker {worker_idx} channel closed"),
                    });
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::warn!("All {} workers are busy", self.workers.len());
        Err(Error::Saturated)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Gracefully shuts down all workers in the pool.
    ///
    /// - Cancels the shared [`CancellationToken`] to refuse new work.
    /// - Sends a [`WorkRequest::Shutdown`] to each worker, queued behind any
    ///   steps already dispatched to it.
    /// - Waits up to `shutdown_timeout` per worker for acknowledgements.
    pub async fn shutdown(&self) {
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new steps");
        self.shutdown_token.cancel();

        #[cfg(feature = "tracing")]
        tracing::debug!("Notifying all workers to shut down");
        let mut shutdown_handles = Vec::with_capacity(self.workers.len());

        for (i, worker) in self.workers.iter().enumerate() {
            let (tx, rx) = oneshot::channel();
            if let Err(_e) = worker.send(WorkRequest::Shutdown { response: tx }).await {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to send shutdown to worker {i}: {_e}");
            } else {
                shutdown_handles.push((i, rx));
            }
        }

        let wait = self.shutdown_timeout;
        let timeout_futures = shutdown_handles.into_iter().map(|(_i, rx)| async move {
            match timeout(wait, rx).await {
                Ok(Ok(())) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Worker {_i} shutdown acknowledged");
                }
                Ok(Err(_e)) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {_i} dropped its acknowledgement: {_e}");
                }
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Worker {_i} shutdown timed out");
                }
            }
        });

        futures::future::join_all(timeout_futures).await;

        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collector::{PollBudget, collect},
        simulator::{LatencySet, ScriptedTask},
        step::CompletionStatus,
        types::ProcessingRequest,
    };
    use std::sync::Arc;
    use tokio::time::sleep;

    fn pool(num_workers: usize) -> WorkerPool<ScriptedTask> {
        pool_with_queue(num_workers, 4)
    }

    fn pool_with_queue(num_workers: usize, queue_size: usize) -> WorkerPool<ScriptedTask> {
        WorkerPool::spawn(num_workers, queue_size, DEFAULT_SHUTDOWN_TIMEOUT).unwrap()
    }

    #[tokio::test]
    async fn rejects_empty_pool() {
        assert!(matches!(
            WorkerPool::<ScriptedTask>::spawn(0, 4, DEFAULT_SHUTDOWN_TIMEOUT),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(matches!(
            WorkerPool::<ScriptedTask>::spawn(2, 0, DEFAULT_SHUTDOWN_TIMEOUT),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn round_robins_across_workers() {
        let pool = pool(3);
        let picks: Vec<_> = (0..6).map(|_| pool.next_worker_index()).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(pool.num_workers(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_workers_report_first_to_finish() {
        let pool = pool(3);
        let task = Arc::new(ScriptedTask::new(
            LatencySet::from_millis(&[45, 25, 5]).unwrap(),
        ));
        let request = Arc::new(ProcessingRequest::new("1001", "gifts"));

        let mut completions = Vec::new();
        for index in 0..3 {
            let (step, completion) = Step::new(index, Arc::clone(&request), Arc::clone(&task));
            pool.send_to_next_worker(step).unwrap();
            completions.push(completion);
        }

        let mut responses = Vec::new();
        let budget = PollBudget::new(10, Duration::from_millis(10)).unwrap();
        let pending = collect(&mut completions, budget, &mut responses).await;

        assert!(pending.is_empty());
        let contents: Vec<_> = responses.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["slept for 5ms", "slept for 25ms", "slept for 45ms"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn full_worker_passes_step_to_next() {
        let pool = pool_with_queue(2, 1);
        let task = Arc::new(ScriptedTask::new(LatencySet::from_millis(&[5]).unwrap()));
        let request = Arc::new(ProcessingRequest::new("1001", "gifts"));
        let mut steps =
            (0..3).map(|index| Step::new(index, Arc::clone(&request), Arc::clone(&task)));

        let (a, _a) = steps.next().unwrap();
        pool.send_to_next_worker(a).unwrap();
        // Skip worker 1 so the next round-robin pick lands on full worker 0.
        assert_eq!(pool.next_worker_index(), 1);

        let (b, mut b_done) = steps.next().unwrap();
        pool.send_to_next_worker(b).unwrap();

        let (c, _c) = steps.next().unwrap();
        assert_eq!(pool.send_to_next_worker(c), Err(Error::Saturated));

        // Worker 1 picked up the spilled step.
        sleep(Duration::from_millis(20)).await;
        assert!(matches!(b_done.try_take(), CompletionStatus::Ready(_)));
    }

    #[tokio::test]
    async fn refuses_work_after_shutdown() {
        let pool = pool(2);
        pool.shutdown().await;
        assert!(pool.is_shutdown());

        let task = Arc::new(ScriptedTask::new(LatencySet::from_millis(&[5]).unwrap()));
        let request = Arc::new(ProcessingRequest::new("1001", "gifts"));
        let (step, _completion) = Step::new(0, request, task);

        assert_eq!(pool.send_to_next_worker(step), Err(Error::ServiceShutdown));
    }
}
