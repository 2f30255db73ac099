//! Request submission and collection.
//!
//! [`Engine`] is what a request handler talks to. [`Engine::submit`] splits a
//! request into steps and starts executing them; [`Engine::collect`] polls the
//! steps within the configured budget and settles the request state.
//! [`Engine::process`] does both.
//!
//! Steps run either on a worker loop started for the request (the default) or
//! on a shared [`WorkerPool`]. The collector does not care which.

use crate::{
    Error, Result,
    collector::collect,
    config::EngineConfig,
    mask::PendingMask,
    pool::WorkerPool,
    queue::DispatchQueue,
    simulator::TaskSimulator,
    step::{Completion, Step},
    task::Task,
    types::{ProcessingOrder, ProcessingRequest},
    worker::worker_loop,
};
use std::sync::Arc;
use uuid::Uuid;

/// Where submitted steps are executed.
pub enum Dispatch<T> {
    /// A fresh worker loop per request, fed by a queue sized to the step count.
    PerRequest,
    /// A pool shared by every request.
    Pool(Arc<WorkerPool<T>>),
}

/// A request whose steps have been dispatched but not yet collected.
#[derive(Debug)]
pub struct Submission {
    order: ProcessingOrder,
    completions: Vec<Completion>,
}

impl Submission {
    pub const fn request(&self) -> &ProcessingRequest {
        &self.order.request
    }

    pub fn step_count(&self) -> usize {
        self.completions.len()
    }
}

/// The collector's verdict for one request.
#[derive(Debug)]
pub struct Collected {
    pub order: ProcessingOrder,
    /// Steps whose responses were not observed in time.
    pub pending: PendingMask,
}

impl Collected {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

pub struct Engine<T = TaskSimulator> {
    config: EngineConfig,
    task: Arc<T>,
    dispatch: Dispatch<T>,
}

impl Engine<TaskSimulator> {
    /// Engine running the random-latency simulator over the configured
    /// latency set.
    pub fn new(config: EngineConfig) -> Self {
        let task = TaskSimulator::new(config.latencies.clone());
        Self::with_task(config, task)
    }
}

impl<T: Task> Engine<T> {
    pub fn with_task(config: EngineConfig, task: T) -> Self {
        Self {
            config,
            task: Arc::new(task),
            dispatch: Dispatch::PerRequest,
        }
    }

    /// Routes all future submissions through `pool`.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<WorkerPool<T>>) -> Self {
        self.dispatch = Dispatch::Pool(pool);
        self
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> Option<&Arc<WorkerPool<T>>> {
        match &self.dispatch {
            Dispatch::PerRequest => None,
            Dispatch::Pool(pool) => Some(pool),
        }
    }

    /// Builds the request's steps, enqueues all of them, then starts
    /// execution.
    ///
    /// The request is stamped with a fresh service request id. Execution
    /// carries on independently of any later [`collect`](Self::collect).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] if the shared pool is shutting down,
    /// [`Error::Saturated`] if no pooled worker has room for a step, or
    /// [`Error::ChannelError`] if a queue has closed. Submission never waits
    /// for queue space, so the caller is answered within the polling budget
    /// either way.
    pub async fn submit(&self, mut request: ProcessingRequest) -> Result<Submission> {
        request.service_request_id = Some(Uuid::new_v4());
        let step_count = self.config.step_count;
        let shared = Arc::new(request.clone());

        let mut steps = Vec::with_capacity(step_count);
        let mut completions = Vec::with_capacity(step_count);
        for index in 0..step_count {
            let (step, completion) = Step::new(index, Arc::clone(&shared), Arc::clone(&self.task));
            steps.push(step);
            completions.push(completion);
        }

        match &self.dispatch {
            Dispatch::PerRequest => {
                if step_count > 0 {
                    let (queue, rx) = DispatchQueue::bounded(step_count);
                    for step in steps {
                        queue.enqueue(step)?;
                    }
                    // The queue closes once `queue` drops, so the loop exits
                    // after the last step.
                    tokio::spawn(worker_loop(0, rx));
                }
            }
            Dispatch::Pool(pool) => {
                // Steps already handed over keep running if a later one is
                // refused; their responses are dropped with the completions.
                for step in steps {
                    pool.send_to_next_worker(step)?;
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Dispatched {step_count} steps for request {}",
            request.client_request_id
        );

        Ok(Submission {
            order: ProcessingOrder::new(request),
            completions,
        })
    }

    /// Runs the collector on its own task and settles the request state:
    /// complete when every step reported, in progress otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] if the collector task is lost.
    pub async fn collect(&self, submission: Submission) -> Result<Collected> {
        let budget = self.config.budget;
        let Submission {
            mut order,
            mut completions,
        } = submission;

        let verdict = tokio::spawn(async move {
            let pending = collect(&mut completions, budget, &mut order.responses).await;
            (order, pending)
        });

        let (mut order, pending) = verdict.await.map_err(|e| Error::ChannelError {
            context: format!("collector task failed: {e}"),
        })?;
        order.finish(&pending);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Collected {} responses; pending: {:b}; state: {}",
            order.responses.len(),
            pending,
            order.request.state
        );

        Ok(Collected { order, pending })
    }

    /// Submits `request` and collects it within the configured budget.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit) and [`collect`](Self::collect).
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip_all, fields(request_id = %request.client_request_id))
    )]
    pub async fn process(&self, request: ProcessingRequest) -> Result<Collected> {
        let submission = self.submit(request).await?;
        self.collect(submission).await
    }
}
