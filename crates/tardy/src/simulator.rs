//! Variable-latency task simulation.
//!
//! [`TaskSimulator`] models a backend call whose latency falls into a few
//! discrete classes (fast, medium, slow). Each invocation draws one class
//! uniformly from a [`LatencySet`] using the calling thread's generator, sleeps
//! for it, and answers with a fresh response.
//!
//! [`ScriptedTask`] plays back a fixed sequence of delays instead, which makes
//! runs reproducible.

use crate::{
    Error, Result,
    task::Task,
    types::{ProcessingRequest, ProcessingResponse},
};
use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;
use rand::Rng;

/// Default latency classes: 5ms, 50ms and 500ms.
pub const DEFAULT_LATENCIES: [Duration; 3] = [
    Duration::from_millis(5),
    Duration::from_millis(50),
    Duration::from_millis(500),
];

/// A non-empty set of simulated step latencies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LatencySet(Vec<Duration>);

impl LatencySet {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `latencies` is empty.
    pub fn new(latencies: Vec<Duration>) -> Result<Self> {
        if latencies.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "latency set must contain at least one delay".to_string(),
            });
        }
        Ok(Self(latencies))
    }

    /// Convenience constructor from whole milliseconds.
    pub fn from_millis(millis: &[u64]) -> Result<Self> {
        Self::new(millis.iter().copied().map(Duration::from_millis).collect())
    }

    pub fn as_slice(&self) -> &[Duration] {
        &self.0
    }

    /// Draws one delay uniformly at random.
    pub fn choose(&self) -> Duration {
        self.0[rand::rng().random_range(0..self.0.len())]
    }

    /// Delay at `index`, wrapping around the set.
    pub fn cycle(&self, index: usize) -> Duration {
        self.0[index % self.0.len()]
    }
}

impl Default for LatencySet {
    fn default() -> Self {
        Self(DEFAULT_LATENCIES.to_vec())
    }
}

/// Sleeps for `delay` and reports how long it slept.
async fn simulate(delay: Duration) -> ProcessingResponse {
    tokio::time::sleep(delay).await;
    ProcessingResponse::done(format!("slept for {}ms", delay.as_millis()))
}

/// Random-latency task. Cannot fail.
#[derive(Clone, Debug, Default)]
pub struct TaskSimulator {
    latencies: LatencySet,
}

impl TaskSimulator {
    pub const fn new(latencies: LatencySet) -> Self {
        Self { latencies }
    }

    pub const fn latencies(&self) -> &LatencySet {
        &self.latencies
    }
}

impl Task for TaskSimulator {
    async fn run(&self, _request: &ProcessingRequest) -> ProcessingResponse {
        simulate(self.latencies.choose()).await
    }
}

/// Deterministic task that takes its delays from a script, in order, wrapping
/// at the end.
///
/// The cursor is shared by every step that runs this task, so with a single
/// worker loop step `i` of the first request sleeps for `script[i]`.
#[derive(Debug)]
pub struct ScriptedTask {
    script: LatencySet,
    cursor: AtomicUsize,
}

impl ScriptedTask {
    pub const fn new(script: LatencySet) -> Self {
        Self {
            script,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Task for ScriptedTask {
    async fn run(&self, _request: &ProcessingRequest) -> ProcessingResponse {
        let delay = self.script.cycle(self.cursor.fetch_add(1, Ordering::Relaxed));
        simulate(delay).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseState;
    use tokio::time::Instant;

    #[test]
    fn empty_latency_set_is_rejected() {
        assert!(matches!(
            LatencySet::new(Vec::new()),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn choose_stays_within_set() {
        let set = LatencySet::from_millis(&[1, 2, 3]).unwrap();
        for _ in 0..100 {
            assert!(set.as_slice().contains(&set.choose()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn simulator_sleeps_one_of_the_configured_delays() {
        let task = TaskSimulator::new(LatencySet::from_millis(&[7]).unwrap());
        let request = ProcessingRequest::new("1001", "gifts");

        let start = Instant::now();
        let response = task.run(&request).await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(7) && elapsed < Duration::from_millis(8));
        assert_eq!(response.content, "slept for 7ms");
        assert_eq!(response.state, ResponseState::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn scripted_task_replays_in_order() {
        let task = ScriptedTask::new(LatencySet::from_millis(&[5, 50]).unwrap());
        let request = ProcessingRequest::new("1001", "gifts");

        let mut contents = Vec::new();
        for _ in 0..3 {
            contents.push(task.run(&request).await.content);
        }
        assert_eq!(
            contents,
            vec!["slept for 5ms", "slept for 50ms", "slept for 5ms"]
        );
    }
}
