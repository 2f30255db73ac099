//! Engine configuration.
//!
//! The defaults reproduce the reference sizing: three steps per request, ten
//! polling rounds of 10ms each (roughly a 100ms answer budget), and simulated
//! latencies of 5ms, 50ms and 500ms.

use crate::{
    Result,
    collector::{DEFAULT_MAX_ROUNDS, DEFAULT_ROUND_DELAY, PollBudget},
    simulator::LatencySet,
};
use core::time::Duration;

/// Default number of steps each request is split into.
pub const DEFAULT_STEP_COUNT: usize = 3;

/// Validated settings for an [`Engine`](crate::Engine).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub(crate) step_count: usize,
    pub(crate) budget: PollBudget,
    pub(crate) latencies: LatencySet,
}

impl EngineConfig {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if
    /// `round_delay` is zero while `max_rounds` is not, or if `latencies` is
    /// empty.
    pub fn new(
        step_count: usize,
        max_rounds: u32,
        round_delay: Duration,
        latencies: Vec<Duration>,
    ) -> Result<Self> {
        Ok(Self {
            step_count,
            budget: PollBudget::new(max_rounds, round_delay)?,
            latencies: LatencySet::new(latencies)?,
        })
    }

    pub const fn step_count(&self) -> usize {
        self.step_count
    }

    pub const fn budget(&self) -> PollBudget {
        self.budget
    }

    pub const fn latencies(&self) -> &LatencySet {
        &self.latencies
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_count: DEFAULT_STEP_COUNT,
            budget: PollBudget::default(),
            latencies: LatencySet::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, simulator::DEFAULT_LATENCIES};

    #[test]
    fn defaults_match_reference_sizing() {
        let config = EngineConfig::default();
        assert_eq!(config.step_count(), 3);
        assert_eq!(config.budget().max_rounds(), DEFAULT_MAX_ROUNDS);
        assert_eq!(config.budget().round_delay(), DEFAULT_ROUND_DELAY);
        assert_eq!(config.latencies().as_slice(), DEFAULT_LATENCIES.as_slice());
    }

    #[test]
    fn rejects_busy_spin_and_empty_latencies() {
        let ms = Duration::from_millis;
        assert!(matches!(
            EngineConfig::new(3, 10, Duration::ZERO, vec![ms(5)]),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(matches!(
            EngineConfig::new(3, 10, ms(10), Vec::new()),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(EngineConfig::new(0, 10, ms(10), vec![ms(5)]).is_ok());
    }
}
