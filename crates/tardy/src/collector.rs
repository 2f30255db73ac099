//! Bounded polling of step completions.
//!
//! The collector never waits on an individual step. It sleeps for a fixed
//! slice, sweeps every still-pending completion with a non-blocking read, and
//! repeats until either nothing is pending or the round budget is spent. The
//! caller is therefore answered within `max_rounds * round_delay` no matter how
//! slow the steps are.

use crate::{
    Error, Result,
    mask::PendingMask,
    step::{Completion, CompletionStatus},
    types::ProcessingResponse,
};
use core::time::Duration;

/// Default pause between polling rounds.
pub const DEFAULT_ROUND_DELAY: Duration = Duration::from_millis(10);

/// Default number of polling rounds before giving up.
pub const DEFAULT_MAX_ROUNDS: u32 = 10;

/// How long the collector is allowed to poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollBudget {
    max_rounds: u32,
    round_delay: Duration,
}

impl PollBudget {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero `round_delay` combined with
    /// a non-zero `max_rounds`, which would poll in a busy loop.
    pub fn new(max_rounds: u32, round_delay: Duration) -> Result<Self> {
        if max_rounds > 0 && round_delay.is_zero() {
            return Err(Error::InvalidConfig {
                reason: format!("round delay must be non-zero when polling {max_rounds} rounds"),
            });
        }
        Ok(Self {
            max_rounds,
            round_delay,
        })
    }

    pub const fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub const fn round_delay(&self) -> Duration {
        self.round_delay
    }

    /// Upper bound on time spent sleeping between rounds.
    pub fn total(&self) -> Duration {
        self.round_delay * self.max_rounds
    }
}

impl Default for PollBudget {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            round_delay: DEFAULT_ROUND_DELAY,
        }
    }
}

/// Polls `completions` within `budget`, appending each response to
/// `responses` as it is observed.
///
/// Bit `i` of the returned mask refers to `completions[i]` and is still set
/// if that step's response was not seen. Responses are appended in arrival
/// order, which need not match step order.
///
/// With no completions the mask is empty and the function returns without
/// sleeping. A completion observed closed without a value keeps its bit set.
pub async fn collect(
    completions: &mut [Completion],
    budget: PollBudget,
    responses: &mut Vec<ProcessingResponse>,
) -> PendingMask {
    let mut pending = PendingMask::all(completions.len());

    for _round in 0..budget.max_rounds {
        if pending.is_empty() {
            break;
        }

        tokio::time::sleep(budget.round_delay).await;

        for (slot, completion) in completions.iter_mut().enumerate() {
            if !pending.is_pending(slot) {
                continue;
            }
            match completion.try_take() {
                CompletionStatus::Ready(response) => {
                    responses.push(response);
                    pending.clear(slot);

                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "poll {_round}; step {}; pending: {:b}",
                        completion.index(),
                        pending
                    );
                }
                CompletionStatus::Pending => {}
                CompletionStatus::Closed => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "poll {_round}; step {} closed without a response",
                        completion.index()
                    );
                }
            }
        }
    }

    pending
}
