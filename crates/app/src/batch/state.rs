//! Per-batch retry state machine.

use code_ingest_shared::{ErrorCode, ErrorEnvelope, Result};
use std::fmt;

/// Lifecycle of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Not dispatched yet.
    Pending,
    /// An attempt is running on a worker (1-indexed).
    InFlight {
        /// Attempt number.
        attempt: u32,
    },
    /// The last attempt failed; the next one is queued.
    RetryScheduled {
        /// Attempt number of the queued retry.
        next_attempt: u32,
    },
    /// Terminal: every eligible chunk was stored.
    Stored {
        /// Chunks stored.
        count: usize,
    },
    /// Terminal: attempts exhausted.
    PermanentlyFailed {
        /// Attempts made.
        attempts: u32,
    },
}

/// Inputs that move a batch between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEvent {
    /// The dispatcher handed the batch to a worker.
    Dispatched,
    /// The running attempt stored `count` chunks.
    Succeeded {
        /// Chunks stored.
        count: usize,
    },
    /// The running attempt failed.
    Failed,
}

impl BatchState {
    /// Apply `event`, allowing at most `max_attempts` attempts.
    ///
    /// Any pair not in the transition table is an invariant error.
    pub fn transition(self, event: BatchEvent, max_attempts: u32) -> Result<Self> {
        match (self, event) {
            (Self::Pending, BatchEvent::Dispatched) => Ok(Self::InFlight { attempt: 1 }),
            (Self::RetryScheduled { next_attempt }, BatchEvent::Dispatched) => {
                Ok(Self::InFlight {
                    attempt: next_attempt,
                })
            },
            (Self::InFlight { .. }, BatchEvent::Succeeded { count }) => Ok(Self::Stored { count }),
            (Self::InFlight { attempt }, BatchEvent::Failed) => {
                if attempt < max_attempts {
                    Ok(Self::RetryScheduled {
                        next_attempt: attempt.saturating_add(1),
                    })
                } else {
                    Ok(Self::PermanentlyFailed { attempts: attempt })
                }
            },
            (state, event) => Err(ErrorEnvelope::invariant(
                ErrorCode::new("pipeline", "illegal_transition"),
                format!("batch cannot go from {state} on {event:?}"),
            )
            .with_metadata("state", state.to_string())),
        }
    }

    /// Returns true for `Stored` and `PermanentlyFailed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stored { .. } | Self::PermanentlyFailed { .. })
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => formatter.write_str("pending"),
            Self::InFlight { attempt } => write!(formatter, "in_flight({attempt})"),
            Self::RetryScheduled { next_attempt } => {
                write!(formatter, "retry_scheduled({next_attempt})")
            },
            Self::Stored { count } => write!(formatter, "stored({count})"),
            Self::PermanentlyFailed { attempts } => {
                write!(formatter, "permanently_failed({attempts})")
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_below_the_limit_schedules_a_retry() -> Result<()> {
        let state = BatchState::Pending
            .transition(BatchEvent::Dispatched, 3)?
            .transition(BatchEvent::Failed, 3)?;
        assert_eq!(state, BatchState::RetryScheduled { next_attempt: 2 });

        let state = state
            .transition(BatchEvent::Dispatched, 3)?
            .transition(BatchEvent::Succeeded { count: 7 }, 3)?;
        assert_eq!(state, BatchState::Stored { count: 7 });
        assert!(state.is_terminal());
        Ok(())
    }

    #[test]
    fn last_failure_is_permanent() -> Result<()> {
        let mut state = BatchState::Pending;
        for _ in 0..3 {
            state = state.transition(BatchEvent::Dispatched, 3)?;
            state = state.transition(BatchEvent::Failed, 3)?;
        }
        assert_eq!(state, BatchState::PermanentlyFailed { attempts: 3 });
        Ok(())
    }

    #[test]
    fn single_attempt_fails_permanently_at_once() -> Result<()> {
        let state = BatchState::Pending
            .transition(BatchEvent::Dispatched, 1)?
            .transition(BatchEvent::Failed, 1)?;
        assert_eq!(state, BatchState::PermanentlyFailed { attempts: 1 });
        Ok(())
    }

    #[test]
    fn terminal_and_idle_states_reject_results() {
        let illegal = [
            (BatchState::Stored { count: 1 }, BatchEvent::Dispatched),
            (BatchState::Stored { count: 1 }, BatchEvent::Failed),
            (BatchState::PermanentlyFailed { attempts: 3 }, BatchEvent::Dispatched),
            (BatchState::Pending, BatchEvent::Succeeded { count: 1 }),
            (BatchState::InFlight { attempt: 1 }, BatchEvent::Dispatched),
            (BatchState::RetryScheduled { next_attempt: 2 }, BatchEvent::Failed),
        ];
        for (state, event) in illegal {
            let result = state.transition(event, 3);
            assert!(
                result.is_err_and(|error| error.code.to_string() == "pipeline:illegal_transition"),
                "{state} on {event:?} should be rejected"
            );
        }
    }
}
