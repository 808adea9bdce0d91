//! Operation lifecycle status and the client-side countdown

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::clock::Clock;

/// Lifecycle state of a timelock operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Ready,
    Executed,
    Cancelled,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Executed | OperationStatus::Cancelled)
    }
}

/// The timestamps status is derived from (unix seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationTimes {
    pub executed_at: Option<u64>,
    pub cancelled_at: Option<u64>,
    /// Time at which the operation becomes executable
    pub timestamp: u64,
}

/// Derive status from timestamps
///
/// Strict priority: executed, cancelled, ready (inclusive), pending.
pub fn derive_status(op: &OperationTimes, now: u64) -> OperationStatus {
    if op.executed_at.is_some() {
        OperationStatus::Executed
    } else if op.cancelled_at.is_some() {
        OperationStatus::Cancelled
    } else if now >= op.timestamp {
        OperationStatus::Ready
    } else {
        OperationStatus::Pending
    }
}

/// Seconds left while pending, `None` otherwise
pub fn seconds_until_ready(op: &OperationTimes, now: u64) -> Option<u64> {
    match derive_status(op, now) {
        OperationStatus::Pending => Some(op.timestamp.saturating_sub(now)),
        _ => None,
    }
}

/// What the UI should show right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownState {
    pub status: OperationStatus,
    pub seconds_until_ready: Option<u64>,
}

/// Local countdown layered over the authoritative status
///
/// Once the countdown hits zero the displayed status flips to ready even if
/// the last refresh still said pending; `reconcile` replaces both on the
/// next data refresh.
#[derive(Debug, Clone)]
pub struct Countdown {
    times: OperationTimes,
    authoritative: OperationStatus,
}

impl Countdown {
    pub fn new(times: OperationTimes, authoritative: OperationStatus) -> Self {
        Self {
            times,
            authoritative,
        }
    }

    /// Start from the status derived at `now`
    pub fn from_times(times: OperationTimes, now: u64) -> Self {
        Self::new(times, derive_status(&times, now))
    }

    pub fn tick(&self, now: u64) -> CountdownState {
        if self.authoritative.is_terminal() {
            return CountdownState {
                status: self.authoritative,
                seconds_until_ready: None,
            };
        }
        match derive_status(&self.times, now) {
            OperationStatus::Pending if self.authoritative == OperationStatus::Pending => {
                CountdownState {
                    status: OperationStatus::Pending,
                    seconds_until_ready: seconds_until_ready(&self.times, now),
                }
            }
            OperationStatus::Pending => CountdownState {
                status: self.authoritative,
                seconds_until_ready: None,
            },
            status => CountdownState {
                status,
                seconds_until_ready: None,
            },
        }
    }

    /// Replace local state with a fresh authoritative view
    pub fn reconcile(&mut self, times: OperationTimes, authoritative: OperationStatus) {
        self.times = times;
        self.authoritative = authoritative;
    }

    /// Drive the countdown once per second until it stops pending
    ///
    /// The task ends when every receiver is dropped or the state leaves
    /// pending.
    pub fn watch(self, clock: Arc<dyn Clock>) -> watch::Receiver<CountdownState> {
        let initial = self.tick(clock.now_secs());
        let (tx, rx) = watch::channel(initial);
        if initial.status != OperationStatus::Pending {
            return rx;
        }

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                let state = self.tick(clock.now_secs());
                if tx.send(state).is_err() {
                    break;
                }
                if state.status != OperationStatus::Pending {
                    tracing::debug!(status = ?state.status, "countdown finished");
                    break;
                }
            }
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(executed: Option<u64>, cancelled: Option<u64>, ready: u64) -> OperationTimes {
        OperationTimes {
            executed_at: executed,
            cancelled_at: cancelled,
            timestamp: ready,
        }
    }

    #[test]
    fn test_executed_beats_cancelled() {
        let op = times(Some(10), Some(5), 100);
        assert_eq!(derive_status(&op, 0), OperationStatus::Executed);
    }

    #[test]
    fn test_cancelled_beats_ready() {
        let op = times(None, Some(5), 100);
        assert_eq!(derive_status(&op, 500), OperationStatus::Cancelled);
    }

    #[test]
    fn test_ready_boundary_is_inclusive() {
        let op = times(None, None, 1_000);
        assert_eq!(derive_status(&op, 1_000), OperationStatus::Ready);
        assert_eq!(derive_status(&op, 999), OperationStatus::Pending);
    }

    #[test]
    fn test_seconds_until_ready_only_while_pending() {
        let op = times(None, None, 1_000);
        assert_eq!(seconds_until_ready(&op, 940), Some(60));
        assert_eq!(seconds_until_ready(&op, 1_000), None);
        assert_eq!(seconds_until_ready(&times(Some(1), None, 1_000), 0), None);
    }

    #[test]
    fn test_countdown_flips_before_refresh() {
        let op = times(None, None, 1_000);
        let countdown = Countdown::new(op, OperationStatus::Pending);

        let before = countdown.tick(999);
        assert_eq!(before.status, OperationStatus::Pending);
        assert_eq!(before.seconds_until_ready, Some(1));

        let after = countdown.tick(1_000);
        assert_eq!(after.status, OperationStatus::Ready);
        assert_eq!(after.seconds_until_ready, None);
    }

    #[test]
    fn test_countdown_reconcile_terminal_wins() {
        let op = times(None, None, 1_000);
        let mut countdown = Countdown::from_times(op, 0);
        countdown.reconcile(times(None, Some(900), 1_000), OperationStatus::Cancelled);
        assert_eq!(countdown.tick(2_000).status, OperationStatus::Cancelled);
    }
}
