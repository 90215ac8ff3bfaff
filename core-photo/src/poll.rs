//! Bounded polling for eventually-consistent store state.

use bridge_traits::time::Timer;
use core_runtime::config::SyncSettings;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Budget of one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            timeout: settings.db_poll_timeout,
            interval: settings.db_poll_interval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut { waited: Duration },
    Cancelled,
}

/// Retries `attempt` until it yields a value, the budget runs out or the
/// run is cancelled.
///
/// Elapsed time is the sum of requested sleeps, so the loop terminates after
/// at most `timeout / interval + 1` attempts regardless of how the timer
/// behaves.
pub struct BoundedPoller {
    timer: Arc<dyn Timer>,
    policy: PollPolicy,
}

impl BoundedPoller {
    pub fn new(timer: Arc<dyn Timer>, policy: PollPolicy) -> Self {
        Self { timer, policy }
    }

    pub async fn poll<T, F, Fut>(&self, cancel: &CancellationToken, mut attempt: F) -> PollOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let mut waited = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                return PollOutcome::Cancelled;
            }

            if let Some(value) = attempt().await {
                return PollOutcome::Ready(value);
            }

            if waited >= self.policy.timeout {
                return PollOutcome::TimedOut { waited };
            }

            let step = self.policy.interval.min(self.policy.timeout - waited);
            tokio::select! {
                _ = cancel.cancelled() => return PollOutcome::Cancelled,
                _ = self.timer.sleep(step) => {}
            }
            waited += step;
        }
    }
}
