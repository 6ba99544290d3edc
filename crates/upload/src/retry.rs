//! Failure → probe → resume cycle.

use std::future::Future;

use bytes::Bytes;
use resumable_protocol::RetryBudget;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BackoffConfig;
use crate::error::UploadError;
use crate::probe::ProbeStatus;
use crate::streamer::StreamFailure;

/// Where the controller stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Uploading,
    Probing,
    /// Terminal: the budget ran out.
    Exhausted,
}

/// How to continue after a recovered failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Stream again from this offset.
    Resume(u64),
    /// The service already holds every byte.
    Complete(Bytes),
}

/// Decides whether a failed attempt is resumed and where from.
#[derive(Debug)]
pub struct RetryController {
    backoff: BackoffConfig,
    cancel: CancellationToken,
    state: RetryState,
    attempts: u32,
}

impl RetryController {
    pub fn new(backoff: BackoffConfig, cancel: CancellationToken) -> Self {
        Self {
            backoff,
            cancel,
            state: RetryState::Uploading,
            attempts: 0,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Resume cycles started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Marks the start of a streaming attempt.
    pub fn begin_attempt(&mut self) {
        if self.state != RetryState::Exhausted {
            self.state = RetryState::Uploading;
        }
    }

    /// Reacts to a failed streaming attempt.
    ///
    /// Non-transient errors come back unchanged and leave `budget` alone.
    /// Otherwise each cycle takes one unit from `budget`, waits out the
    /// backoff delay and calls `probe` to learn the confirmed offset. A probe
    /// that fails transiently starts another cycle; any other probe error is
    /// returned as is. An empty budget ends in [`RetryState::Exhausted`].
    pub async fn recover<F, Fut>(
        &mut self,
        budget: &mut RetryBudget,
        failure: StreamFailure,
        mut probe: F,
    ) -> Result<Recovery, UploadError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ProbeStatus, UploadError>>,
    {
        let mut last_error = failure.error;

        loop {
            if !last_error.is_transient() {
                return Err(last_error);
            }
            if !budget.consume() {
                self.state = RetryState::Exhausted;
                warn!(attempts = self.attempts, error = %last_error, "retry budget exhausted");
                return Err(UploadError::RetryExhausted {
                    attempts: self.attempts,
                    last_error: last_error.to_string(),
                });
            }

            self.attempts += 1;
            self.state = RetryState::Probing;
            info!(
                attempt = self.attempts,
                budget = %budget,
                error = %last_error,
                "recovering failed upload"
            );

            let delay = self.backoff.delay_for_attempt(self.attempts);
            if !delay.is_zero() {
                debug!(delay_ms = delay.as_millis() as u64, "waiting before probe");
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match probe().await {
                Ok(ProbeStatus::Incomplete(offset)) => {
                    self.state = RetryState::Uploading;
                    debug!(offset, "resuming");
                    return Ok(Recovery::Resume(offset));
                }
                Ok(ProbeStatus::Complete(body)) => {
                    self.state = RetryState::Uploading;
                    debug!("service already holds the whole payload");
                    return Ok(Recovery::Complete(body));
                }
                Err(e) => {
                    warn!(attempt = self.attempts, error = %e, "recovery probe failed");
                    last_error = e;
                }
            }
        }
    }
}
