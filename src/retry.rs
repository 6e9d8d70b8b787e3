//! # Retry Policy
//!
//! Bounded retries around one blocking attempt. Only link failures
//! ([`EstafetaError::is_retryable`]) are retried; the backoff sleeps in
//! cancellable slices.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::EstafetaError;
use crate::printer::BridgeSettings;
use crate::transport::writer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &BridgeSettings) -> Self {
        Self {
            attempts: settings.retry_attempts.max(1),
            backoff: settings.retry_backoff(),
        }
    }

    /// A single attempt, no retry.
    pub fn once() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. The last error is returned.
    pub fn run<T, F>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, EstafetaError>
    where
        F: FnMut(u32) -> Result<T, EstafetaError>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(EstafetaError::Cancelled);
            }
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(
                        attempt,
                        attempts,
                        "Attempt failed, retrying in {:?}: {}",
                        self.backoff,
                        e
                    );
                    writer::pause(self.backoff, cancel)?;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
