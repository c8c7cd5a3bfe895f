use std::{future::Future, time::Duration};

use backon::{ExponentialBuilder, Retryable};

use crate::store::StoreError;

/// Timeout and retry budget applied to every store call.
#[derive(Debug, Clone, Copy)]
pub struct StorePolicy {
    pub call_timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl StorePolicy {
    /// Runs a call exactly once under the timeout. Used for writes that must
    /// not be repeated blindly.
    pub async fn once<T, Fut>(&self, op: &'static str, fut: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout_ms = %self.call_timeout.as_millis(), "store call timed out");
                Err(StoreError::Timeout(self.call_timeout))
            }
        }
    }

    /// Exponential backoff starting at `backoff`, allowing `max_attempts`
    /// calls in total.
    pub fn retry_backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.backoff)
            .with_max_delay(self.backoff * 20)
            .with_max_times(self.max_attempts.max(1) as usize - 1)
            .with_jitter()
    }

    /// Runs an idempotent call, retrying transient failures. Each attempt gets
    /// its own timeout.
    pub async fn idempotent<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        (|| self.once(op, call()))
            .retry(self.retry_backoff())
            .when(StoreError::is_transient)
            .notify(|err: &StoreError, dur: Duration| {
                tracing::warn!(op, error = %err, delay = ?dur, "retrying store call");
            })
            .await
    }
}
