//! Bounded retry wrapper for response sinks.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::warn;
use uuid::Uuid;

use crate::question::Response;

use super::{ResponseSink, SinkError, SinkReceipt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay_ms: 250,
        }
    }
}

impl RetryConfig {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            retry_base_delay_ms: 0,
        }
    }
}

/// Retries retryable failures with exponential backoff.
///
/// After a partial write only the unwritten tail is resent. The receipt's
/// `header_written` reflects the final attempt only.
pub struct RetryingSink<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: ResponseSink> RetryingSink<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ResponseSink> ResponseSink for RetryingSink<S> {
    async fn append(
        &self,
        session_id: Uuid,
        responses: &[Response],
    ) -> Result<SinkReceipt, SinkError> {
        let mut written = 0usize;
        let mut attempt = 0u32;
        loop {
            match self.inner.append(session_id, &responses[written..]).await {
                Ok(receipt) => {
                    return Ok(SinkReceipt {
                        rows_written: written + receipt.rows_written,
                        header_written: receipt.header_written,
                    });
                }
                Err(err) => {
                    written = (written + err.rows_written()).min(responses.len());
                    if !err.is_retryable() || attempt >= self.config.max_retries {
                        return Err(if written > 0 {
                            SinkError::partial(written, responses.len(), err)
                        } else {
                            err
                        });
                    }
                    let delay = backoff_delay(
                        Duration::from_millis(self.config.retry_base_delay_ms),
                        attempt,
                    );
                    warn!(
                        attempt,
                        written,
                        error = %err,
                        "response sink append failed; retrying"
                    );
                    attempt += 1;
                    sleep(delay).await;
                }
            }
        }
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u64.pow(attempt.min(5));
    base * multiplier as u32
}
