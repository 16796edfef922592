//! Batch completion polling

use crate::api::{BatchStatus, MailchimpApi};
use crate::error::{Result, WriterError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Default delay between status checks in seconds
pub const DEFAULT_POLL_DELAY_SECS: u64 = 5;

/// Polls a batch job at a fixed delay until it is finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPoller {
    delay: Duration,
    deadline: Option<Duration>,
}

impl Default for BatchPoller {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_POLL_DELAY_SECS))
    }
}

impl BatchPoller {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Give up with [`WriterError::PollTimeout`] once `deadline` has passed
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait for `batch_id` to reach `finished` and return its final status
    ///
    /// Errors from the status call propagate unchanged.
    pub async fn wait<A>(&self, api: &A, batch_id: &str) -> Result<BatchStatus>
    where
        A: MailchimpApi + ?Sized,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let status = api.batch_status(batch_id).await?;
            debug!(
                batch_id,
                attempt,
                status = %status.status,
                finished = status.finished_operations,
                total = status.total_operations,
                "Polled batch"
            );

            if status.status.is_finished() {
                info!(
                    batch_id,
                    total = status.total_operations,
                    errored = status.errored_operations,
                    "Batch finished"
                );
                return Ok(status);
            }

            let waited = started.elapsed();
            if let Some(deadline) = self.deadline {
                if waited >= deadline {
                    return Err(WriterError::PollTimeout {
                        batch_id: batch_id.to_string(),
                        waited,
                    });
                }
            }

            tokio::time::sleep(self.delay).await;
        }
    }
}
