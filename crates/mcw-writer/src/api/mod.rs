//! Mailchimp API access
//!
//! The orchestrator and poller only talk to the [`MailchimpApi`] trait;
//! [`MailchimpClient`] is the reqwest implementation.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::MailchimpClient;
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Primitive capabilities the writer needs from the remote service
#[async_trait]
pub trait MailchimpApi: Send + Sync {
    /// Check that the credentials are accepted
    ///
    /// Rejected credentials are reported as a configuration error.
    async fn verify_credentials(&self) -> Result<()>;

    /// Send one operation synchronously and return the response body
    async fn execute(&self, operation: &Operation) -> Result<Value>;

    /// Submit operations as one asynchronous batch job
    async fn submit_batch(&self, operations: &[Operation]) -> Result<BatchStatus>;

    /// Fetch the current status of a batch job
    async fn batch_status(&self, batch_id: &str) -> Result<BatchStatus>;
}
