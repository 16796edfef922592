//! Mailchimp Writer Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads lists, members and merge-field definitions from CSV tables into
//! Mailchimp.
//!
//! # Overview
//!
//! - **Rules**: per-kind field tables ([`rules::RuleBook`])
//! - **Cleaning**: validation and normalization of flat rows ([`clean::Cleaner`])
//! - **Serialization**: `a__b` columns to nested JSON ([`serialize::serialize`])
//! - **Input**: lazy chunked CSV reading ([`source::read_chunks`])
//! - **Submission**: serial or batch delivery with an in-flight ceiling
//!   ([`orchestrator::SubmissionOrchestrator`], [`poller::BatchPoller`])
//! - **Output**: batch and created-list reports ([`report`])

pub mod api;
pub mod clean;
pub mod error;
pub mod operations;
pub mod orchestrator;
pub mod poller;
pub mod record;
pub mod report;
pub mod rules;
pub mod serialize;
pub mod source;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use api::{MailchimpApi, MailchimpClient};
pub use clean::Cleaner;
pub use error::{Result, WriterError};
pub use operations::Action;
pub use orchestrator::{SubmissionMode, SubmissionOrchestrator, SubmissionReport, SubmissionSettings};
pub use poller::BatchPoller;
pub use record::Record;
pub use rules::{RecordKind, RuleBook};
pub use source::{read_chunks, AliasMap, ChunkedRecordSource};
