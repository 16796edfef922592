//! MCW Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the Mailchimp writer workspace members:
//!
//! - **Logging**: `tracing` subscriber setup driven by configuration or environment
//! - **Checksums**: the subscriber hash the Mailchimp API uses to address members
//!
//! # Example
//!
//! ```no_run
//! use mcw_common::checksum::subscriber_hash;
//! use mcw_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!(hash = %subscriber_hash("robin@keboola.com"), "Member hash");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod logging;

pub use checksum::subscriber_hash;
