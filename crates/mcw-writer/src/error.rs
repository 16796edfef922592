//! Error types for the Mailchimp writer
//!
//! Every failure the writer can produce is one variant of [`WriterError`].
//! Input problems an operator can fix (bad CSV values, missing columns,
//! credentials) form the "user error" family and exit with code 1; anything
//! else exits with code 2.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for writer operations
pub type Result<T> = std::result::Result<T, WriterError>;

/// Comprehensive error type for the writer
#[derive(Error, Debug)]
pub enum WriterError {
    /// A mandatory field is absent from a record
    #[error("Every record must have the '{field}' field. This one doesn't: {record}")]
    MissingField { field: String, record: String },

    /// A field is present but fails its type, enum, or pattern constraint
    #[error("Invalid value in field '{field}': {reason}. Record: {record}")]
    InvalidValue {
        field: String,
        reason: String,
        record: String,
    },

    /// Mutually exclusive fields are present together
    #[error("Fields {fields:?} can't be used together in one record. Record: {record}")]
    ConflictingFields { fields: Vec<String>, record: String },

    /// A row references a local list alias that no created list defines
    #[error("Unknown list alias '{alias}' in column '{column}'. Define it as 'custom_id' in new_lists.csv first.")]
    UnknownAlias { alias: String, column: String },

    /// Credentials or runtime parameters are missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// The Mailchimp API reported an HTTP-level failure
    #[error("Mailchimp API request failed{}: {message}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// A batch job didn't reach `finished` before the poll deadline
    #[error("Batch '{batch_id}' didn't finish within {waited:?}")]
    PollTimeout { batch_id: String, waited: Duration },

    /// Input table is not valid CSV
    #[error("Failed to read CSV input: {0}")]
    Csv(#[from] csv::Error),

    /// File system operation failed
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("Failed to process JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl WriterError {
    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>, record: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            record: record.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        reason: impl Into<String>,
        record: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
            record: record.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transport error
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// True for errors the operator can fix by changing input or configuration
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. }
                | Self::InvalidValue { .. }
                | Self::ConflictingFields { .. }
                | Self::UnknownAlias { .. }
                | Self::Config(_)
                | Self::Csv(_)
        )
    }

    /// Process exit code: 1 for user errors, 2 for everything else
    pub fn exit_code(&self) -> i32 {
        if self.is_user_error() {
            1
        } else {
            2
        }
    }
}

impl From<reqwest::Error> for WriterError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
