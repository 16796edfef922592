//! API request and response types
//!
//! Matches the Mailchimp 3.0 batch operations resource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// HTTP method of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One request, either sent directly or as part of a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    pub method: HttpMethod,

    /// Resource path relative to the API root
    pub path: String,

    /// JSON body; batch descriptors carry it as an encoded string
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_body"
    )]
    pub body: Option<Value>,

    /// Natural key used to correlate batch results with input rows
    pub operation_id: String,

    /// Local alias the created resource's id is recorded under
    #[serde(skip)]
    pub alias: Option<String>,
}

fn serialize_body<S: Serializer>(
    body: &Option<Value>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match body {
        Some(value) => serializer.serialize_str(&value.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Request body of `POST /batches`
#[derive(Debug, Serialize)]
pub struct BatchRequest<'a> {
    pub operations: &'a [Operation],
}

/// Processing state of a batch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    Pending,
    Preprocessing,
    Started,
    Finalizing,
    Finished,
    #[serde(other)]
    Unknown,
}

impl BatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchState::Pending => "pending",
            BatchState::Preprocessing => "preprocessing",
            BatchState::Started => "started",
            BatchState::Finalizing => "finalizing",
            BatchState::Finished => "finished",
            BatchState::Unknown => "unknown",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, BatchState::Finished)
    }
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a batch job as reported by `GET /batches/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    pub id: String,
    pub status: BatchState,

    #[serde(default)]
    pub total_operations: u64,

    #[serde(default)]
    pub finished_operations: u64,

    #[serde(default)]
    pub errored_operations: u64,

    #[serde(default, deserialize_with = "optional_timestamp")]
    pub submitted_at: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "optional_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Archive with per-operation responses, empty until finished
    #[serde(default)]
    pub response_body_url: String,
}

/// Unfinished batches report timestamps as empty strings
fn optional_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}
