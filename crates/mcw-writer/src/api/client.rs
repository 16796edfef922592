//! HTTP API client for Mailchimp
//!
//! Requests authenticate with HTTP basic auth using the API key. The data
//! center is the key's suffix after the last `-`.

use crate::api::{endpoints, BatchRequest, BatchStatus, MailchimpApi, Operation};
use crate::error::{Result, WriterError};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// API Client Constants
// ============================================================================

/// Default timeout for API requests in seconds.
/// Can be overridden via MCW_API_TIMEOUT_SECS environment variable.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 120;

/// User name sent with basic auth; Mailchimp ignores it
pub const API_USER: &str = "mcwriter";

/// Message for rejected or unverifiable credentials
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// API client for Mailchimp
pub struct MailchimpClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl MailchimpClient {
    /// Create a client for the data center encoded in the API key
    pub fn new(api_key: &str) -> Result<Self> {
        let base_url = endpoints::api_root(data_center(api_key)?);
        Self::with_base_url(api_key, base_url)
    }

    /// Create a client against an explicit API root
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let timeout_secs = std::env::var("MCW_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(API_USER, Some(&self.api_key))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value> {
        let response = builder.send().await?;
        read_json(response).await
    }
}

/// Extract the data center suffix from an API key
pub fn data_center(api_key: &str) -> Result<&str> {
    match api_key.trim().rsplit_once('-') {
        Some((key, dc))
            if !key.is_empty() && !dc.is_empty() && dc.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            Ok(dc)
        },
        _ => Err(WriterError::config(
            "API key must end with '-<data center>', for example 'abc123-us19'",
        )),
    }
}

async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(WriterError::transport(
            Some(status.as_u16()),
            error_detail(&text, status),
        ));
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Mailchimp errors are problem documents with `title` and `detail`
fn error_detail(body: &str, status: StatusCode) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    match (field("title"), field("detail")) {
        (Some(title), Some(detail)) => format!("{}: {}", title, detail),
        (Some(text), None) | (None, Some(text)) => text,
        (None, None) if !body.trim().is_empty() => body.trim().to_string(),
        (None, None) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    }
}

#[async_trait]
impl MailchimpApi for MailchimpClient {
    async fn verify_credentials(&self) -> Result<()> {
        let url = endpoints::root_url(&self.base_url);

        let response = match self.request(Method::GET, &url).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() || e.is_timeout() => {
                warn!(error = %e, "Could not reach Mailchimp API");
                return Err(WriterError::config(INVALID_CREDENTIALS));
            },
            Err(e) => return Err(e.into()),
        };

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(WriterError::config(INVALID_CREDENTIALS));
        }
        read_json(response).await?;
        debug!("Credentials verified");
        Ok(())
    }

    async fn execute(&self, operation: &Operation) -> Result<Value> {
        let url = endpoints::resource_url(&self.base_url, &operation.path);
        debug!(method = operation.method.as_str(), path = %operation.path, "Sending request");

        let mut builder = self.request(operation.method.into(), &url);
        if let Some(body) = &operation.body {
            builder = builder.json(body);
        }
        self.send(builder).await
    }

    async fn submit_batch(&self, operations: &[Operation]) -> Result<BatchStatus> {
        let url = endpoints::batches_url(&self.base_url);
        let request = BatchRequest { operations };

        let value = self
            .send(self.request(Method::POST, &url).json(&request))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn batch_status(&self, batch_id: &str) -> Result<BatchStatus> {
        let url = endpoints::batch_url(&self.base_url, batch_id);

        let value = self.send(self.request(Method::GET, &url)).await?;
        Ok(serde_json::from_value(value)?)
    }
}
