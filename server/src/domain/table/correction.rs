//! Query correction service client
//!
//! An external service that rewrites free text into a query this server can
//! parse. The wire contract is a single JSON POST:
//!
//! ```text
//! -> {"query": "orders over 100 from last week", "columns": [{"name": "amount", "type": "number"}, ...]}
//! <- {"query": "amount > 100 and created >= 2024-05-01"}
//! <- {"error": "cannot understand query"}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::columns::{Column, ColumnType};
use super::error::ServiceError;

#[async_trait]
pub trait CorrectionService: Send + Sync + std::fmt::Debug {
    /// Rewrite `query` into valid query text for these columns
    async fn correct(&self, query: &str, columns: &[Column]) -> Result<String, ServiceError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

#[derive(Debug, Serialize)]
struct CorrectionRequest<'a> {
    query: &'a str,
    columns: Vec<ColumnHint<'a>>,
}

#[derive(Debug, Serialize)]
struct ColumnHint<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    column_type: ColumnType,
}

#[derive(Debug, Default, Deserialize)]
struct CorrectionResponse {
    query: Option<String>,
    error: Option<String>,
}

/// Correction service reached over HTTP
#[derive(Debug)]
pub struct HttpCorrectionService {
    client: reqwest::Client,
    url: String,
}

impl HttpCorrectionService {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("Ivy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        tracing::debug!(url = %url, timeout_secs = timeout.as_secs(), "Query correction client initialized");
        Ok(Self { client, url })
    }
}

#[async_trait]
impl CorrectionService for HttpCorrectionService {
    async fn correct(&self, query: &str, columns: &[Column]) -> Result<String, ServiceError> {
        let request = CorrectionRequest {
            query,
            columns: columns
                .iter()
                .filter(|c| c.filterable)
                .map(|c| ColumnHint {
                    name: &c.name,
                    column_type: c.column_type,
                })
                .collect(),
        };

        let resp = self.client.post(&self.url).json(&request).send().await?;
        let status = resp.status();
        let body: CorrectionResponse = if status.is_success() {
            resp.json().await?
        } else {
            // Error bodies are optional; fall back to the status reason
            let text = resp.text().await.unwrap_or_default();
            let parsed: CorrectionResponse = serde_json::from_str(&text).unwrap_or_default();
            return Err(ServiceError::Http {
                status: status.as_u16(),
                message: parsed.error.unwrap_or_else(|| {
                    status.canonical_reason().unwrap_or("Unknown").to_string()
                }),
            });
        };

        match body {
            CorrectionResponse {
                query: Some(corrected),
                ..
            } if !corrected.trim().is_empty() => Ok(corrected),
            CorrectionResponse {
                error: Some(message),
                ..
            } => Err(ServiceError::Rejected(message)),
            _ => Err(ServiceError::Empty),
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
