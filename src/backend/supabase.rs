//! Supabase REST data backend.
//!
//! Speaks PostgREST: each table is a resource under `/rest/v1/`,
//! selected, filtered, and limited through query parameters. Exact
//! counts come back in the `Content-Range` header when requested via
//! the `Prefer` header.

use async_trait::async_trait;
use std::time::Duration;

use crate::backend::traits::{DataBackend, Row, TableFilter};
use crate::config::Credentials;
use crate::error::{BackendError, Result};

/// Read-only client for one Supabase project's REST surface.
pub struct SupabaseBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SupabaseBackend {
    /// Create a backend for one URL/key pair.
    pub fn new(url: &str, key: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BackendError::Connection(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            api_key: key.to_string(),
        })
    }

    /// Create a backend from resolved request credentials.
    pub fn from_credentials(credentials: &Credentials, timeout_secs: u64) -> Result<Self> {
        Self::new(
            &credentials.supabase_url,
            &credentials.supabase_key,
            timeout_secs,
        )
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, table: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.table_url(table))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Connection("request timed out".to_string())
            } else if e.is_connect() {
                BackendError::Connection(e.to_string())
            } else {
                BackendError::Api(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!("HTTP {status}: {body}")).into());
        }

        Ok(response)
    }
}

#[async_trait]
impl DataBackend for SupabaseBackend {
    async fn probe(&self, table: &str) -> Result<()> {
        let request = self.request(table).query(&[("select", "*"), ("limit", "0")]);
        self.send(request).await?;
        Ok(())
    }

    async fn select_sample(&self, table: &str, n: usize) -> Result<Vec<Row>> {
        let limit = n.to_string();
        let request = self
            .request(table)
            .query(&[("select", "*"), ("limit", limit.as_str())]);
        let response = self.send(request).await?;
        parse_rows(response).await
    }

    async fn count_exact(&self, table: &str, filter: Option<&TableFilter>) -> Result<u64> {
        let mut request = self
            .request(table)
            .header("Prefer", "count=exact")
            .query(&[("select", "*"), ("limit", "0")]);
        if let Some(filter) = filter {
            let (column, value) = filter_param(filter);
            request = request.query(&[(column.as_str(), value.as_str())]);
        }

        let response = self.send(request).await?;
        let content_range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                BackendError::InvalidResponse("missing Content-Range header".to_string())
            })?;

        let count = parse_content_range(content_range).ok_or_else(|| {
            BackendError::InvalidResponse(format!("unparsable Content-Range: {content_range}"))
        })?;
        Ok(count)
    }

    async fn select_filtered(
        &self,
        table: &str,
        columns: Option<&[String]>,
        filter: Option<&TableFilter>,
        limit: usize,
    ) -> Result<Vec<Row>> {
        let select = match columns {
            Some(cols) if !cols.is_empty() => cols.join(","),
            _ => "*".to_string(),
        };
        let limit = limit.to_string();
        let mut request = self
            .request(table)
            .query(&[("select", select.as_str()), ("limit", limit.as_str())]);
        if let Some(filter) = filter {
            let (column, value) = filter_param(filter);
            request = request.query(&[(column.as_str(), value.as_str())]);
        }

        let response = self.send(request).await?;
        parse_rows(response).await
    }
}

async fn parse_rows(response: reqwest::Response) -> Result<Vec<Row>> {
    response
        .json::<Vec<Row>>()
        .await
        .map_err(|e| BackendError::InvalidResponse(e.to_string()).into())
}

/// PostgREST encodes an equality filter as `column=eq.value`.
fn filter_param(filter: &TableFilter) -> (String, String) {
    (
        filter.column.clone(),
        format!("eq.{}", literal_text(&filter.value)),
    )
}

fn literal_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Total row count from a `Content-Range` value like `0-0/42` or `*/42`.
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}
