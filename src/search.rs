//! Client for the external semantic search service.
//!
//! Two operations, one round trip each, no retries:
//!
//! | Method | Upstream | Returns |
//! |--------|----------|---------|
//! | [`SearchClient::search`] | `POST /search` | ranked [`SearchMatch`] list |
//! | [`SearchClient::fetch_document`] | `GET /document/{id}[?page=N]` | document JSON, untouched |
//!
//! Every request is bounded by `search.timeout_secs`. A failure is returned
//! to the caller immediately.

use anyhow::Result;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::SearchConfig;
use crate::models::SearchMatch;

/// Failures talking to the search service.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search service timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("search service unavailable{}: {message}", fmt_status(.status))]
    Unavailable {
        status: Option<u16>,
        message: String,
    },

    #[error("failed to fetch document '{document_id}'{}: {message}", fmt_status(.status))]
    DocumentFetchFailed {
        document_id: String,
        status: Option<u16>,
        message: String,
    },
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

#[derive(Serialize)]
struct SearchBody<'a> {
    query: &'a str,
    top_k: u32,
}

/// HTTP client bound to one search service base URL.
#[derive(Debug, Clone)]
pub struct SearchClient {
    base_url: Url,
    timeout: Duration,
    http: reqwest::Client,
}

impl SearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            base_url,
            timeout: config.timeout(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Run one ranked retrieval for `query`.
    pub async fn search(&self, query: &str, top_k: u32) -> Result<Vec<SearchMatch>, SearchError> {
        let url = self.endpoint(&["search"]);
        debug!(%url, top_k, "querying search service");

        let response = self
            .http
            .post(url)
            .json(&SearchBody { query, top_k })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Unavailable {
                status: Some(status.as_u16()),
                message: error_body(response, status).await,
            });
        }

        // The request timeout also covers reading the body.
        let results: Vec<SearchMatch> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout(self.timeout)
            } else {
                SearchError::Unavailable {
                    status: Some(status.as_u16()),
                    message: format!("invalid search response: {}", e),
                }
            }
        })?;

        debug!(count = results.len(), "search service responded");
        Ok(results)
    }

    /// Fetch the stored representation of one document, optionally scoped
    /// to a single page.
    pub async fn fetch_document(
        &self,
        document_id: &str,
        page: Option<i64>,
    ) -> Result<serde_json::Value, SearchError> {
        let mut url = self.endpoint(&["document", document_id]);
        if let Some(page) = page {
            url.query_pairs_mut().append_pair("page", &page.to_string());
        }
        debug!(%url, "fetching document");

        let failed = |status: Option<u16>, message: String| SearchError::DocumentFetchFailed {
            document_id: document_id.to_string(),
            status,
            message,
        };

        let response = match self.http.get(url).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Err(SearchError::Timeout(self.timeout)),
            Err(e) => return Err(failed(e.status().map(|s| s.as_u16()), e.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(failed(
                Some(status.as_u16()),
                error_body(response, status).await,
            ));
        }

        response.json().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout(self.timeout)
            } else {
                failed(
                    Some(status.as_u16()),
                    format!("invalid document response: {}", e),
                )
            }
        })
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn transport_error(&self, e: reqwest::Error) -> SearchError {
        if e.is_timeout() {
            SearchError::Timeout(self.timeout)
        } else {
            SearchError::Unavailable {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            }
        }
    }
}

/// Upstream error text, falling back to the status reason.
async fn error_body(response: reqwest::Response, status: StatusCode) -> String {
    let text = response.text().await.unwrap_or_default();
    if text.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        text
    }
}
