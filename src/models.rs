//! Core data models used throughout the chat pipeline.
//!
//! These types represent the search hits, derived statistics, and the
//! request/response bodies that flow through the HTTP surface. None of them
//! outlive a single request.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TOP_K_RANGE;

/// One ranked hit returned by the search service.
///
/// Every field is optional upstream; absent fields deserialize to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub document_page: Option<i64>,
    #[serde(default)]
    pub similarity_score: Option<f64>,
    #[serde(default)]
    pub tokens: Option<u64>,
    #[serde(default)]
    pub billable_characters: Option<u64>,
}

/// Aggregate statistics over one request's search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultAnalysis {
    pub total_results: usize,
    pub average_similarity: f64,
    pub max_similarity: f64,
    pub min_similarity: f64,
    pub unique_documents: usize,
    pub pages_covered: usize,
    pub query: String,
}

/// Inbound body for `POST /chat` and `POST /chat/analyze`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<i64>,
    /// Recorded in logs only.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Rejections raised before any upstream call is made.
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("top_k must be between {min} and {max}, got {got}")]
    TopKOutOfRange { got: i64, min: u32, max: u32 },
}

impl ChatRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: None,
            user_id: None,
        }
    }

    /// Validate the request and resolve the effective `top_k`.
    pub fn validate(&self, default_top_k: u32) -> Result<u32, RequestError> {
        if self.query.trim().is_empty() {
            return Err(RequestError::EmptyQuery);
        }
        match self.top_k {
            None => Ok(default_top_k),
            Some(k) => check_top_k(k),
        }
    }
}

/// Check a caller-supplied `top_k` against [`TOP_K_RANGE`].
pub fn check_top_k(k: i64) -> Result<u32, RequestError> {
    u32::try_from(k)
        .ok()
        .filter(|k| TOP_K_RANGE.contains(k))
        .ok_or(RequestError::TopKOutOfRange {
            got: k,
            min: *TOP_K_RANGE.start(),
            max: *TOP_K_RANGE.end(),
        })
}

/// Outbound body for `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub context: Vec<String>,
}

/// Number of raw hits echoed back by an analysis.
pub const RAW_RESULTS_LIMIT: usize = 10;

/// Outbound body for `POST /chat/analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub analysis: ResultAnalysis,
    pub raw_results: Vec<SearchMatch>,
    pub query: String,
}
