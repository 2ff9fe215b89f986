//! Response generation with graceful degradation.
//!
//! [`ResponseGenerator::generate`] always produces an answer. When a model
//! backend is configured it is asked first; every failure mode is absorbed
//! and replaced by a locally composed answer:
//!
//! ```text
//!  no backend ───────────────────────────▶ fallback (not configured)
//!  backend ─▶ complete() ─┬─ Ok(answer) ─▶ answer
//!                         ├─ Timeout ────▶ fallback (taking too long)
//!                         ├─ Unavailable ▶ fallback (trouble connecting)
//!                         ├─ Malformed ──▶ fallback (no note)
//!                         └─ Other ──────▶ fallback (error occurred)
//! ```

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::analysis::analyze_results;
use crate::config::LlmConfig;
use crate::fallback::{compose_fallback, FallbackReason};
use crate::llm::{ChatBackend, GatewayBackend, ModelError};
use crate::models::SearchMatch;
use crate::prompt::build_prompt;

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOrigin {
    Model,
    Fallback(Option<FallbackReason>),
}

/// A generated answer and its origin.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub origin: ReplyOrigin,
}

/// Turns search results into an answer, via the model when possible.
#[derive(Clone)]
pub struct ResponseGenerator {
    backend: Option<Arc<dyn ChatBackend>>,
}

impl ResponseGenerator {
    /// Build from configuration. Without a credential the generator runs in
    /// fallback-only mode.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        if !config.is_configured() {
            return Ok(Self::fallback_only());
        }
        Ok(Self::with_backend(Arc::new(GatewayBackend::new(config)?)))
    }

    pub fn with_backend(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn fallback_only() -> Self {
        Self { backend: None }
    }

    pub fn is_model_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Produce an answer for `query`.
    ///
    /// `evidence` must be the formatted lines for `results`, in order.
    pub async fn generate(&self, query: &str, evidence: &[String], results: &[SearchMatch]) -> Reply {
        let analysis = analyze_results(query, results);

        let fallback = |reason: Option<FallbackReason>| Reply {
            text: compose_fallback(query, evidence, &analysis, reason),
            origin: ReplyOrigin::Fallback(reason),
        };

        let Some(backend) = &self.backend else {
            debug!("no model credential configured, composing fallback");
            return fallback(Some(FallbackReason::NotConfigured));
        };

        let prompt = build_prompt(query, evidence, &analysis);
        debug!(
            model = backend.model_name(),
            prompt_chars = prompt.system.len() + prompt.user.len(),
            "invoking model gateway"
        );

        match backend.complete(&prompt.messages()).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    warn!("model returned an empty answer, composing fallback");
                    return fallback(None);
                }
                Reply {
                    text: text.to_string(),
                    origin: ReplyOrigin::Model,
                }
            }
            Err(ModelError::MalformedResponse) => {
                warn!("model response had no answer content, composing fallback");
                fallback(None)
            }
            Err(e @ ModelError::Timeout(_)) => {
                warn!(error = %e, "model call timed out, composing fallback");
                fallback(Some(FallbackReason::Timeout))
            }
            Err(e @ ModelError::Unavailable { .. }) => {
                warn!(error = %e, "model gateway unreachable, composing fallback");
                fallback(Some(FallbackReason::Connection))
            }
            Err(e @ ModelError::Other(_)) => {
                warn!(error = %e, "model call failed, composing fallback");
                fallback(Some(FallbackReason::Error))
            }
        }
    }
}
