//! # doc-chat
//!
//! A conversational backend that answers questions from semantic search
//! results.
//!
//! Each user query is sent once to an external search service. The ranked
//! matches are summarized, rendered as evidence lines, and composed into a
//! prompt for an OpenAI-compatible model gateway. When the gateway is not
//! configured, slow, or failing, an answer of the same shape is composed
//! locally from the search results instead.
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────┐
//!  query ────▶ │ SearchClient │ ──▶ Vec<SearchMatch>
//!              └──────────────┘            │
//!                    ┌─────────────────────┼──────────────────┐
//!                    ▼                     ▼                  │
//!             analyze_results       format_evidence           │
//!                    └──────────┬──────────┘                  │
//!                               ▼                             │
//!                     ┌───────────────────┐                   │
//!                     │ ResponseGenerator │── build_prompt ──▶ ChatBackend
//!                     └───────────────────┘                   │
//!                               │ on any model failure        │
//!                               ▼                             │
//!                       compose_fallback                      │
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Layered TOML + environment configuration |
//! | [`models`] | Search hits, statistics, request/response bodies |
//! | [`analysis`] | Summary statistics over search results |
//! | [`evidence`] | Evidence line rendering |
//! | [`search`] | Search service client |
//! | [`prompt`] | Model prompt construction |
//! | [`fallback`] | Locally composed answers |
//! | [`llm`] | Model gateway backend |
//! | [`generator`] | Model-or-fallback answer generation |
//! | [`server`] | HTTP API |
//! | [`commands`] | One-shot CLI commands |

pub mod analysis;
pub mod commands;
pub mod config;
pub mod evidence;
pub mod fallback;
pub mod generator;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod search;
pub mod server;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` (or `info`) applies to this
/// crate and HTTP tracing. Output goes to stderr so command output on stdout
/// stays machine-readable.
pub fn init_logging(level: Option<&str>) {
    let fallback = format!(
        "doc_chat={level},tower_http={level}",
        level = level.unwrap_or("info")
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
