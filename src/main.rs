//! # doc-chat CLI (`docchat`)
//!
//! The `docchat` binary starts the chat HTTP server and offers one-shot
//! commands that exercise the same pipeline from a shell.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat serve` | Start the HTTP server |
//! | `docchat ask "<query>"` | Search and answer once |
//! | `docchat analyze "<query>"` | Search and print result statistics |
//! | `docchat document <id>` | Print a document from the search service |
//! | `docchat config` | Print the effective configuration |
//!
//! ## Examples
//!
//! ```bash
//! # Fallback-only mode: no model credential
//! SEARCH_SERVICE_URL=http://localhost:8000 docchat serve
//!
//! # Full mode
//! LLM_API_KEY=sk-... MODEL_NAME=gpt-4o docchat serve --config ./config/docchat.toml
//!
//! docchat ask "refund policy" --top-k 3
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use doc_chat::{commands, config, init_logging, server};

const DEFAULT_CONFIG_PATH: &str = "./config/docchat.toml";

/// doc-chat answers questions from semantic search results, with or
/// without a language model.
///
/// Configuration is read from an optional TOML file, a `.env` file, and the
/// environment (`SEARCH_SERVICE_URL`, `LLM_GATEWAY_URL`, `LLM_API_KEY`,
/// `MODEL_NAME`, `DOCCHAT_BIND`).
#[derive(Parser)]
#[command(name = "docchat", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Optional when left at the default; an explicit path must exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for this crate when `RUST_LOG` is unset.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` (or `DOCCHAT_BIND`) and serves the chat API.
    Serve,

    /// Search and answer a single question.
    Ask {
        /// The question to answer.
        query: String,

        /// Number of search results to request (1-20).
        #[arg(long, allow_negative_numbers = true)]
        top_k: Option<i64>,
    },

    /// Search and print result statistics as JSON.
    Analyze {
        /// The search query.
        query: String,

        /// Number of search results to request (1-20).
        #[arg(long, allow_negative_numbers = true)]
        top_k: Option<i64>,
    },

    /// Fetch a document's stored representation from the search service.
    Document {
        /// Document identifier.
        id: String,

        /// Restrict to a single page.
        #[arg(long)]
        page: Option<i64>,
    },

    /// Print the effective configuration. The credential is never shown.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Before logging so RUST_LOG can come from .env.
    let dotenv = dotenvy::dotenv();
    init_logging(cli.log_level.as_deref());
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), ".env loaded");
    }

    let (config_path, required) = match cli.config {
        Some(path) => (path, true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };
    let cfg = config::load_config(&config_path, required)?;

    match cli.command {
        Commands::Serve => {
            log_startup(&cfg);
            server::run_server(&cfg).await?;
        }
        Commands::Ask { query, top_k } => {
            commands::run_ask(&cfg, &query, top_k).await?;
        }
        Commands::Analyze { query, top_k } => {
            commands::run_analyze(&cfg, &query, top_k).await?;
        }
        Commands::Document { id, page } => {
            commands::run_document(&cfg, &id, page).await?;
        }
        Commands::Config => {
            commands::show_config(&cfg);
        }
    }

    Ok(())
}

fn log_startup(cfg: &config::Config) {
    tracing::info!(search_url = %cfg.search.url, "search service");
    tracing::info!(gateway_url = %cfg.llm.gateway_url, model = %cfg.llm.model, "model gateway");
    match cfg.llm.credential() {
        Some(key) => tracing::info!(key_len = key.len(), "LLM API key present, model answers enabled"),
        None => tracing::warn!("LLM API key is missing, using fallback responses"),
    }
}
