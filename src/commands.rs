//! One-shot CLI commands.
//!
//! These run the same pipeline as the HTTP handlers without starting a
//! server, which is handy for checking a deployment's search and model
//! configuration from a shell.

use anyhow::Result;

use crate::analysis::analyze_results;
use crate::config::Config;
use crate::evidence::format_evidence;
use crate::generator::{ReplyOrigin, ResponseGenerator};
use crate::models::{check_top_k, AnalysisResponse, RAW_RESULTS_LIMIT};
use crate::search::SearchClient;

fn resolve_top_k(config: &Config, top_k: Option<i64>) -> Result<u32> {
    match top_k {
        Some(k) => Ok(check_top_k(k)?),
        None => Ok(config.search.default_top_k),
    }
}

/// `docchat ask`: search, generate, print the reply and its evidence.
pub async fn run_ask(config: &Config, query: &str, top_k: Option<i64>) -> Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("query must not be empty");
    }
    let top_k = resolve_top_k(config, top_k)?;

    let search = SearchClient::new(&config.search)?;
    let generator = ResponseGenerator::from_config(&config.llm)?;

    let results = search.search(query, top_k).await?;
    let evidence = format_evidence(&results);
    let reply = generator.generate(query, &evidence, &results).await;

    let origin = match reply.origin {
        ReplyOrigin::Model => "model",
        ReplyOrigin::Fallback(_) => "fallback",
    };

    println!("--- Reply ({}) ---", origin);
    println!("{}", reply.text);
    println!();
    println!("--- Context ({}) ---", evidence.len());
    for line in &evidence {
        println!("{}", line);
    }

    Ok(())
}

/// `docchat analyze`: search and print the analysis as JSON.
pub async fn run_analyze(config: &Config, query: &str, top_k: Option<i64>) -> Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("query must not be empty");
    }
    let top_k = resolve_top_k(config, top_k)?;

    let search = SearchClient::new(&config.search)?;
    let mut results = search.search(query, top_k).await?;
    let analysis = analyze_results(query, &results);
    results.truncate(RAW_RESULTS_LIMIT);

    let response = AnalysisResponse {
        analysis,
        raw_results: results,
        query: query.to_string(),
    };
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

/// `docchat document`: print the upstream document JSON.
pub async fn run_document(config: &Config, document_id: &str, page: Option<i64>) -> Result<()> {
    let search = SearchClient::new(&config.search)?;
    let document = search.fetch_document(document_id, page).await?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

/// `docchat config`: print the effective configuration, credential redacted.
pub fn show_config(config: &Config) {
    let key_status = match config.llm.credential() {
        Some(key) => format!("set ({} characters)", key.len()),
        None => "not set (fallback answers only)".to_string(),
    };

    println!("--- Configuration ---");
    println!("search.url:          {}", config.search.url);
    println!("search.timeout_secs: {}", config.search.timeout_secs);
    println!("search.default_top_k: {}", config.search.default_top_k);
    println!("llm.gateway_url:     {}", config.llm.gateway_url);
    println!("llm.model:           {}", config.llm.model);
    println!("llm.api_key:         {}", key_status);
    println!("llm.max_tokens:      {}", config.llm.max_tokens);
    println!("llm.temperature:     {}", config.llm.temperature);
    println!("llm.timeout_secs:    {}", config.llm.timeout_secs);
    println!("server.bind:         {}", config.server.bind);
}
