//! Process-wide configuration.
//!
//! Configuration is assembled once at startup and never mutated afterwards.
//! Values are layered, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. the TOML file passed with `--config`
//! 3. process environment (`SEARCH_SERVICE_URL`, `LLM_GATEWAY_URL`,
//!    `LLM_API_KEY`, `MODEL_NAME`, `DOCCHAT_BIND`)
//!
//! A missing `LLM_API_KEY` is a supported runtime mode: every answer is then
//! composed locally from search results.
//!
//! ```toml
//! [search]
//! url = "http://localhost:8000"
//! timeout_secs = 60
//!
//! [llm]
//! gateway_url = "https://llmgateway.qburst.build"
//! model = "gpt-4o"
//! timeout_secs = 120
//!
//! [server]
//! bind = "0.0.0.0:8080"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Inclusive bounds for the number of search results a caller may request.
pub const TOP_K_RANGE: std::ops::RangeInclusive<u32> = 1..=20;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_url")]
    pub url: String,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            timeout_secs: default_search_timeout_secs(),
            default_top_k: default_top_k(),
        }
    }
}

fn default_search_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_search_timeout_secs() -> u64 {
    60
}
fn default_top_k() -> u32 {
    5
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    /// Bearer credential for the gateway. Only read from the environment in
    /// practice, but a TOML value is accepted for local setups.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_gateway_url() -> String {
    "https://llmgateway.qburst.build".to_string()
}
fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f32 {
    0.7
}
fn default_llm_timeout_secs() -> u64 {
    120
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("gateway_url", &self.gateway_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmConfig {
    /// True when both a gateway URL and a non-blank credential are present.
    pub fn is_configured(&self) -> bool {
        !self.gateway_url.trim().is_empty() && self.credential().is_some()
    }

    /// The credential, if set to something other than whitespace.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Config {
    /// Parse a TOML document into a configuration, without environment
    /// overrides or validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse config file")
    }

    /// Overlay values from an environment lookup.
    ///
    /// Blank values are treated as unset, except `LLM_API_KEY` which is
    /// kept as-is so that an explicitly blanked key still disables the model.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_blank("SEARCH_SERVICE_URL") {
            self.search.url = url;
        }
        if let Some(url) = non_blank("LLM_GATEWAY_URL") {
            self.llm.gateway_url = url;
        }
        if let Some(key) = lookup("LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = non_blank("MODEL_NAME") {
            self.llm.model = model;
        }
        if let Some(bind) = non_blank("DOCCHAT_BIND") {
            self.server.bind = bind;
        }
    }

    /// Check cross-field constraints. Called by [`load_config`].
    pub fn validate(&self) -> Result<()> {
        check_http_url("search.url", &self.search.url)?;
        check_http_url("llm.gateway_url", &self.llm.gateway_url)?;

        if self.search.timeout_secs == 0 {
            bail!("search.timeout_secs must be > 0");
        }
        if self.llm.timeout_secs <= self.search.timeout_secs {
            bail!(
                "llm.timeout_secs ({}) must be greater than search.timeout_secs ({})",
                self.llm.timeout_secs,
                self.search.timeout_secs
            );
        }
        if !TOP_K_RANGE.contains(&self.search.default_top_k) {
            bail!(
                "search.default_top_k must be in [{}, {}]",
                TOP_K_RANGE.start(),
                TOP_K_RANGE.end()
            );
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be in [0.0, 2.0]");
        }
        if self.llm.max_tokens == 0 {
            bail!("llm.max_tokens must be > 0");
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }

        Ok(())
    }
}

fn check_http_url(field: &str, value: &str) -> Result<()> {
    let url = reqwest::Url::parse(value)
        .with_context(|| format!("{} is not a valid URL: '{}'", field, value))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => bail!("{} must use http or https, got '{}'", field, other),
    }
}

/// Load configuration from an optional TOML file plus the process environment.
///
/// When `required` is false a missing file falls back to built-in defaults;
/// this is what happens for the default `--config` path.
pub fn load_config(path: &Path, required: bool) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Config::from_toml_str(&content)?
    } else if required {
        bail!("Config file not found: {}", path.display());
    } else {
        Config::default()
    };

    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;

    Ok(config)
}
