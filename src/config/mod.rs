//! Runner configuration (layered: defaults < TOML file < environment).
//!
//! There is no process-wide default. A [`BatonConfig`] value is owned by the
//! [`Runner`](crate::agent_loop::Runner) and consulted once per turn.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BatonError, Result};

const DEFAULT_MODEL: &str = "default";
const DEFAULT_MAX_TURNS: usize = 10;
const DEFAULT_GUARDRAIL_MAX_RETRIES: usize = 2;
const DEFAULT_TOON_MIN_CHARS: usize = 256;

const DEFAULT_MODEL_ENV: &str = "BATON_DEFAULT_MODEL";
const MAX_TURNS_ENV: &str = "BATON_MAX_TURNS";
const GUARDRAIL_MAX_RETRIES_ENV: &str = "BATON_GUARDRAIL_MAX_RETRIES";
const MAX_TOOL_CONCURRENCY_ENV: &str = "BATON_MAX_TOOL_CONCURRENCY";
const RUN_TIMEOUT_MS_ENV: &str = "BATON_RUN_TIMEOUT_MS";
const TOON_ENABLED_ENV: &str = "BATON_TOON_ENABLED";
const TOON_MIN_CHARS_ENV: &str = "BATON_TOON_MIN_CHARS";

/// Configuration for runs driven by a [`Runner`](crate::agent_loop::Runner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatonConfig {
    /// Model id used when an agent does not name one.
    pub default_model: String,
    /// Upper bound on model invocations per run.
    pub max_turns: usize,
    /// Extra invocations allowed after a retry-with-feedback guardrail fails.
    pub guardrail_max_retries: usize,
    /// Cap on concurrently executing tools in one batch. `None` runs the whole batch at once.
    pub max_tool_concurrency: Option<usize>,
    /// Wall-clock bound for a whole run.
    pub run_timeout_ms: Option<u64>,
    pub toon: ToonConfig,
}

impl Default for BatonConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            guardrail_max_retries: DEFAULT_GUARDRAIL_MAX_RETRIES,
            max_tool_concurrency: None,
            run_timeout_ms: None,
            toon: ToonConfig::default(),
        }
    }
}

/// Compaction of large structured tool results before they enter history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToonConfig {
    pub enabled: bool,
    /// Minimum length of the JSON rendering before a result is compacted.
    pub min_chars: usize,
}

impl Default for ToonConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_chars: DEFAULT_TOON_MIN_CHARS,
        }
    }
}

impl BatonConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `BATON_*` environment variables (and `.env`, if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config = Self::from_toml_str(&raw)?;
        let _ = dotenvy::dotenv();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a key lookup. Unparsable or zero values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(DEFAULT_MODEL_ENV) {
            let model = model.trim();
            if !model.is_empty() {
                self.default_model = model.to_string();
            }
        }
        if let Some(value) = lookup(MAX_TURNS_ENV).as_deref().and_then(parse_positive_usize) {
            self.max_turns = value;
        }
        if let Some(value) = lookup(GUARDRAIL_MAX_RETRIES_ENV)
            .and_then(|raw| raw.trim().parse::<usize>().ok())
        {
            self.guardrail_max_retries = value;
        }
        if let Some(value) = lookup(MAX_TOOL_CONCURRENCY_ENV)
            .as_deref()
            .and_then(parse_positive_usize)
        {
            self.max_tool_concurrency = Some(value);
        }
        if let Some(value) = lookup(RUN_TIMEOUT_MS_ENV)
            .as_deref()
            .and_then(parse_positive_usize)
        {
            self.run_timeout_ms = Some(value as u64);
        }
        if let Some(value) = lookup(TOON_ENABLED_ENV).as_deref().and_then(parse_bool) {
            self.toon.enabled = value;
        }
        if let Some(value) = lookup(TOON_MIN_CHARS_ENV)
            .as_deref()
            .and_then(parse_positive_usize)
        {
            self.toon.min_chars = value;
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_guardrail_max_retries(mut self, retries: usize) -> Self {
        self.guardrail_max_retries = retries;
        self
    }

    pub fn with_max_tool_concurrency(mut self, limit: usize) -> Self {
        self.max_tool_concurrency = Some(limit);
        self
    }

    pub fn with_run_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.run_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_toon(mut self, enabled: bool, min_chars: usize) -> Self {
        self.toon = ToonConfig { enabled, min_chars };
        self
    }

    /// Reject values the run loop cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(BatonError::Configuration(
                "max_turns must be at least 1".to_string(),
            ));
        }
        if self.max_tool_concurrency == Some(0) {
            return Err(BatonError::Configuration(
                "max_tool_concurrency must be at least 1".to_string(),
            ));
        }
        if self.default_model.trim().is_empty() {
            return Err(BatonError::Configuration(
                "default_model must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_positive_usize(value: &str) -> Option<usize> {
    let parsed = value.trim().parse::<usize>().ok()?;
    if parsed == 0 {
        None
    } else {
        Some(parsed)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
