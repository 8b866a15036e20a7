use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

use crate::summarizer::SummaryPolicy;

const DEFAULT_MODEL: &str = "openai/gpt-5-nano";
const DEFAULT_ENDPOINT: &str = "https://models.github.ai/inference/chat/completions";

/// Settings for the summarization pass
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub token: String,
    pub model: String,
    pub endpoint: String,
    pub policy: SummaryPolicy,
}

impl SummarizerConfig {
    pub fn from_env() -> Result<Self> {
        load_dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any variable source; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = get("GITHUB_TOKEN")
            .or_else(|| get("GITHUB_MODELS_TOKEN"))
            .context(
                "Missing GITHUB_TOKEN or GITHUB_MODELS_TOKEN.\n\n\
                To fix this, export one of them or add it to ~/.config/daily-news/.env:\n  \
                GITHUB_TOKEN=your_token_here\n\n\
                The token needs access to GitHub Models.",
            )?;

        let defaults = SummaryPolicy::default();
        let policy = SummaryPolicy {
            timeout: seconds(get("SUMMARY_TIMEOUT_SECS"), "SUMMARY_TIMEOUT_SECS", defaults.timeout)?,
            max_retries: number(get("SUMMARY_MAX_RETRIES"), "SUMMARY_MAX_RETRIES", defaults.max_retries)?,
            retry_delay: seconds(
                get("SUMMARY_RETRY_DELAY_SECS"),
                "SUMMARY_RETRY_DELAY_SECS",
                defaults.retry_delay,
            )?,
            min_interval: seconds(
                get("SUMMARY_MIN_INTERVAL_SECS"),
                "SUMMARY_MIN_INTERVAL_SECS",
                defaults.min_interval,
            )?,
            max_input_chars: number(
                get("SUMMARY_MAX_INPUT_CHARS"),
                "SUMMARY_MAX_INPUT_CHARS",
                defaults.max_input_chars,
            )?,
            max_calls: number(get("SUMMARY_MAX_CALLS"), "SUMMARY_MAX_CALLS", defaults.max_calls)?,
        };

        Ok(Self {
            token: token.trim().to_string(),
            model: get("GITHUB_MODELS_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            endpoint: get("GITHUB_MODELS_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            policy,
        })
    }
}

fn number<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .ok()
            .with_context(|| format!("{} must be a non-negative integer, got {:?}", key, raw)),
        None => Ok(default),
    }
}

fn seconds(value: Option<String>, key: &str, default: Duration) -> Result<Duration> {
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.trim().parse::<f64>().map(Duration::try_from_secs_f64) {
        Ok(Ok(duration)) => Ok(duration),
        _ => bail!("{} must be a number of seconds, got {:?}", key, raw),
    }
}

/// Token attached to feed requests for github.com
pub fn github_feed_token() -> Option<String> {
    ["GITHUB_TOKEN", "GH_TOKEN"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|v| !v.trim().is_empty())
}

/// Load `.env` from the current directory, ~/.config/daily-news or ~/
pub fn load_dotenv() {
    // 1. Current directory (for development)
    if dotenvy::dotenv().is_ok() {
        return;
    }

    // 2. ~/.config/daily-news/.env
    if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join("daily-news").join(".env");
        if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
            return;
        }
    }

    // 3. ~/.env
    if let Some(home_dir) = dirs::home_dir() {
        let home_path = home_dir.join(".env");
        if home_path.exists() {
            let _ = dotenvy::from_path(&home_path);
        }
    }
}
