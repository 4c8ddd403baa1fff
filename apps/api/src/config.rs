use anyhow::{Context, Result};

/// How the summary is delivered over the analyze response stream.
///
/// `Sliced` emits the finished summary in fixed-size character slices with a
/// pacing delay between them. `Incremental` forwards generator deltas as they
/// arrive, minimizing time-to-first-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryDelivery {
    Sliced,
    Incremental,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Maximum number of entries in the process-wide summary cache.
    pub summary_cache_cap: usize,
    /// Character count per slice in `Sliced` delivery.
    pub stream_chunk_chars: usize,
    /// Pacing delay between slices in `Sliced` delivery, in milliseconds.
    pub stream_pace_ms: u64,
    pub summary_delivery: SummaryDelivery,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let summary_delivery = match std::env::var("SUMMARY_DELIVERY")
            .unwrap_or_else(|_| "sliced".to_string())
            .to_lowercase()
            .as_str()
        {
            "incremental" => SummaryDelivery::Incremental,
            _ => SummaryDelivery::Sliced,
        };

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
            summary_cache_cap: env_or("SUMMARY_CACHE_CAP", "256")
                .parse::<usize>()
                .context("SUMMARY_CACHE_CAP must be a non-negative integer")?,
            stream_chunk_chars: env_or("STREAM_CHUNK_CHARS", "50")
                .parse::<usize>()
                .context("STREAM_CHUNK_CHARS must be a positive integer")?,
            stream_pace_ms: env_or("STREAM_PACE_MS", "100")
                .parse::<u64>()
                .context("STREAM_PACE_MS must be a non-negative integer")?,
            summary_delivery,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
