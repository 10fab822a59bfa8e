//! Configuration loading from quadbench.toml
//!
//! An optional `quadbench.toml` is discovered by walking up from the current
//! directory; CLI flags override anything found there.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Quadbench configuration file contents.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BenchConfig {
    /// Runner configuration.
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Runner configuration for the benchmark rounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Largest worker-pool size to test; rounds run k = 1..=max_workers.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Monte Carlo samples per task.
    #[serde(default = "default_samples")]
    pub samples: u64,
    /// Capacity (messages) of each channel.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Retry delay for non-blocking channel operations (e.g. "100ms").
    #[serde(default = "default_retry_delay")]
    pub retry_delay: String,
    /// How long to wait for a signaled worker before force-killing it.
    #[serde(default = "default_worker_timeout")]
    pub worker_timeout: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            samples: default_samples(),
            capacity: default_capacity(),
            retry_delay: default_retry_delay(),
            worker_timeout: default_worker_timeout(),
        }
    }
}

fn default_max_workers() -> usize {
    10
}
fn default_samples() -> u64 {
    5_000_000
}
fn default_capacity() -> usize {
    2
}
fn default_retry_delay() -> String {
    "100ms".to_string()
}
fn default_worker_timeout() -> String {
    "5s".to_string()
}

impl BenchConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from the
    /// current directory.
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join("quadbench.toml");
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Parse a duration string (e.g. "100ms", "2s", "1m") into a `Duration`.
    pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("empty duration string"));
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid duration number: {}", num_part))?;
        if value < 0.0 {
            return Err(anyhow::anyhow!("negative duration: {}", s));
        }

        let nanos_per_unit: f64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1.0,
            "us" => 1e3,
            "ms" => 1e6,
            "s" | "" => 1e9,
            "m" | "min" => 60e9,
            _ => return Err(anyhow::anyhow!("unknown duration unit: {}", unit_part)),
        };

        Ok(Duration::from_nanos((value * nanos_per_unit) as u64))
    }
}
