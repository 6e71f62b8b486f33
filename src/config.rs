use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::bench::config::{BenchmarkConfig, StreamMode};

/// Chat Completion Load Tester
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the chat-completion endpoint
    #[arg(
        short,
        long,
        env = "LOADTEST_ENDPOINT",
        default_value = "http://localhost:8088"
    )]
    pub endpoint: String,

    /// Bearer credential sent with every request
    #[arg(short = 'k', long, env = "LOADTEST_API_KEY")]
    pub api_key: Option<String>,

    /// Path to the JSON-lines samples file
    #[arg(short, long, env = "LOADTEST_SAMPLES")]
    pub samples: Option<String>,

    /// Number of samples to load
    #[arg(short, long, env = "LOADTEST_NUM_SAMPLES", default_value = "10")]
    pub num_samples: usize,

    /// Model to request
    #[arg(short, long, env = "LOADTEST_MODEL", default_value = "Qwen2-7B")]
    pub model: String,

    /// Sampling temperature
    #[arg(long, default_value = "0.7")]
    pub temperature: f32,

    /// Maximum output tokens per request
    #[arg(long, default_value = "512")]
    pub max_tokens: u32,

    /// Concurrency levels, comma separated
    #[arg(
        short,
        long,
        env = "LOADTEST_CONCURRENCY",
        value_delimiter = ',',
        default_values_t = [1usize, 2, 4, 8]
    )]
    pub concurrency: Vec<usize>,

    /// Response modes to run (stream, non-stream, both)
    #[arg(long, env = "LOADTEST_MODE", default_value = "both")]
    pub mode: StreamMode,

    /// Per-request timeout in seconds (0 disables)
    #[arg(long, env = "LOADTEST_REQUEST_TIMEOUT", default_value = "300")]
    pub request_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Start an in-process mock endpoint and benchmark it
    #[arg(long)]
    pub standalone: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Run settings
    pub bench: BenchmarkConfig,

    // Samples
    pub samples_path: Option<PathBuf>,
    pub num_samples: usize,

    // Output
    pub log_level: String,
    pub log_json: bool,
    pub json_output: bool,

    pub standalone: bool,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Ok(Self::from_args(CliArgs::parse()))
    }

    /// Build configuration from parsed arguments
    pub fn from_args(args: CliArgs) -> Self {
        Config {
            bench: BenchmarkConfig {
                endpoint: args.endpoint,
                api_key: args.api_key.filter(|k| !k.is_empty()),
                model: args.model,
                temperature: args.temperature,
                max_tokens: args.max_tokens,
                concurrency_levels: args.concurrency,
                mode: args.mode,
                request_timeout_secs: args.request_timeout,
            },

            samples_path: args
                .samples
                .filter(|s| !s.is_empty())
                .map(|s| expand_tilde(&s)),
            num_samples: args.num_samples,

            log_level: args.log_level,
            log_json: args.log_json,
            json_output: args.json,

            standalone: args.standalone,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.bench.concurrency_levels.is_empty() {
            anyhow::bail!("At least one concurrency level is required (use -c 1,2,4)");
        }
        if self.bench.concurrency_levels.contains(&0) {
            anyhow::bail!("Concurrency levels must be greater than zero");
        }
        if self.num_samples == 0 {
            anyhow::bail!("--num-samples must be greater than zero");
        }

        // In standalone mode the endpoint is replaced by the mock server's address
        if !self.standalone {
            let url = reqwest::Url::parse(&self.bench.endpoint)
                .with_context(|| format!("Invalid endpoint URL: {}", self.bench.endpoint))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!(
                    "Endpoint must use http or https, got: {}",
                    self.bench.endpoint
                );
            }

            match &self.samples_path {
                None => anyhow::bail!(
                    "A samples file is required (use -s or set LOADTEST_SAMPLES), or run with --standalone"
                ),
                Some(path) if !path.exists() => {
                    anyhow::bail!("Samples file does not exist: {}", path.display())
                }
                Some(_) => {}
            }
        } else if let Some(path) = &self.samples_path {
            if !path.exists() {
                anyhow::bail!("Samples file does not exist: {}", path.display());
            }
        }

        Ok(())
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
