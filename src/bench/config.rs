//! Configuration structs for benchmarking.

use serde::{Deserialize, Serialize};

/// Which response modes a run exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StreamMode {
    Stream,
    NonStream,
    #[default]
    Both,
}

impl StreamMode {
    /// Stream flags to run, in order. `Both` runs streaming first.
    pub fn stream_flags(&self) -> &'static [bool] {
        match self {
            StreamMode::Stream => &[true],
            StreamMode::NonStream => &[false],
            StreamMode::Both => &[true, false],
        }
    }
}

impl std::fmt::Display for StreamMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamMode::Stream => write!(f, "stream"),
            StreamMode::NonStream => write!(f, "non-stream"),
            StreamMode::Both => write!(f, "both"),
        }
    }
}

impl std::str::FromStr for StreamMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stream" | "streaming" => Ok(StreamMode::Stream),
            "non-stream" | "nonstream" | "non_stream" => Ok(StreamMode::NonStream),
            "both" | "all" => Ok(StreamMode::Both),
            _ => Err(format!("Unknown stream mode: {}", s)),
        }
    }
}

/// Configuration for the mock chat-completion server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockServerConfig {
    /// Port to listen on (0 for random)
    pub port: u16,
    /// Delay before the first content chunk in milliseconds
    pub first_token_delay_ms: u64,
    /// Simulated latency per chunk in milliseconds
    pub chunk_latency_ms: u64,
    /// Number of content chunks to generate
    pub chunk_count: usize,
    /// Size of each content chunk in characters
    pub chunk_size: usize,
    /// Error rate (0.0 to 1.0)
    pub error_rate: f64,
    /// Interleave keep-alive comment frames with content
    pub heartbeat: bool,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            first_token_delay_ms: 20,
            chunk_latency_ms: 5,
            chunk_count: 20,
            chunk_size: 8,
            error_rate: 0.0,
            heartbeat: true,
        }
    }
}

/// Configuration for a benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Base URL of the endpoint under test
    pub endpoint: String,
    /// Bearer credential, sent only when set
    pub api_key: Option<String>,
    /// Model to request
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum output tokens per request
    pub max_tokens: u32,
    /// Concurrency levels to test
    pub concurrency_levels: Vec<usize>,
    /// Response modes to test
    pub mode: StreamMode,
    /// Per-request timeout in seconds (0 disables)
    pub request_timeout_secs: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8088".to_string(),
            api_key: None,
            model: "Qwen2-7B".to_string(),
            temperature: 0.7,
            max_tokens: 512,
            concurrency_levels: vec![1, 2, 4, 8],
            mode: StreamMode::Both,
            request_timeout_secs: 300,
        }
    }
}

impl BenchmarkConfig {
    /// Create config targeting a local mock server
    pub fn standalone(port: u16) -> Self {
        Self {
            endpoint: format!("http://127.0.0.1:{}", port),
            ..Default::default()
        }
    }

    pub fn endpoint_path(&self) -> &'static str {
        "/v1/chat/completions"
    }

    /// Full completion URL
    pub fn url(&self) -> String {
        format!(
            "{}{}",
            self.endpoint.trim_end_matches('/'),
            self.endpoint_path()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_mode_parse() {
        assert_eq!("stream".parse::<StreamMode>().unwrap(), StreamMode::Stream);
        assert_eq!(
            "NON-STREAM".parse::<StreamMode>().unwrap(),
            StreamMode::NonStream
        );
        assert_eq!("both".parse::<StreamMode>().unwrap(), StreamMode::Both);
        assert!("sometimes".parse::<StreamMode>().is_err());
    }

    #[test]
    fn test_stream_mode_flags() {
        assert_eq!(StreamMode::Stream.stream_flags(), &[true]);
        assert_eq!(StreamMode::NonStream.stream_flags(), &[false]);
        assert_eq!(StreamMode::Both.stream_flags(), &[true, false]);
    }

    #[test]
    fn test_stream_mode_display_roundtrip() {
        for mode in [StreamMode::Stream, StreamMode::NonStream, StreamMode::Both] {
            assert_eq!(mode.to_string().parse::<StreamMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_url_joins_path() {
        let config = BenchmarkConfig {
            endpoint: "http://host:8088/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.url(), "http://host:8088/v1/chat/completions");

        let config = BenchmarkConfig::standalone(9000);
        assert_eq!(config.url(), "http://127.0.0.1:9000/v1/chat/completions");
    }

    #[test]
    fn test_defaults() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.concurrency_levels, vec![1, 2, 4, 8]);
        assert_eq!(config.max_tokens, 512);
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
        assert!(config.api_key.is_none());
    }
}
