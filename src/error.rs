// Error handling module
// Defines the failure taxonomy for sample loading and request execution

use thiserror::Error;

/// Maximum number of response-body characters kept in an HTTP status error.
pub const ERROR_BODY_PREVIEW_CHARS: usize = 200;

/// Errors that can occur while loading samples or executing a benchmark request
#[derive(Error, Debug)]
pub enum BenchError {
    /// Endpoint answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Stream ended without a single non-empty content delta
    #[error("stream processing failed")]
    StreamProcessing,

    /// Connection, write or read fault reported by the HTTP client
    #[error("{0}")]
    Transport(String),

    /// Request exceeded the configured per-request timeout
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// Response body could not be decoded into a completion
    #[error("invalid response body: {0}")]
    Decode(String),

    /// HTTP client could not be constructed
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),

    /// Samples file could not be read
    #[error("Failed to read samples: {0}")]
    SampleIo(#[from] std::io::Error),

    /// A line of the samples file is not a valid sample
    #[error("Invalid sample on line {line}: {message}")]
    InvalidSample { line: usize, message: String },
}

impl BenchError {
    /// Build an HTTP status error, keeping only a short preview of the body.
    pub fn http_status(status: u16, body: &str) -> Self {
        BenchError::HttpStatus {
            status,
            body: body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
        }
    }

    /// Map a reqwest error, distinguishing timeouts from other transport faults.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            BenchError::Timeout(timeout_secs)
        } else if err.is_decode() {
            BenchError::Decode(err.to_string())
        } else {
            BenchError::Transport(err.to_string())
        }
    }
}

/// Result type alias for benchmark operations
pub type Result<T> = std::result::Result<T, BenchError>;
