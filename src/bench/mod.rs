//! Load-testing engine for OpenAI-compatible chat-completion endpoints.
//!
//! This module provides:
//! - A single-request executor measuring first-token latency and total time
//! - Concurrent fan-out of every sample at each concurrency level
//! - Per-level aggregation with linear-interpolation percentiles
//! - Report generation (table and JSON)
//! - A mock chat-completion server for standalone runs and tests

pub mod config;
pub mod executor;
pub mod metrics;
pub mod mock_server;
pub mod report;
pub mod runner;

pub use config::{BenchmarkConfig, MockServerConfig, StreamMode};
pub use executor::{RequestExecutor, RequestMetrics};
pub use metrics::AggregateMetrics;
pub use mock_server::MockChatServer;
pub use report::BenchmarkReport;
pub use runner::{run_concurrent, BenchmarkRunner, LevelRun};
