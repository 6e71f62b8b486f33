//! Concurrent request fan-out and the level-by-level driver.

use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

use super::config::BenchmarkConfig;
use super::executor::{RequestExecutor, RequestMetrics};
use super::metrics::AggregateMetrics;
use super::report::{BenchmarkReport, LevelReport};
use crate::error::Result;
use crate::http_client::BenchHttpClient;
use crate::samples::Sample;

/// Everything one level produced
#[derive(Debug, Clone)]
pub struct LevelRun {
    /// One record per invocation, in completion order
    pub results: Vec<RequestMetrics>,
    /// Number of invocations launched (samples x concurrency)
    pub total_requests: usize,
}

/// Launch `samples.len() * concurrency` requests at once and wait for every one of them.
///
/// Each sample is replayed `concurrency` times. No invocation can cancel another: a
/// failed request is just a failed record, and a panicked task is recorded as a failure
/// too, so `results.len() == total_requests` always holds.
pub async fn run_concurrent(
    executor: &RequestExecutor,
    samples: &Arc<Vec<Sample>>,
    concurrency: usize,
) -> LevelRun {
    let total_requests = samples.len() * concurrency;
    let mut tasks = JoinSet::new();

    for idx in 0..samples.len() {
        for _ in 0..concurrency {
            let executor = executor.clone();
            let samples = Arc::clone(samples);
            tasks.spawn(async move { executor.execute(&samples[idx]).await });
        }
    }

    let mut results = Vec::with_capacity(total_requests);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(metrics) => results.push(metrics),
            Err(e) => {
                tracing::error!(error = %e, "Request task did not complete");
                results.push(RequestMetrics::failure(0, format!("request task failed: {}", e)));
            }
        }
    }

    LevelRun {
        results,
        total_requests,
    }
}

/// Benchmark runner that executes requests against the endpoint
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
    http: BenchHttpClient,
    samples: Arc<Vec<Sample>>,
}

impl BenchmarkRunner {
    /// Create a new benchmark runner. All levels share one connection pool.
    pub fn new(config: BenchmarkConfig, samples: Vec<Sample>) -> Result<Self> {
        let http = BenchHttpClient::new(config.api_key.as_deref(), config.request_timeout_secs)?;

        Ok(Self {
            config,
            http,
            samples: Arc::new(samples),
        })
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Executor for one response mode
    pub fn executor(&self, stream: bool) -> RequestExecutor {
        RequestExecutor::new(self.http.clone(), &self.config, stream)
    }

    /// Run one level: every sample `concurrency` times, all at once
    pub async fn run_level(&self, stream: bool, concurrency: usize) -> LevelRun {
        run_concurrent(&self.executor(stream), &self.samples, concurrency).await
    }

    /// Run every configured mode and concurrency level in order
    pub async fn run(&self) -> BenchmarkReport {
        let mut report = BenchmarkReport::new(
            self.config.endpoint.clone(),
            self.config.model.clone(),
            self.samples.len(),
        );

        for &stream in self.config.mode.stream_flags() {
            tracing::info!(stream, "Starting response mode");

            for &concurrency in &self.config.concurrency_levels {
                tracing::info!(
                    stream,
                    concurrency,
                    requests = self.samples.len() * concurrency,
                    "Running level"
                );

                let started = Instant::now();
                let run = self.run_level(stream, concurrency).await;
                let metrics = AggregateMetrics::from_results(&run.results, run.total_requests);
                let elapsed_secs = started.elapsed().as_secs_f64();

                match &metrics {
                    AggregateMetrics::Summary(s) => tracing::info!(
                        stream,
                        concurrency,
                        elapsed_secs = %format!("{:.2}", elapsed_secs),
                        success = %format!("{}/{}", s.success_requests, s.total_requests),
                        success_rate = %format!("{:.1}%", s.success_rate),
                        ttft_avg_ms = %format!("{:.1}", s.avg_first_token_latency_ms),
                        ttft_p95_ms = %format!("{:.1}", s.p95_first_token_latency_ms),
                        total_avg_ms = %format!("{:.1}", s.avg_total_time_ms),
                        throughput = %format!("{:.1}", s.throughput_tokens_per_sec),
                        "Level complete"
                    ),
                    AggregateMetrics::Failure(f) => tracing::warn!(
                        stream,
                        concurrency,
                        error = %f.error,
                        top_errors = ?f.top_errors,
                        "Level failed"
                    ),
                }

                report.push(LevelReport {
                    stream,
                    concurrency,
                    elapsed_secs,
                    metrics,
                });
            }
        }

        report
    }
}
