//! Report generation for benchmark results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metrics::AggregateMetrics;

/// Complete benchmark report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Endpoint under test
    pub endpoint: String,
    /// Model requested
    pub model: String,
    /// Number of distinct samples replayed per level
    pub sample_count: usize,
    /// Results per (mode, concurrency) level, in run order
    pub levels: Vec<LevelReport>,
}

/// Results for a single level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelReport {
    pub stream: bool,
    pub concurrency: usize,
    /// Wall-clock time for the whole level
    pub elapsed_secs: f64,
    pub metrics: AggregateMetrics,
}

impl LevelReport {
    pub fn mode_label(&self) -> &'static str {
        if self.stream {
            "stream"
        } else {
            "non-stream"
        }
    }
}

impl BenchmarkReport {
    pub fn new(endpoint: String, model: String, sample_count: usize) -> Self {
        Self {
            started_at: Utc::now(),
            endpoint,
            model,
            sample_count,
            levels: Vec::new(),
        }
    }

    pub fn push(&mut self, level: LevelReport) {
        self.levels.push(level);
    }

    /// Levels that produced no successful request
    pub fn failed_levels(&self) -> impl Iterator<Item = &LevelReport> {
        self.levels.iter().filter(|l| l.metrics.is_failure())
    }

    /// Best throughput among successful levels, with its level
    pub fn max_throughput(&self) -> Option<(&LevelReport, f64)> {
        self.levels
            .iter()
            .filter_map(|l| l.metrics.summary().map(|s| (l, s.throughput_tokens_per_sec)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Print the report as an ASCII table
    pub fn print_table(&self) {
        println!();
        println!("╔══════════════════════════════════════════════════════════════════════════════════════════════════╗");
        println!("║                                CHAT COMPLETION LOAD TEST RESULTS                                 ║");
        println!("╚══════════════════════════════════════════════════════════════════════════════════════════════════╝");
        println!();
        println!("  Endpoint: {}", self.endpoint);
        println!("  Model:    {}", self.model);
        println!("  Samples:  {}", self.sample_count);
        println!("  Started:  {}", self.started_at.to_rfc3339());
        println!();
        println!("┌────────────┬─────────────┬──────────┬──────────┬──────────┬──────────┬───────────┬──────────┬─────────────┬──────────┐");
        println!("│    Mode    │ Concurrency │ TTFT avg │ TTFT p50 │ TTFT p95 │ Total avg│  tok/s    │ Success% │  OK/Total   │ Time(s)  │");
        println!("├────────────┼─────────────┼──────────┼──────────┼──────────┼──────────┼───────────┼──────────┼─────────────┼──────────┤");

        for level in &self.levels {
            match &level.metrics {
                AggregateMetrics::Summary(s) => println!(
                    "│ {:>10} │ {:>11} │ {:>8.1} │ {:>8.1} │ {:>8.1} │ {:>8.1} │ {:>9.1} │ {:>7.1}% │ {:>11} │ {:>8.2} │",
                    level.mode_label(),
                    level.concurrency,
                    s.avg_first_token_latency_ms,
                    s.p50_first_token_latency_ms,
                    s.p95_first_token_latency_ms,
                    s.avg_total_time_ms,
                    s.throughput_tokens_per_sec,
                    s.success_rate,
                    format!("{}/{}", s.success_requests, s.total_requests),
                    level.elapsed_secs
                ),
                AggregateMetrics::Failure(f) => println!(
                    "│ {:>10} │ {:>11} │ {:^78} │ {:>8.2} │",
                    level.mode_label(),
                    level.concurrency,
                    f.error.to_uppercase(),
                    level.elapsed_secs
                ),
            }
        }

        println!("└────────────┴─────────────┴──────────┴──────────┴──────────┴──────────┴───────────┴──────────┴─────────────┴──────────┘");
        println!("  TTFT = first-token latency (ms); Total = end-to-end request time (ms)");
        println!();

        for level in self.failed_levels() {
            if let AggregateMetrics::Failure(f) = &level.metrics {
                println!(
                    "Level {} x{} failed: {}",
                    level.mode_label(),
                    level.concurrency,
                    f.error
                );
                println!("Sample errors:");
                for err in &f.top_errors {
                    println!("  - {}", err);
                }
                println!();
            }
        }
    }

    /// Print a compact summary
    pub fn print_summary(&self) {
        println!("\n=== Load Test Summary ===");
        println!(
            "Levels: {} run, {} failed entirely",
            self.levels.len(),
            self.failed_levels().count()
        );

        match self.max_throughput() {
            Some((level, throughput)) => println!(
                "Max throughput: {:.1} tokens/s ({} at concurrency {})",
                throughput,
                level.mode_label(),
                level.concurrency
            ),
            None => println!("Max throughput: N/A (no level succeeded)"),
        }
    }

    /// Export the report as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
