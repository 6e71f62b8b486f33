//! Reduction of per-request records into per-level statistics.

use serde::{Deserialize, Serialize};

use super::executor::RequestMetrics;

/// Marker reported when no request of a level succeeded
pub const ALL_REQUESTS_FAILED: &str = "all requests failed";

/// Number of sample errors kept in a failure summary
pub const TOP_ERROR_COUNT: usize = 3;

/// Statistics over the successful requests of one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub avg_first_token_latency_ms: f64,
    pub p50_first_token_latency_ms: f64,
    pub p95_first_token_latency_ms: f64,
    pub avg_total_time_ms: f64,
    /// Output characters per second of summed request time
    pub throughput_tokens_per_sec: f64,
    /// Successes over all attempted requests, in percent
    pub success_rate: f64,
    pub total_requests: usize,
    pub success_requests: usize,
}

/// Summary of a level where every request failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureSummary {
    pub error: String,
    pub top_errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AggregateMetrics {
    Summary(LevelSummary),
    Failure(FailureSummary),
}

impl AggregateMetrics {
    /// Aggregate the records of one level.
    ///
    /// `total_requests` is the number of attempted requests as reported by the engine and
    /// is the success-rate denominator, whatever happened to the individual requests.
    pub fn from_results(results: &[RequestMetrics], total_requests: usize) -> Self {
        let successes: Vec<&RequestMetrics> = results.iter().filter(|r| r.success).collect();

        if successes.is_empty() {
            let top_errors = results
                .iter()
                .filter(|r| !r.success)
                .filter_map(|r| r.error.clone())
                .take(TOP_ERROR_COUNT)
                .collect();

            return AggregateMetrics::Failure(FailureSummary {
                error: ALL_REQUESTS_FAILED.to_string(),
                top_errors,
            });
        }

        let latencies: Vec<f64> = successes.iter().map(|r| r.first_token_latency_ms).collect();
        let total_times: Vec<f64> = successes.iter().map(|r| r.total_time_ms).collect();

        let total_output: u64 = successes.iter().map(|r| r.output_length).sum();
        let total_duration_secs = total_times.iter().sum::<f64>() / 1000.0;
        let throughput = if total_duration_secs > 0.0 {
            total_output as f64 / total_duration_secs
        } else {
            0.0
        };

        debug_assert!(
            total_requests >= successes.len(),
            "total_requests ({}) below success count ({})",
            total_requests,
            successes.len()
        );

        AggregateMetrics::Summary(LevelSummary {
            avg_first_token_latency_ms: mean(&latencies),
            p50_first_token_latency_ms: percentile(&latencies, 50.0),
            p95_first_token_latency_ms: percentile(&latencies, 95.0),
            avg_total_time_ms: mean(&total_times),
            throughput_tokens_per_sec: throughput,
            success_rate: successes.len() as f64 / total_requests as f64 * 100.0,
            total_requests,
            success_requests: successes.len(),
        })
    }

    pub fn summary(&self) -> Option<&LevelSummary> {
        match self {
            AggregateMetrics::Summary(summary) => Some(summary),
            AggregateMetrics::Failure(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, AggregateMetrics::Failure(_))
    }
}

/// Arithmetic mean, 0 for an empty set
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Percentile with linear interpolation between the closest ranks, over unsorted
/// input. 0 for an empty set.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(first_token_ms: f64, total_ms: f64, output: u64) -> RequestMetrics {
        RequestMetrics::success(10, first_token_ms, total_ms, total_ms - first_token_ms, output)
    }

    fn summary(metrics: AggregateMetrics) -> LevelSummary {
        match metrics {
            AggregateMetrics::Summary(s) => s,
            other => panic!("expected summary, got {other:?}"),
        }
    }

    #[test]
    fn test_percentile_single_value() {
        assert_eq!(percentile(&[42.0], 50.0), 42.0);
        assert_eq!(percentile(&[42.0], 95.0), 42.0);
        assert_eq!(percentile(&[42.0], 0.0), 42.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [40.0, 10.0, 30.0, 20.0];
        assert!((percentile(&values, 50.0) - 25.0).abs() < 1e-9);
        assert!((percentile(&values, 95.0) - 38.5).abs() < 1e-9);
        assert_eq!(percentile(&values, 0.0), 10.0);
        assert_eq!(percentile(&values, 100.0), 40.0);
    }

    #[test]
    fn test_percentile_ties_and_empty() {
        assert_eq!(percentile(&[7.0, 7.0, 7.0], 95.0), 7.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_two_request_scenario() {
        let results = vec![ok(50.0, 100.0, 10), ok(150.0, 300.0, 30)];

        let s = summary(AggregateMetrics::from_results(&results, 2));

        assert!((s.throughput_tokens_per_sec - 100.0).abs() < 1e-9);
        assert_eq!(s.success_rate, 100.0);
        assert_eq!(s.avg_total_time_ms, 200.0);
        assert_eq!(s.avg_first_token_latency_ms, 100.0);
        assert_eq!(s.p50_first_token_latency_ms, 100.0);
        assert_eq!(s.success_requests, 2);
        assert_eq!(s.total_requests, 2);
    }

    #[test]
    fn test_partial_failure_uses_total_denominator() {
        let results = vec![
            RequestMetrics::failure(10, "HTTP 500: boom"),
            ok(20.0, 80.0, 5),
            ok(30.0, 90.0, 5),
        ];

        let metrics = AggregateMetrics::from_results(&results, 3);
        assert!(!metrics.is_failure());

        let s = summary(metrics);
        assert!((s.success_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(s.success_requests, 2);
        assert_eq!(s.total_requests, 3);
        // Failed records do not contribute to timings
        assert_eq!(s.avg_total_time_ms, 85.0);
    }

    #[test]
    fn test_engine_total_is_the_denominator() {
        let results = vec![ok(10.0, 40.0, 4)];

        let s = summary(AggregateMetrics::from_results(&results, 4));

        assert_eq!(s.total_requests, 4);
        assert_eq!(s.success_rate, 25.0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "below success count")]
    fn test_total_below_successes_is_rejected() {
        AggregateMetrics::from_results(&[ok(1.0, 2.0, 3), ok(1.0, 2.0, 3)], 1);
    }

    #[test]
    fn test_zero_duration_throughput_is_zero() {
        let results = vec![ok(0.0, 0.0, 12), ok(0.0, 0.0, 3)];

        let s = summary(AggregateMetrics::from_results(&results, 2));

        assert_eq!(s.throughput_tokens_per_sec, 0.0);
        assert!(!s.throughput_tokens_per_sec.is_nan());
    }

    #[test]
    fn test_all_failed_keeps_first_three_errors() {
        let results: Vec<RequestMetrics> = (0..5)
            .map(|i| RequestMetrics::failure(10, format!("error {}", i)))
            .collect();

        let metrics = AggregateMetrics::from_results(&results, 5);

        assert_eq!(
            metrics,
            AggregateMetrics::Failure(FailureSummary {
                error: ALL_REQUESTS_FAILED.to_string(),
                top_errors: vec![
                    "error 0".to_string(),
                    "error 1".to_string(),
                    "error 2".to_string()
                ],
            })
        );
        assert!(metrics.summary().is_none());
    }

    #[test]
    fn test_all_failed_with_fewer_errors() {
        let results = vec![RequestMetrics::failure(1, "connection refused")];
        match AggregateMetrics::from_results(&results, 1) {
            AggregateMetrics::Failure(f) => assert_eq!(f.top_errors, vec!["connection refused"]),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_results_are_a_failure() {
        assert!(AggregateMetrics::from_results(&[], 0).is_failure());
    }

    #[test]
    fn test_order_independent() {
        let forward = vec![ok(10.0, 100.0, 1), ok(20.0, 200.0, 2), ok(70.0, 300.0, 3)];
        let mut reversed = forward.clone();
        reversed.reverse();

        assert_eq!(
            AggregateMetrics::from_results(&forward, 4),
            AggregateMetrics::from_results(&reversed, 4)
        );
    }

    #[test]
    fn test_serialized_shape() {
        let failure = AggregateMetrics::from_results(&[RequestMetrics::failure(1, "x")], 1);
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["status"], "failure");
        assert_eq!(value["error"], ALL_REQUESTS_FAILED);

        let success = AggregateMetrics::from_results(&[ok(1.0, 2.0, 3)], 1);
        let value = serde_json::to_value(&success).unwrap();
        assert_eq!(value["status"], "summary");
        assert_eq!(value["success_requests"], 1);
    }
}
