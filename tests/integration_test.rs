// Integration tests for the load tester
//
// These tests run the full runner (executor, concurrency engine, aggregation and
// reporting) against the in-process mock chat-completion server.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_test::assert_ok;

use chat_loadtest::{
    bench::{
        AggregateMetrics, BenchmarkConfig, BenchmarkRunner, MockChatServer, MockServerConfig,
        StreamMode,
    },
    samples::{self, Sample},
};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

fn quick_mock() -> MockServerConfig {
    MockServerConfig {
        port: 0,
        first_token_delay_ms: 5,
        chunk_latency_ms: 1,
        chunk_count: 4,
        chunk_size: 8,
        error_rate: 0.0,
        heartbeat: true,
    }
}

async fn start_mock(config: MockServerConfig) -> MockChatServer {
    let mut server = MockChatServer::new(config);
    assert_ok!(server.start().await);
    server
}

fn bench_config(endpoint: String, mode: StreamMode, levels: Vec<usize>) -> BenchmarkConfig {
    BenchmarkConfig {
        endpoint,
        mode,
        concurrency_levels: levels,
        request_timeout_secs: 30,
        ..Default::default()
    }
}

fn write_samples_file(lines: &[&str]) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("loadtest-{}.jsonl", uuid::Uuid::new_v4()));
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

/// Endpoint that answers the first request with HTTP 500 and every later one with a
/// completion body
async fn start_first_request_fails_server() -> String {
    async fn handler(State(hits): State<Arc<AtomicUsize>>) -> axum::response::Response {
        if hits.fetch_add(1, Ordering::SeqCst) == 0 {
            return (StatusCode::INTERNAL_SERVER_ERROR, "upstream overloaded").into_response();
        }
        Json(json!({"choices": [{"message": {"role": "assistant", "content": "fine"}}]}))
            .into_response()
    }

    let app = Router::new()
        .route("/v1/chat/completions", post(handler))
        .with_state(Arc::new(AtomicUsize::new(0)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    format!("http://127.0.0.1:{}", port)
}

// ==================================================================================================
// Full Run Tests
// ==================================================================================================

#[tokio::test]
async fn test_full_run_both_modes() {
    let server = start_mock(quick_mock()).await;
    let runner = BenchmarkRunner::new(
        bench_config(server.url(), StreamMode::Both, vec![1, 3]),
        samples::synthetic_samples(2),
    )
    .unwrap();

    let report = runner.run().await;

    assert_eq!(report.levels.len(), 4);
    assert_eq!(report.failed_levels().count(), 0);
    assert_eq!(report.endpoint, server.url());

    for level in &report.levels {
        let summary = level.metrics.summary().unwrap();
        assert_eq!(summary.total_requests, 2 * level.concurrency);
        assert_eq!(summary.success_requests, summary.total_requests);
        assert_eq!(summary.success_rate, 100.0);
        assert!(summary.avg_first_token_latency_ms > 0.0);
        assert!(summary.avg_total_time_ms >= summary.avg_first_token_latency_ms);
        assert!(summary.p95_first_token_latency_ms >= summary.p50_first_token_latency_ms);
        assert!(summary.throughput_tokens_per_sec > 0.0);
    }

    // Streaming levels run first
    assert!(report.levels[0].stream && report.levels[1].stream);
    assert!(!report.levels[2].stream && !report.levels[3].stream);
}

#[tokio::test]
async fn test_stream_output_length_matches_generated_text() {
    let server = start_mock(quick_mock()).await;
    let runner = BenchmarkRunner::new(
        bench_config(server.url(), StreamMode::Stream, vec![2]),
        samples::synthetic_samples(3),
    )
    .unwrap();

    let run = runner.run_level(true, 2).await;

    assert_eq!(run.total_requests, 6);
    for result in &run.results {
        assert!(result.success, "unexpected failure: {:?}", result.error);
        // 4 chunks of 8 characters each
        assert_eq!(result.output_length, 32);
        assert!(result.first_token_latency_ms <= result.total_time_ms);
        assert!(
            (result.generation_time_ms
                - (result.total_time_ms - result.first_token_latency_ms))
                .abs()
                < 1e-6
        );
    }
}

#[tokio::test]
async fn test_samples_file_drives_the_run() {
    let path = write_samples_file(&[
        r#"{"messages": [{"role": "user", "content": "first"}], "length": 5}"#,
        "",
        r#"{"messages": [{"role": "user", "content": "second"}], "length": 6}"#,
        r#"{"messages": [{"role": "user", "content": "third"}], "length": 5}"#,
    ]);
    let loaded: Vec<Sample> = samples::load_samples(&path, 2).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded.len(), 2);

    let server = start_mock(quick_mock()).await;
    let runner = BenchmarkRunner::new(
        bench_config(server.url(), StreamMode::NonStream, vec![2]),
        loaded,
    )
    .unwrap();

    let run = runner.run_level(false, 2).await;

    assert_eq!(run.total_requests, 4);
    let mut lengths: Vec<u64> = run.results.iter().map(|r| r.input_length).collect();
    lengths.sort_unstable();
    assert_eq!(lengths, vec![5, 5, 6, 6]);
}

// ==================================================================================================
// Concurrency Tests
// ==================================================================================================

#[tokio::test]
async fn test_requests_within_level_overlap() {
    let server = start_mock(MockServerConfig {
        first_token_delay_ms: 300,
        chunk_count: 1,
        heartbeat: false,
        ..quick_mock()
    })
    .await;
    let runner = BenchmarkRunner::new(
        bench_config(server.url(), StreamMode::NonStream, vec![8]),
        samples::synthetic_samples(1),
    )
    .unwrap();

    let started = Instant::now();
    let run = runner.run_level(false, 8).await;
    let elapsed = started.elapsed();

    assert_eq!(run.results.len(), 8);
    assert!(run.results.iter().all(|r| r.success));
    // Sequential execution would take at least 8 x 300ms
    assert!(
        elapsed.as_millis() < 1500,
        "level took {:?}, requests did not overlap",
        elapsed
    );
}

// ==================================================================================================
// Failure Tests
// ==================================================================================================

#[tokio::test]
async fn test_failing_endpoint_yields_failure_levels() {
    let server = start_mock(MockServerConfig {
        error_rate: 1.0,
        ..quick_mock()
    })
    .await;
    let runner = BenchmarkRunner::new(
        bench_config(server.url(), StreamMode::Both, vec![2]),
        samples::synthetic_samples(2),
    )
    .unwrap();

    let report = runner.run().await;

    assert_eq!(report.levels.len(), 2);
    assert_eq!(report.failed_levels().count(), 2);
    assert!(report.max_throughput().is_none());

    for level in &report.levels {
        match &level.metrics {
            AggregateMetrics::Failure(f) => {
                assert_eq!(f.error, "all requests failed");
                assert_eq!(f.top_errors.len(), 3);
                assert!(f.top_errors[0].starts_with("HTTP 500"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_partial_failure_is_summarized() {
    let endpoint = start_first_request_fails_server().await;
    let runner = BenchmarkRunner::new(
        bench_config(endpoint, StreamMode::NonStream, vec![3]),
        samples::synthetic_samples(1),
    )
    .unwrap();

    let run = runner.run_level(false, 3).await;
    assert_eq!(run.total_requests, 3);
    assert_eq!(run.results.iter().filter(|r| r.success).count(), 2);

    let failed: Vec<_> = run.results.iter().filter(|r| !r.success).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(
        failed[0].error.as_deref(),
        Some("HTTP 500: upstream overloaded")
    );

    match AggregateMetrics::from_results(&run.results, run.total_requests) {
        AggregateMetrics::Summary(s) => {
            assert_eq!(s.total_requests, 3);
            assert_eq!(s.success_requests, 2);
            assert!((s.success_rate - 200.0 / 3.0).abs() < 0.01);
            assert!(s.throughput_tokens_per_sec > 0.0);
        }
        other => panic!("expected summary, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stopped_server_fails_without_aborting_run() {
    let mut server = start_mock(quick_mock()).await;
    let url = server.url();
    server.stop();
    drop(server);
    // Give the listener a moment to close
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let runner = BenchmarkRunner::new(
        bench_config(url, StreamMode::Stream, vec![1, 2]),
        samples::synthetic_samples(1),
    )
    .unwrap();

    let report = runner.run().await;

    assert_eq!(report.levels.len(), 2);
    assert_eq!(report.failed_levels().count(), 2);

    let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
    assert_eq!(json["levels"][1]["concurrency"], 2);
    assert_eq!(json["levels"][1]["metrics"]["status"], "failure");
}
