//! Single-request execution and timing.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::config::BenchmarkConfig;
use crate::error::{BenchError, Result};
use crate::http_client::BenchHttpClient;
use crate::models::openai::{ChatCompletionRequest, ChatCompletionResponse};
use crate::samples::Sample;
use crate::streaming::{collect_stream, StreamingResponseParser};

/// Outcome of one request.
///
/// Built only through [`RequestMetrics::success`] and [`RequestMetrics::failure`]: a
/// successful record carries timings and no error, a failed one carries an error and
/// zeroed timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetrics {
    pub success: bool,
    pub first_token_latency_ms: f64,
    pub total_time_ms: f64,
    pub generation_time_ms: f64,
    pub input_length: u64,
    pub output_length: u64,
    pub error: Option<String>,
}

impl RequestMetrics {
    pub fn success(
        input_length: u64,
        first_token_latency_ms: f64,
        total_time_ms: f64,
        generation_time_ms: f64,
        output_length: u64,
    ) -> Self {
        Self {
            success: true,
            first_token_latency_ms,
            total_time_ms,
            generation_time_ms,
            input_length,
            output_length,
            error: None,
        }
    }

    pub fn failure(input_length: u64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            first_token_latency_ms: 0.0,
            total_time_ms: 0.0,
            generation_time_ms: 0.0,
            input_length,
            output_length: 0,
            error: Some(error.into()),
        }
    }
}

/// Model and sampling parameters sent with every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&BenchmarkConfig> for GenerationParams {
    fn from(config: &BenchmarkConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Issues one chat-completion request per sample and turns the outcome into a
/// [`RequestMetrics`] record. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    http: BenchHttpClient,
    url: Arc<str>,
    params: Arc<GenerationParams>,
    stream: bool,
}

impl RequestExecutor {
    pub fn new(http: BenchHttpClient, config: &BenchmarkConfig, stream: bool) -> Self {
        Self {
            http,
            url: Arc::from(config.url()),
            params: Arc::new(GenerationParams::from(config)),
            stream,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.stream
    }

    /// Request body for a sample
    pub fn build_payload(&self, sample: &Sample) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.params.model.clone(),
            messages: sample.messages.clone(),
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
            stream: self.stream,
        }
    }

    /// Execute one request. Never fails: every fault becomes a failed record.
    pub async fn execute(&self, sample: &Sample) -> RequestMetrics {
        match self.try_execute(sample).await {
            Ok(metrics) => metrics,
            Err(e) => {
                debug!(error = %e, stream = self.stream, "Request failed");
                RequestMetrics::failure(sample.input_length, e.to_string())
            }
        }
    }

    async fn try_execute(&self, sample: &Sample) -> Result<RequestMetrics> {
        let payload = self.build_payload(sample);
        let timeout_secs = self.http.request_timeout_secs();

        let start = Instant::now();
        let response = self.http.post_json(&self.url, &payload).await?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(error = %e, status = status.as_u16(), "Failed to read error body");
                    String::new()
                }
            };
            return Err(BenchError::http_status(status.as_u16(), &body));
        }

        if self.stream {
            // A read fault mid-stream keeps its own description (transport or timeout)
            let outcome = collect_stream(response.bytes_stream(), StreamingResponseParser::new())
                .await
                .map_err(|e| BenchError::from_reqwest(e, timeout_secs))?
                .ok_or(BenchError::StreamProcessing)?;

            Ok(RequestMetrics::success(
                sample.input_length,
                millis_between(start, outcome.first_token_at),
                millis_between(start, outcome.finished_at),
                millis_between(outcome.first_token_at, outcome.finished_at),
                outcome.text.chars().count() as u64,
            ))
        } else {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| BenchError::from_reqwest(e, timeout_secs))?;
            let received = Instant::now();

            let body: ChatCompletionResponse =
                serde_json::from_slice(&bytes).map_err(|e| BenchError::Decode(e.to_string()))?;
            let content = body
                .first_content()
                .ok_or_else(|| BenchError::Decode("response has no message content".to_string()))?;

            let elapsed = millis_between(start, received);
            Ok(RequestMetrics::success(
                sample.input_length,
                elapsed,
                elapsed,
                0.0,
                content.chars().count() as u64,
            ))
        }
    }
}

fn millis_between(from: Instant, to: Instant) -> f64 {
    to.saturating_duration_since(from).as_secs_f64() * 1000.0
}
