//! Mock OpenAI-compatible chat-completion server for standalone runs and tests.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use rand::Rng;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

use super::config::MockServerConfig;
use crate::models::openai::{
    ChatCompletionChoice, ChatCompletionChunk, ChatCompletionChunkChoice, ChatCompletionChunkDelta,
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
};

/// Mock chat-completion server
pub struct MockChatServer {
    config: MockServerConfig,
    shutdown_tx: Option<oneshot::Sender<()>>,
    port: u16,
}

impl MockChatServer {
    /// Create a new mock server with the given configuration
    pub fn new(config: MockServerConfig) -> Self {
        Self {
            config,
            shutdown_tx: None,
            port: 0,
        }
    }

    /// Start the mock server and return the actual port
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("127.0.0.1:{}", self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        self.port = port;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let app = router(self.config.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        tracing::info!(port, "Mock chat-completion server started");
        Ok(port)
    }

    /// Get the server's port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the server's URL
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockChatServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Router serving `/v1/chat/completions`
pub fn router(config: MockServerConfig) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(handle_chat_completion))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(config))
}

/// Handle chat completion requests
async fn handle_chat_completion(
    State(config): State<Arc<MockServerConfig>>,
    Json(request): Json<ChatCompletionRequest>,
) -> Response {
    // Simulate random errors
    if config.error_rate > 0.0 {
        let mut rng = rand::thread_rng();
        if rng.gen::<f64>() < config.error_rate {
            return (StatusCode::INTERNAL_SERVER_ERROR, "Simulated error").into_response();
        }
    }

    let completion_id = format!("chatcmpl-{}", uuid::Uuid::new_v4().simple());

    if request.stream {
        let stream = generate_stream(config, completion_id, request.model);
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from_stream(stream))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    } else {
        let total_delay = config.first_token_delay_ms
            + config.chunk_latency_ms * config.chunk_count as u64;
        tokio::time::sleep(tokio::time::Duration::from_millis(total_delay)).await;

        let content = generate_content(config.chunk_count * config.chunk_size);
        let response = ChatCompletionResponse::new(
            completion_id,
            request.model,
            vec![ChatCompletionChoice {
                index: 0,
                message: ChatMessage::new("assistant", content),
                finish_reason: Some("stop".to_string()),
            }],
        );

        (StatusCode::OK, Json(response)).into_response()
    }
}

/// Generate a server-sent event stream of completion chunks
fn generate_stream(
    config: Arc<MockServerConfig>,
    id: String,
    model: String,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> {
    async_stream::stream! {
        // Role announcement carries no content
        yield Ok(sse_event(&chunk(&id, &model, ChatCompletionChunkDelta {
            role: Some("assistant".to_string()),
            content: None,
        }, None)));

        tokio::time::sleep(tokio::time::Duration::from_millis(config.first_token_delay_ms)).await;

        for i in 0..config.chunk_count {
            if i > 0 {
                tokio::time::sleep(tokio::time::Duration::from_millis(config.chunk_latency_ms)).await;
            }

            if config.heartbeat && i % 5 == 0 {
                yield Ok(Bytes::from_static(b": keep-alive\n\n"));
            }

            let delta = ChatCompletionChunkDelta {
                role: None,
                content: Some(generate_content(config.chunk_size)),
            };
            yield Ok(sse_event(&chunk(&id, &model, delta, None)));
        }

        yield Ok(sse_event(&chunk(&id, &model, ChatCompletionChunkDelta::default(), Some("stop"))));
        yield Ok(Bytes::from_static(b"data: [DONE]\n\n"));
    }
}

fn chunk(
    id: &str,
    model: &str,
    delta: ChatCompletionChunkDelta,
    finish_reason: Option<&str>,
) -> ChatCompletionChunk {
    ChatCompletionChunk::new(
        id.to_string(),
        model.to_string(),
        vec![ChatCompletionChunkChoice {
            index: 0,
            delta,
            finish_reason: finish_reason.map(str::to_string),
        }],
    )
}

fn sse_event(chunk: &ChatCompletionChunk) -> Bytes {
    let json = serde_json::to_string(chunk).unwrap_or_default();
    Bytes::from(format!("data: {}\n\n", json))
}

/// Generate random content of exactly `size` characters
fn generate_content(size: usize) -> String {
    const WORDS: &[&str] = &[
        "the",
        "quick",
        "brown",
        "fox",
        "jumps",
        "over",
        "lazy",
        "dog",
        "latency",
        "token",
        "stream",
        "model",
        "prompt",
        "benchmark",
        "throughput",
        "response",
    ];

    let mut rng = rand::thread_rng();
    let mut result = String::with_capacity(size + 16);

    while result.len() < size {
        let word = WORDS[rng.gen_range(0..WORDS.len())];
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(word);
    }

    result.truncate(size);
    result
}
