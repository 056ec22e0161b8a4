//! Mock Ollama server for integration tests
//!
//! Serves scripted replies to `POST /api/generate` in a chosen chunking and
//! records every request body it receives

use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use murmur_client::MurmurClient;
use tokio_util::sync::CancellationToken;

/// Pause between streamed chunks so each tends to arrive as its own read
const CHUNK_GAP: Duration = Duration::from_millis(5);

/// One scripted reply to a generate request
pub enum Reply {
    /// 200 with the body sent as these chunks, in order
    Chunks(Vec<Bytes>),
    /// 200 with a single JSON object
    Json(serde_json::Value),
    /// Non-2xx with a raw body
    Status(StatusCode, String),
    /// 200, sends the first chunk, then never sends anything else
    Stall(Bytes),
    /// 200, sends the first chunk, then drops the connection
    Abort(Bytes),
    /// Non-2xx whose body starts but never finishes
    StatusStall(StatusCode, Bytes),
    /// Accepts the request and never sends headers
    Hang,
}

impl Reply {
    /// Stream the given pieces exactly as split
    pub fn chunks<I, S>(pieces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self::Chunks(
            pieces
                .into_iter()
                .map(|p| Bytes::copy_from_slice(p.as_ref()))
                .collect(),
        )
    }

    /// Stream `body` cut at the given byte offsets
    pub fn split_at(body: &str, cuts: &[usize]) -> Self {
        let bytes = body.as_bytes();
        let mut pieces = Vec::new();
        let mut start = 0;
        for &cut in cuts {
            pieces.push(&bytes[start..cut]);
            start = cut;
        }
        pieces.push(&bytes[start..]);
        Self::chunks(pieces)
    }

    pub fn status(code: u16, body: &str) -> Self {
        Self::Status(
            StatusCode::from_u16(code).expect("valid status code"),
            body.to_owned(),
        )
    }

    pub fn stall(first: &str) -> Self {
        Self::Stall(Bytes::copy_from_slice(first.as_bytes()))
    }

    pub fn abort(first: &str) -> Self {
        Self::Abort(Bytes::copy_from_slice(first.as_bytes()))
    }

    pub fn status_stall(code: u16, first: &str) -> Self {
        Self::StatusStall(
            StatusCode::from_u16(code).expect("valid status code"),
            Bytes::copy_from_slice(first.as_bytes()),
        )
    }
}

struct MockState {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<serde_json::Value>>,
    models: Vec<String>,
}

/// Mock server that answers with scripted replies
pub struct MockOllama {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockOllama {
    /// Start a server answering successive generate requests with `replies`
    pub async fn start(replies: Vec<Reply>) -> anyhow::Result<Self> {
        Self::start_with_models(replies, &["llama3.2:latest", "mistral:7b"]).await
    }

    /// Start a server that also reports these installed models
    pub async fn start_with_models(replies: Vec<Reply>, models: &[&str]) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            models: models.iter().map(|&m| m.to_owned()).collect(),
        });

        let app = Router::new()
            .route("/api/generate", routing::post(handle_generate))
            .route("/api/tags", routing::get(handle_tags))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the client
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client pointed at this server with a short timeout
    pub fn client(&self) -> MurmurClient {
        MurmurClient::new(&self.url())
            .expect("mock URL must parse")
            .with_model("llama3.2")
            .with_timeout(Duration::from_secs(5))
    }

    /// Request bodies received so far, oldest first
    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for MockOllama {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_generate(
    State(state): State<Arc<MockState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.requests.lock().unwrap().push(body);

    let Some(reply) = state.replies.lock().unwrap().pop_front() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "no scripted reply left"})),
        )
            .into_response();
    };

    match reply {
        Reply::Chunks(chunks) => {
            let body = stream::iter(chunks).then(|chunk| async move {
                tokio::time::sleep(CHUNK_GAP).await;
                Ok::<_, Infallible>(chunk)
            });
            ndjson(Body::from_stream(body))
        }
        Reply::Json(value) => Json(value).into_response(),
        Reply::Status(status, body) => (status, body).into_response(),
        Reply::Stall(first) => {
            let body = stream::iter([Ok::<_, Infallible>(first)]).chain(stream::pending());
            ndjson(Body::from_stream(body))
        }
        Reply::Abort(first) => {
            let body = stream::iter([
                Ok(first),
                Err(std::io::Error::other("mock connection reset")),
            ])
            .then(|item| async move {
                tokio::time::sleep(CHUNK_GAP).await;
                item
            });
            ndjson(Body::from_stream(body))
        }
        Reply::StatusStall(status, first) => {
            let body = stream::iter([Ok::<_, Infallible>(first)]).chain(stream::pending());
            (status, Body::from_stream(body)).into_response()
        }
        Reply::Hang => std::future::pending().await,
    }
}

async fn handle_tags(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    let models: Vec<_> = state
        .models
        .iter()
        .map(|name| {
            serde_json::json!({
                "name": name,
                "modified_at": "2024-06-01T10:00:00Z",
                "size": 4_661_224_676_u64,
                "digest": "sha256:abc123",
            })
        })
        .collect();

    Json(serde_json::json!({ "models": models }))
}

fn ndjson(body: Body) -> Response {
    ([(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response()
}
