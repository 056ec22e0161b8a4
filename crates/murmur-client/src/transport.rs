use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tokio::time::Instant;
use url::Url;

use crate::error::TransportError;
use crate::types::GenerationRequest;

/// Raw response body chunks in arrival order
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// HTTP request/response lifecycle for one server
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl Transport {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            endpoint,
            timeout,
        })
    }

    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a generation request and expose the body as it arrives
    ///
    /// Fails without yielding anything when the server answers non-2xx.
    pub async fn open_stream(&self, request: &GenerationRequest) -> Result<ChunkStream, TransportError> {
        let response = self.post_generate(request).await?;
        Ok(body_chunks(response.bytes_stream(), self.timeout))
    }

    /// Send a generation request and wait for the whole body
    pub async fn fetch_body(&self, request: &GenerationRequest) -> Result<Bytes, TransportError> {
        let response = self.post_generate(request).await?;
        self.read_body(response).await
    }

    /// `GET` a path below the endpoint and wait for the whole body
    pub async fn get_body(&self, path: &str) -> Result<Bytes, TransportError> {
        let url = make_url(&self.endpoint, path);
        tracing::debug!(%url, "sending request");

        let response = self.within_timeout(self.http.get(url)).await?;
        self.read_body(response).await
    }

    async fn post_generate(&self, request: &GenerationRequest) -> Result<reqwest::Response, TransportError> {
        let url = make_url(&self.endpoint, "/api/generate");

        tracing::debug!(
            %url,
            model = request.model(),
            stream = request.is_streaming(),
            has_context = request.context().is_some(),
            "sending generation request"
        );

        self.within_timeout(self.http.post(url).json(request)).await
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<Bytes, TransportError> {
        tokio::time::timeout(self.timeout, response.bytes())
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
            .map_err(Into::into)
    }

    /// Send and wait for a successful response, bounded by the call timeout
    ///
    /// Connecting, receiving headers and reading an error body all share one
    /// deadline.
    async fn within_timeout(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, TransportError> {
        let deadline = Instant::now() + self.timeout;

        let response = tokio::time::timeout_at(deadline, builder.send())
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;

        check_status(response, deadline).await
    }
}

/// Join a path onto the endpoint, keeping any base path it already has
fn make_url(endpoint: &Url, path: &str) -> Url {
    let mut url = endpoint.clone();
    let joined = format!("{}{path}", endpoint.path().trim_end_matches('/'));
    url.set_path(&joined);
    url
}

/// Turn a non-2xx response into a [`TransportError::Status`]
///
/// An error body that does not arrive by `deadline` is abandoned and the
/// status reason stands in for it.
async fn check_status(response: reqwest::Response, deadline: Instant) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = tokio::time::timeout_at(deadline, response.text())
        .await
        .ok()
        .and_then(Result::ok)
        .unwrap_or_default();

    let message = match parse_error_body(&body) {
        message if message.is_empty() => status.canonical_reason().unwrap_or("no error body").to_owned(),
        message => message,
    };

    Err(TransportError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Extract the message from `{"error": "..."}` or `{"error": {"message": "..."}}`
fn parse_error_body(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_owned();
    };

    let error = &json["error"];
    error
        .as_str()
        .or_else(|| error["message"].as_str())
        .map_or_else(|| body.trim().to_owned(), ToOwned::to_owned)
}

/// Wrap a response body so every chunk must arrive within `timeout`
///
/// The first failure ends the stream and drops the body, closing the
/// connection.
fn body_chunks<S>(body: S, timeout: Duration) -> ChunkStream
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let body = Box::pin(body);

    Box::pin(stream::unfold(Some(body), move |body| async move {
        let mut body = body?;

        match tokio::time::timeout(timeout, body.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
            Ok(Some(Err(e))) => Some((Err(TransportError::Http(e)), None)),
            Ok(None) => None,
            Err(_) => Some((Err(TransportError::Timeout(timeout)), None)),
        }
    }))
}
