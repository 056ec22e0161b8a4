use std::time::Duration;

#[cfg(feature = "config")]
use murmur_config::ClientConfig;
use url::Url;

use crate::context::ConversationContext;
use crate::decode::decode_record;
use crate::error::{ClientError, DecodeError, Result};
use crate::stream::GenerationStream;
use crate::transport::Transport;
use crate::types::{ContinuationToken, GenerationOptions, GenerationRequest, ModelInfo, ModelList, ResponseRecord};

/// Address of a locally running Ollama server
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Model requested until another is chosen
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Bound on the initial response and every gap between body chunks
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for an Ollama-compatible generation server
///
/// Holds one conversation: every response's continuation token is stored
/// and sent with the next request until [`clear_context`](Self::clear_context)
/// is called. Clones share that conversation; create separate clients for
/// independent conversations.
#[derive(Debug, Clone)]
pub struct MurmurClient {
    transport: Transport,
    model: String,
    system: Option<String>,
    options: Option<GenerationOptions>,
    keep_alive: Option<String>,
    context: ConversationContext,
}

impl MurmurClient {
    /// Create a client for the server at `endpoint`
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| ClientError::Config(format!("invalid endpoint URL: {e}")))?;

        Self::with_transport(endpoint, DEFAULT_TIMEOUT, DEFAULT_MODEL.to_owned())
    }

    /// Create a client from loaded configuration
    #[cfg(feature = "config")]
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut client = Self::with_transport(config.endpoint.clone(), config.timeout, config.model.clone())?;
        client.system.clone_from(&config.system);
        client.options = config.options.as_ref().map(GenerationOptions::from);
        client.keep_alive.clone_from(&config.keep_alive);
        Ok(client)
    }

    fn with_transport(endpoint: Url, timeout: Duration, model: String) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(endpoint, timeout)?,
            model,
            system: None,
            options: None,
            keep_alive: None,
            context: ConversationContext::new(),
        })
    }

    /// Set the model used by subsequent requests
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Bound the initial response and every gap between body chunks
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.transport = self.transport.with_timeout(timeout);
        self
    }

    /// Send a system prompt with every request
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Send sampling options with every request
    #[must_use]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub const fn endpoint(&self) -> &Url {
        self.transport.endpoint()
    }

    pub const fn timeout(&self) -> Duration {
        self.transport.timeout()
    }

    /// Model identifier sent with the next request
    pub fn active_model(&self) -> &str {
        &self.model
    }

    /// Switch the model for subsequent requests
    ///
    /// The conversation context is kept; call
    /// [`clear_context`](Self::clear_context) as well when the new model
    /// should not see earlier turns.
    pub fn set_active_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
        tracing::debug!(model = %self.model, "active model changed");
    }

    /// Continuation token that the next request will carry
    pub fn context(&self) -> Option<ContinuationToken> {
        self.context.current()
    }

    /// Start a fresh conversation
    pub fn clear_context(&self) {
        self.context.clear();
        tracing::debug!("conversation context cleared");
    }

    /// Build the request the client would send for `prompt`
    ///
    /// Carries the active model, the configured defaults, and the currently
    /// stored continuation token.
    pub fn build_request(&self, prompt: &str, stream: bool) -> GenerationRequest {
        GenerationRequest::new(self.model.clone(), prompt)
            .streaming(stream)
            .with_context(self.context.current())
            .with_system(self.system.clone())
            .with_options(self.options.clone())
            .with_keep_alive(self.keep_alive.clone())
    }

    // -- Generation --

    /// Send `prompt` and return the complete response text
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a valid record
    pub async fn get_response(&self, prompt: &str) -> Result<String> {
        let request = self.build_request(prompt, false);
        Ok(self.generate(&request).await?.response)
    }

    /// Send an explicit request and decode the single response object
    ///
    /// The request is sent with `stream = false` regardless of how it was
    /// built. A continuation token in the response updates the context.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a valid record
    pub async fn generate(&self, request: &GenerationRequest) -> Result<ResponseRecord> {
        let request = request.clone().streaming(false);
        let body = self.transport.fetch_body(&request).await?;

        let text = String::from_utf8(body.to_vec()).map_err(DecodeError::from)?;
        let record = decode_record(text.trim())?;

        self.context.observe(&record);
        Ok(record)
    }

    /// Send `prompt` and stream the response records as they arrive
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the server answers
    /// with a non-success status
    pub async fn generate_streaming_response(&self, prompt: &str) -> Result<GenerationStream> {
        let request = self.build_request(prompt, true);
        self.generate_stream(&request).await
    }

    /// Send an explicit request and stream the response records
    ///
    /// The request is sent with `stream = true` regardless of how it was
    /// built.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the server answers
    /// with a non-success status
    pub async fn generate_stream(&self, request: &GenerationRequest) -> Result<GenerationStream> {
        let request = request.clone().streaming(true);
        let chunks = self.transport.open_stream(&request).await?;
        Ok(GenerationStream::new(chunks, self.context.clone()))
    }

    // -- Models --

    /// List models installed on the server
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the listing cannot be parsed
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let body = self.transport.get_body("/api/tags").await?;

        let list: ModelList = serde_json::from_slice(&body).map_err(|e| {
            let text = String::from_utf8_lossy(&body);
            DecodeError::json(e, &text)
        })?;

        Ok(list.models)
    }

    /// Check that the server is reachable and has the active model
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ModelNotFound`] if the model is not installed,
    /// or the transport error if the server cannot be reached
    pub async fn check_availability(&self) -> Result<()> {
        let models = self.list_models().await?;

        if models.iter().any(|m| m.matches(&self.model)) {
            Ok(())
        } else {
            Err(ClientError::ModelNotFound(self.model.clone()))
        }
    }
}
