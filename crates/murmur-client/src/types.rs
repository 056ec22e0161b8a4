use std::time::Duration;

use jiff::Timestamp;
#[cfg(feature = "config")]
use murmur_config::SamplingConfig;
use serde::{Deserialize, Serialize};

// -- Conversation state --

/// Opaque server-issued conversation history
///
/// Echoed back on the next request so the server can resume the
/// conversation. The client never inspects its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(Vec<i64>);

impl ContinuationToken {
    /// Wrap raw token values
    pub const fn new(values: Vec<i64>) -> Self {
        Self(values)
    }

    /// Whether the token carries no history
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw token values
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }
}

impl From<Vec<i64>> for ContinuationToken {
    fn from(values: Vec<i64>) -> Self {
        Self(values)
    }
}

// -- Generation request --

/// Request body for `POST /api/generate`
///
/// Immutable once built; use the `with_*` methods while constructing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<ContinuationToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
}

impl GenerationRequest {
    /// Create a streaming request with no conversation context
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: true,
            context: None,
            system: None,
            options: None,
            keep_alive: None,
        }
    }

    /// Choose between an NDJSON body and a single JSON object
    #[must_use]
    pub const fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Attach a continuation token; empty tokens are dropped
    #[must_use]
    pub fn with_context(mut self, context: Option<ContinuationToken>) -> Self {
        self.context = context.filter(|token| !token.is_empty());
        self
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }

    /// Set sampling options
    #[must_use]
    pub fn with_options(mut self, options: Option<GenerationOptions>) -> Self {
        self.options = options;
        self
    }

    /// Set how long the server keeps the model loaded
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Option<String>) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub const fn is_streaming(&self) -> bool {
        self.stream
    }

    pub const fn context(&self) -> Option<&ContinuationToken> {
        self.context.as_ref()
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }
}

/// Model sampling options
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

#[cfg(feature = "config")]
impl From<&SamplingConfig> for GenerationOptions {
    fn from(config: &SamplingConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            num_predict: config.num_predict,
            seed: config.seed,
            stop: config.stop.clone(),
        }
    }
}

// -- Response records --

/// One decoded line of a generation response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseRecord {
    /// Model that produced the record
    #[serde(default)]
    pub model: String,
    /// Server-side creation time
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    /// Generated text fragment
    #[serde(default)]
    pub response: String,
    /// Whether this is the last record of the response
    #[serde(default)]
    pub done: bool,
    /// Conversation state to send with the next request
    #[serde(default)]
    pub context: Option<ContinuationToken>,
    /// Timing and usage, present on the final record
    #[serde(flatten)]
    pub metadata: GenerationMetadata,
}

impl ResponseRecord {
    /// Continuation token, if the record carries a non-empty one
    pub fn continuation(&self) -> Option<&ContinuationToken> {
        self.context.as_ref().filter(|token| !token.is_empty())
    }
}

/// Timing and token usage reported with the final record
///
/// Durations are nanoseconds, as sent on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GenerationMetadata {
    /// Why generation stopped ("stop", "length", ...)
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub load_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

impl GenerationMetadata {
    /// Wall time for the whole request
    pub fn total(&self) -> Option<Duration> {
        self.total_duration.map(Duration::from_nanos)
    }

    /// Generation throughput in tokens per second
    #[allow(clippy::cast_precision_loss)]
    pub fn tokens_per_second(&self) -> Option<f64> {
        let count = self.eval_count?;
        let nanos = self.eval_duration.filter(|&d| d > 0)?;
        Some(count as f64 / Duration::from_nanos(nanos).as_secs_f64())
    }
}

// -- Model listing --

/// Response from `GET /api/tags`
#[derive(Debug, Clone, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// An installed model
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelInfo {
    /// Model name including tag (e.g. "llama3.2:latest")
    pub name: String,
    #[serde(default)]
    pub modified_at: Option<Timestamp>,
    /// Size on disk in bytes
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub digest: Option<String>,
}

impl ModelInfo {
    /// Whether this entry satisfies a request for `model`
    ///
    /// An untagged request such as "llama3.2" matches any tag of that model.
    pub fn matches(&self, model: &str) -> bool {
        if self.name == model {
            return true;
        }

        !model.contains(':')
            && self
                .name
                .split_once(':')
                .is_some_and(|(base, _)| base == model)
    }
}
