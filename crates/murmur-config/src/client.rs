use std::time::Duration;

use serde::{Deserialize, Deserializer};
use url::Url;

/// Default Ollama-compatible server address
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Per-call timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Generation endpoint and per-request defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the generation server
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,
    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,
    /// Bound on the initial response and on every gap between body chunks
    /// (e.g. "30s", "2m")
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// How long the server keeps the model loaded after a request
    #[serde(default)]
    pub keep_alive: Option<String>,
    /// System prompt sent with every request
    #[serde(default)]
    pub system: Option<String>,
    /// Sampling options
    #[serde(default)]
    pub options: Option<SamplingConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            timeout: DEFAULT_TIMEOUT,
            keep_alive: None,
            system: None,
            options: None,
        }
    }
}

/// Model sampling options forwarded verbatim to the server
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplingConfig {
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default)]
    pub top_p: Option<f64>,
    /// Top-k sampling cutoff
    #[serde(default)]
    pub top_k: Option<u32>,
    /// Maximum tokens to generate (-1 for unbounded)
    #[serde(default)]
    pub num_predict: Option<i32>,
    /// Fixed seed for reproducible output
    #[serde(default)]
    pub seed: Option<i64>,
    /// Stop sequences
    #[serde(default)]
    pub stop: Option<Vec<String>>,
}

fn default_endpoint() -> Url {
    Url::parse(DEFAULT_ENDPOINT).expect("default endpoint must be a valid URL")
}

fn default_model() -> String {
    DEFAULT_MODEL.to_owned()
}

const fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// Parse a human-readable duration string such as "45s" or "1m30s"
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    duration_str::parse(&raw).map_err(|e| serde::de::Error::custom(format!("invalid duration '{raw}': {e}")))
}
