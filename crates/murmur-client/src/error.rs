use std::string::FromUtf8Error;
use std::time::Duration;

/// Client-specific result type
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors from the murmur client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request or the response body failed in transit
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A response body could not be turned into a record
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The server does not have the requested model installed
    #[error("model '{0}' not found on server")]
    ModelNotFound(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether repeating the same call may succeed
    ///
    /// The client never retries on its own; this only classifies failures
    /// for callers that do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Decode(_) | Self::ModelNotFound(_) | Self::Config(_) => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(TransportError::Http(e))
    }
}

/// Connection, timeout, and status failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection refused, reset, or closed mid-body
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-2xx status
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error message from the body, or the raw body
        message: String,
    },

    /// No response, or no body chunk, arrived within the call timeout
    #[error("no data received within {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// HTTP status code, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Timeout(_) => None,
        }
    }

    /// Whether the call ran out of time
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(e) => e.is_timeout(),
            Self::Status { .. } => false,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_body(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// A line or body that is not a valid response record
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Malformed JSON or a field of the wrong shape
    #[error("malformed record: {source}")]
    Json {
        /// Underlying parse failure
        source: serde_json::Error,
        /// Leading portion of the offending text
        excerpt: String,
    },

    /// Line bytes are not UTF-8
    #[error("record is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    /// The server put an `error` field where a record belongs
    #[error("server reported an error: {0}")]
    Server(String),
}

impl DecodeError {
    const EXCERPT_CHARS: usize = 120;

    pub(crate) fn json(source: serde_json::Error, text: &str) -> Self {
        Self::Json {
            source,
            excerpt: text.chars().take(Self::EXCERPT_CHARS).collect(),
        }
    }
}
