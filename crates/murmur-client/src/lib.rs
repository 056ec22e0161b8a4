#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Streaming client for Ollama-compatible generation servers
//!
//! Sends prompts to `POST /api/generate`, reassembles the newline-delimited
//! JSON response from arbitrarily split network reads, and yields decoded
//! records as they arrive. The server's continuation token is carried from
//! each response into the next request so a conversation survives across
//! independent HTTP calls.
//!
//! ```no_run
//! use futures::StreamExt;
//! use murmur_client::MurmurClient;
//!
//! # async fn run() -> murmur_client::Result<()> {
//! let client = MurmurClient::new("http://localhost:11434")?.with_model("llama3.2");
//!
//! let mut stream = client.generate_streaming_response("Why is the sky blue?").await?;
//! while let Some(record) = stream.next().await {
//!     print!("{}", record?.response);
//! }
//!
//! // Follow-up questions see the earlier answer
//! let _summary = client.get_response("Summarize that in five words").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod context;
pub mod decode;
pub mod error;
pub mod lines;
mod stream;
mod transport;
pub mod types;

pub use client::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT, MurmurClient};
pub use context::ConversationContext;
pub use error::{ClientError, DecodeError, Result, TransportError};
pub use stream::{GenerationStream, StreamPhase};
pub use transport::ChunkStream;
pub use types::*;
