use std::path::PathBuf;

use clap::Parser;
use url::Url;

/// Chat with a local LLM server
#[derive(Debug, Parser)]
#[command(name = "murmur", about = "Stream answers from an Ollama-compatible server")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "MURMUR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured model
    #[arg(short, long, env = "MURMUR_MODEL")]
    pub model: Option<String>,

    /// Override the server endpoint
    #[arg(long, env = "MURMUR_ENDPOINT")]
    pub endpoint: Option<Url>,

    /// Wait for the complete answer instead of streaming it
    #[arg(long)]
    pub no_stream: bool,

    /// Prompt to send; starts an interactive session when omitted
    pub prompt: Option<String>,
}
