#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod session;

use args::Args;
use clap::Parser;
use murmur_client::MurmurClient;
use murmur_config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration, then apply command-line overrides
    let mut config = match args.config {
        Some(ref path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(model) = args.model {
        config.client.model = model;
    }
    if let Some(endpoint) = args.endpoint {
        config.client.endpoint = endpoint;
    }
    config.validate()?;

    let _telemetry_guard = murmur_telemetry::init(config.telemetry.as_ref(), "warn")?;

    let client = MurmurClient::from_config(&config.client)?;

    tracing::info!(
        endpoint = %client.endpoint(),
        model = client.active_model(),
        "murmur ready"
    );

    let stream = !args.no_stream;
    match args.prompt {
        Some(prompt) => session::ask(&client, &prompt, stream).await,
        None => session::interactive(client, stream).await,
    }
}
