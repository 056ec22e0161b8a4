#![allow(clippy::must_use_candidate)]

//! Configuration for the murmur client
//!
//! Loaded from a TOML file with `{{ env.VAR }}` placeholder expansion

pub mod client;
mod env;
mod loader;
pub mod telemetry;

use serde::Deserialize;

pub use client::*;
pub use telemetry::{ExportProtocol, ExporterConfig, TelemetryConfig};

/// Top-level murmur configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Generation endpoint and request defaults
    #[serde(default)]
    pub client: ClientConfig,
    /// Logging and trace export
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
