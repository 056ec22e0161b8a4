use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a placeholder cannot be
    /// resolved, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if a placeholder cannot be resolved, TOML parsing
    /// fails, or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint, model, timeout or sampling options
    /// are out of range
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_client()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_client(&self) -> anyhow::Result<()> {
        let client = &self.client;

        if !matches!(client.endpoint.scheme(), "http" | "https") {
            anyhow::bail!("client.endpoint must use http or https, got '{}'", client.endpoint.scheme());
        }

        if client.model.trim().is_empty() {
            anyhow::bail!("client.model must not be empty");
        }

        if client.timeout.is_zero() {
            anyhow::bail!("client.timeout must be greater than 0");
        }

        if let Some(ref options) = client.options {
            if let Some(temperature) = options.temperature
                && !(0.0..=2.0).contains(&temperature)
            {
                anyhow::bail!("client.options.temperature must be between 0.0 and 2.0");
            }

            if let Some(top_p) = options.top_p
                && !(0.0..=1.0).contains(&top_p)
            {
                anyhow::bail!("client.options.top_p must be between 0.0 and 1.0");
            }
        }

        Ok(())
    }

    fn validate_telemetry(&self) -> anyhow::Result<()> {
        let Some(ref telemetry) = self.telemetry else {
            return Ok(());
        };

        if telemetry.service_name.trim().is_empty() {
            anyhow::bail!("telemetry.service_name must not be empty");
        }

        Ok(())
    }
}
