//! Configuration helpers: validate a file or print the defaults.

use std::path::Path;

use anyhow::{bail, Result};
use chatglass_core::OverlayConfig;

/// Loads and validates a configuration file, printing the fully resolved
/// settings (file values plus environment overrides) on success.
pub fn check(path: Option<&Path>) -> Result<()> {
    let config = OverlayConfig::load(path)?;
    tracing::info!(channel = %config.channel, "configuration OK");
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Prints a default configuration in the requested format.
pub fn generate(format: &str) -> Result<()> {
    let config = OverlayConfig::default();
    match format {
        "toml" => print!("{}", toml::to_string_pretty(&config)?),
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        other => bail!("unsupported format {other:?}; use toml or json"),
    }
    Ok(())
}
