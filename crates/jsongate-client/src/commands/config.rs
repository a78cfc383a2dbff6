//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the effective configuration to stdout.
pub fn dump(config: &ClientConfig, path: Option<&Path>) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::config(format!("failed to serialize config: {}", e)))?;
    let path = path.map_or_else(ClientConfig::default_path, Path::to_path_buf);
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);

    Ok(())
}

/// Show the configuration file path.
pub fn path(path: Option<&Path>) -> ClientResult<()> {
    let config_path = path.map_or_else(ClientConfig::default_path, Path::to_path_buf);
    let state = if config_path.exists() { "" } else { " (not found, using defaults)" };
    println!("config: {}{}", config_path.display(), state);
    Ok(())
}
