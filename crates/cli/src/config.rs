//! CLI configuration utilities

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use warden_http::ClientConfig;

/// Environment variable overriding the default data directory
pub const STATE_DIR_ENV: &str = "WARDEN_STATE_DIR";

/// Load client configuration from an explicit file or the default locations
pub fn load(path: Option<&Path>) -> Result<ClientConfig> {
    match path {
        Some(path) => ClientConfig::load_from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => ClientConfig::load().context("failed to load configuration"),
    }
}

/// Pick the data directory: command line, then config file, then
/// `WARDEN_STATE_DIR`, then the platform data directory
pub fn resolve_data_dir(cli: Option<PathBuf>, config: &ClientConfig) -> PathBuf {
    cli.or_else(|| config.data_dir.clone()).unwrap_or_else(|| {
        // Check environment variable first, then fall back to system data dir
        if let Ok(dir) = std::env::var(STATE_DIR_ENV) {
            PathBuf::from(dir)
        } else {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("warden")
        }
    })
}
