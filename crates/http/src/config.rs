//! Client configuration
//!
//! Sources, later ones overriding earlier: built-in defaults, an optional
//! TOML file, then `WARDEN__*` environment variables (for example
//! `WARDEN__API_BASE_URL`, `WARDEN__SIMULATED__ACCESS_TTL_SECS`).

use crate::gateway::{BackendGateway, SimulatedGateway};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use warden_core::Result;

/// Top-level client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the real backend; absent or empty selects the simulated one
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User agent sent to the real backend
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Directory holding durable session state
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Simulated backend settings
    #[serde(default)]
    pub simulated: SimulatedConfig,
}

/// Simulated backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedConfig {
    #[serde(default = "default_login_latency")]
    pub login_latency_ms: u64,
    #[serde(default = "default_refresh_latency")]
    pub refresh_latency_ms: u64,
    #[serde(default = "default_call_latency")]
    pub call_latency_ms: u64,
    /// Access token lifetime (15 minutes)
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: i64,
    /// Refresh token lifetime (7 days)
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: i64,
}

impl SimulatedConfig {
    /// No artificial latency
    pub fn instant() -> Self {
        Self {
            login_latency_ms: 0,
            refresh_latency_ms: 0,
            call_latency_ms: 0,
            ..Self::default()
        }
    }
}

/// Which gateway a configuration selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMode {
    Simulated,
    Remote { base_url: String },
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("warden/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_login_latency() -> u64 {
    800
}

fn default_refresh_latency() -> u64 {
    500
}

fn default_call_latency() -> u64 {
    400
}

fn default_access_ttl() -> i64 {
    15 * 60
}

fn default_refresh_ttl() -> i64 {
    7 * 24 * 60 * 60
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            login_latency_ms: default_login_latency(),
            refresh_latency_ms: default_refresh_latency(),
            call_latency_ms: default_call_latency(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            data_dir: None,
            simulated: SimulatedConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&ClientConfig::default())?);

        // Try to find config files in common locations
        for path in ["warden.toml", "config/warden.toml"] {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("WARDEN")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Load configuration from a specific config file
    pub fn load_from_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&ClientConfig::default())?)
            .add_source(File::from(path.as_ref()))
            // Environment variables can override file settings
            .add_source(
                Environment::with_prefix("WARDEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// A configured, non-blank base URL selects the real backend
    pub fn backend_mode(&self) -> BackendMode {
        match self.api_base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => BackendMode::Remote {
                base_url: url.to_string(),
            },
            _ => BackendMode::Simulated,
        }
    }

    /// Construct the gateway this configuration selects
    pub fn build_gateway(&self) -> Result<Arc<dyn BackendGateway>> {
        match self.backend_mode() {
            BackendMode::Simulated => {
                info!("No API base URL configured, using simulated backend");
                Ok(Arc::new(SimulatedGateway::new(self.simulated.clone())))
            }
            #[cfg(feature = "remote")]
            BackendMode::Remote { base_url } => {
                info!(%base_url, "Using remote backend");
                let gateway = crate::gateway::RemoteGateway::builder()
                    .base_url(base_url)
                    .timeout(self.timeout())
                    .user_agent(self.user_agent.clone())
                    .build()?;
                Ok(Arc::new(gateway))
            }
            #[cfg(not(feature = "remote"))]
            BackendMode::Remote { base_url } => Err(warden_core::AuthError::Configuration(format!(
                "remote backend {base_url} requested but the `remote` feature is disabled"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use warden_core::AuthError;

    #[test]
    fn test_absent_url_is_simulated() {
        let config = ClientConfig::default();
        assert_eq!(config.backend_mode(), BackendMode::Simulated);
        assert_eq!(config.build_gateway().unwrap().kind(), "simulated");
    }

    #[test]
    fn test_blank_url_is_simulated() {
        let config = ClientConfig {
            api_base_url: Some("   ".to_string()),
            ..ClientConfig::default()
        };
        assert_eq!(config.backend_mode(), BackendMode::Simulated);
    }

    #[cfg(feature = "remote")]
    #[test]
    fn test_url_selects_remote() {
        let config = ClientConfig {
            api_base_url: Some("https://api.example.com".to_string()),
            ..ClientConfig::default()
        };
        assert_eq!(
            config.backend_mode(),
            BackendMode::Remote {
                base_url: "https://api.example.com".to_string()
            }
        );
        assert_eq!(config.build_gateway().unwrap().kind(), "remote");
    }

    #[cfg(feature = "remote")]
    #[test]
    fn test_invalid_url_is_configuration_error() {
        let config = ClientConfig {
            api_base_url: Some("not a url".to_string()),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.build_gateway(),
            Err(AuthError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "api_base_url = \"http://localhost:9000\"\ntimeout_secs = 3\n\n[simulated]\naccess_ttl_secs = 60"
        )
        .unwrap();

        let config = ClientConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.api_base_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.simulated.access_ttl_secs, 60);
        assert_eq!(config.simulated.refresh_latency_ms, 500);
    }
}
