//! Configuration management for Windowguard.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! `WINDOWGUARD_`-prefixed environment variables (`__` separates nested keys,
//! e.g. `WINDOWGUARD_RATE_LIMITING__LIMIT=10`).

use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

use crate::error::{Result, WindowGuardError};
use crate::ratelimit::Quota;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "WINDOWGUARD";

/// Main configuration for the Windowguard service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowGuardConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Use the first `X-Forwarded-For` entry as the caller identity
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Body returned to allowed requests
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            trust_forwarded_for: false,
            greeting: default_greeting(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3001))
}

fn default_greeting() -> String {
    "Hello, World!".to_string()
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Requests allowed per window
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Window length in milliseconds
    #[serde(default = "default_window_size_ms")]
    pub window_size_ms: u64,

    /// How often expired windows are evicted, in seconds (0 disables)
    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_size_ms: default_window_size_ms(),
            eviction_interval_secs: default_eviction_interval(),
        }
    }
}

fn default_limit() -> u64 {
    5
}

fn default_window_size_ms() -> u64 {
    60_000
}

fn default_eviction_interval() -> u64 {
    60
}

impl RateLimitingConfig {
    /// Build the validated quota described by this configuration.
    pub fn quota(&self) -> Result<Quota> {
        Quota::new(self.limit, self.window_size_ms)
    }
}

impl WindowGuardConfig {
    /// Load configuration from an optional YAML file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }

        Self::build(builder.add_source(environment()))
    }

    /// Load configuration from a YAML string, ignoring the environment.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::build(Config::builder().add_source(File::from_str(yaml, FileFormat::Yaml)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: WindowGuardConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot start with.
    pub fn validate(&self) -> Result<()> {
        self.rate_limiting.quota().map(|_| ()).map_err(|e| match e {
            WindowGuardError::Config(msg) => {
                WindowGuardError::Config(format!("rate_limiting: {}", msg))
            }
            other => other,
        })
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
