//! Listener and store settings: environment variables, the `--graceful-timeout` flag, CORS.

mod duration;

pub use duration::parse_duration;

use crate::error::ConfigError;
use axum::http::Method;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Cross-origin policy applied to every route.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CorsPolicy {
    #[default]
    Disabled,
    /// Any origin; preflight requests are answered directly.
    Permissive,
    /// A fixed origin with explicit methods and headers. Empty lists allow nothing extra.
    Configured {
        origin: String,
        methods: Vec<Method>,
        headers: Vec<String>,
    },
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How long in-flight requests may run after shutdown begins.
    pub graceful_timeout: Duration,
    /// Upper bound for reading a request and producing its response.
    pub request_timeout: Duration,
    pub log_requests: bool,
    pub cors: CorsPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            graceful_timeout: DEFAULT_GRACEFUL_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            log_requests: true,
            cors: CorsPolicy::Disabled,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `HOST` and `PORT`. Empty values count as unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = ServerConfig::default();
        if let Some(host) = lookup("HOST").filter(|s| !s.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = lookup("PORT").filter(|s| !s.trim().is_empty()) {
            config.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: "PORT",
                value: port.clone(),
            })?;
        }
        Ok(config)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Command-line flags understood by the listener.
#[derive(Clone, Debug, clap::Args)]
pub struct ListenerArgs {
    /// The duration for which the server gracefully waits for existing connections to finish, e.g. 15s or 1m
    #[arg(long = "graceful-timeout", default_value = "15s", value_parser = parse_duration)]
    pub graceful_timeout: Duration,
}

impl ListenerArgs {
    pub fn apply(&self, config: &mut ServerConfig) {
        config.graceful_timeout = self.graceful_timeout;
    }
}

/// Which persistence backend to open at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Postgres,
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreKind::Memory),
            "postgres" | "postgresql" | "pg" => Ok(StoreKind::Postgres),
            _ => Err(ConfigError::UnsupportedStore(s.to_string())),
        }
    }
}
