use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub account: AccountConfig,
    pub live: LiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Platform account used when opening chat connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Numeric account id placed in the auth frame. 0 falls back to the id
    /// returned by the gateway resolver.
    pub uid: u64,
    /// Device fingerprint sent during auth.
    pub buvid: String,
    /// Session cookie forwarded to the gateway resolver.
    pub cookie: Option<String>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            uid: 0,
            buvid: String::new(),
            cookie: None,
        }
    }
}

/// Live-chat client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Platform API domain queried for gateway endpoints.
    pub api_domain: String,
    pub heartbeat_interval_secs: u64,
    pub reconnect_delay_secs: u64,
    /// Rooms to start watching at boot.
    pub rooms: Vec<u64>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            api_domain: "https://api.live.bilibili.com".to_string(),
            heartbeat_interval_secs: 10,
            reconnect_delay_secs: 5,
            rooms: Vec::new(),
        }
    }
}

impl Config {
    fn load(file_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = file_path {
            builder = builder.add_source(File::with_name(path));
        }

        // DANMUTV_SERVER_HOST and friends override file values.
        builder = builder.add_source(
            Environment::with_prefix("DANMUTV")
                .separator("_")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Environment variables only, for containerized deployments.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Bind address for the HTTP API.
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Validate configuration, returning every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if self.live.heartbeat_interval_secs == 0 {
            errors.push("live.heartbeat_interval_secs must be non-zero".to_string());
        }
        if !self.live.api_domain.starts_with("http") {
            errors.push(format!(
                "live.api_domain must be an http(s) URL, got {:?}",
                self.live.api_domain
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
