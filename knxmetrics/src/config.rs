//! Configuration for the KNX metrics exporter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use knxmetrics_common::{GatewayConfig, GroupAddress, LoggingConfig};

use crate::metrics::is_reserved_metric_name;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// KNX gateway connection settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// HTTP metrics endpoint settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Group address to metric mappings.
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to listen on (default: "127.0.0.1").
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on (default: 8080).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path for the metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Log every HTTP request.
    #[serde(default, alias = "logRequests")]
    pub log_requests: bool,

    /// Static secret authentication.
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
            log_requests: false,
            auth: AuthConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding.
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Override host and port from a `host:port` string.
    pub fn set_listen_addr(&mut self, listen: &str) -> Result<(), ConfigError> {
        let (host, port) = listen
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::validation(format!("Invalid listen address: {listen}")))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| ConfigError::validation(format!("Invalid listen port: {listen}")))?;

        self.host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        self.port = port;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::validation("missing server.host"));
        }
        if self.port == 0 {
            return Err(ConfigError::validation("missing server.port"));
        }
        if self.path.is_empty() {
            return Err(ConfigError::validation("missing server.path"));
        }
        self.auth.validate()
    }
}

/// Static shared-secret authentication for the metrics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Require the secret on every metrics request.
    #[serde(default)]
    pub enabled: bool,

    /// Header carrying the secret (default: "Authorization").
    #[serde(default = "default_auth_header")]
    pub header: String,

    /// Scheme prefix stripped from the header value (default: "Bearer").
    #[serde(default = "default_auth_scheme")]
    pub scheme: String,

    /// The shared secret.
    #[serde(default, alias = "secretKey")]
    pub secret_key: String,
}

fn default_auth_header() -> String {
    "Authorization".to_string()
}

fn default_auth_scheme() -> String {
    "Bearer".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            header: default_auth_header(),
            scheme: default_auth_scheme(),
            secret_key: String::new(),
        }
    }
}

impl AuthConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.header.is_empty() {
            return Err(ConfigError::validation("missing server.auth.header"));
        }
        if self.secret_key.is_empty() {
            return Err(ConfigError::validation("missing server.auth.secret_key"));
        }
        Ok(())
    }
}

/// One group address to metric binding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingConfig {
    /// KNX group address, e.g. "1/2/3".
    #[serde(default, alias = "knxGroupAddress")]
    pub group_address: String,

    /// Gauge name.
    #[serde(default, alias = "metricName")]
    pub metric_name: String,

    /// Gauge help text.
    #[serde(default, alias = "metricDescription")]
    pub metric_description: String,

    /// Datapoint type code used to decode payloads (e.g. 1001, 9001).
    #[serde(default, alias = "metricType")]
    pub metric_type: u32,

    /// Constant labels attached to the gauge series.
    #[serde(default, alias = "metricAttributes")]
    pub metric_labels: Vec<MetricLabel>,
}

impl MappingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.metric_name.is_empty() {
            return Err(ConfigError::validation("missing metric_name"));
        }
        if is_reserved_metric_name(&self.metric_name) {
            return Err(ConfigError::validation(format!(
                "metric_name '{}' is reserved",
                self.metric_name
            )));
        }
        if self.metric_type == 0 {
            return Err(ConfigError::validation("missing metric_type"));
        }
        if self.group_address.is_empty() {
            return Err(ConfigError::validation("missing group_address"));
        }
        if let Err(e) = self.group_address.parse::<GroupAddress>() {
            return Err(ConfigError::validation(e.to_string()));
        }
        Ok(())
    }
}

/// A constant label name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricLabel {
    pub name: String,
    pub value: String,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gateway
            .validate()
            .map_err(|e| ConfigError::validation(e.to_string()))?;
        self.server.validate()?;
        validate_mappings(&self.mappings)
    }
}

/// Check that `mappings` is non-empty and every entry is complete.
pub fn validate_mappings(mappings: &[MappingConfig]) -> Result<(), ConfigError> {
    if mappings.is_empty() {
        return Err(ConfigError::validation("missing mappings"));
    }
    for (i, mapping) in mappings.iter().enumerate() {
        mapping.validate().map_err(|e| match e {
            ConfigError::Validation(msg) => ConfigError::Validation(format!(
                "mapping {} ({}): {}",
                i, mapping.metric_name, msg
            )),
            other => other,
        })?;
    }
    Ok(())
}
