use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keyexpr::KEY_PREFIX;
use crate::serialization::Format;

/// Connection settings for the KNX gateway session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Zenoh mode: "client", "peer", or "router".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Endpoints to connect to (for client mode).
    #[serde(default)]
    pub connect: Vec<String>,

    /// Endpoints to listen on (for peer/router mode).
    #[serde(default)]
    pub listen: Vec<String>,

    /// Key expression prefix the gateway publishes bus events under.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Encoding used for outgoing read requests.
    #[serde(default)]
    pub format: Format,
}

fn default_mode() -> String {
    "peer".to_string()
}

fn default_key_prefix() -> String {
    KEY_PREFIX.to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            connect: Vec::new(),
            listen: Vec::new(),
            key_prefix: default_key_prefix(),
            format: Format::default(),
        }
    }
}

impl GatewayConfig {
    /// Validate the gateway settings.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.mode.as_str(), "client" | "peer" | "router") {
            return Err(Error::Config(format!(
                "Invalid gateway mode: '{}'. Expected 'client', 'peer', or 'router'",
                self.mode
            )));
        }
        if self.key_prefix.is_empty() {
            return Err(Error::Config("missing gateway.key_prefix".to_string()));
        }
        if self.key_prefix.contains(['*', '$', '?', '#']) {
            return Err(Error::KeyExpr(format!(
                "gateway.key_prefix must not contain wildcards: {}",
                self.key_prefix
            )));
        }
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Load a configuration from a JSON5 string.
pub fn parse_config<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        gateway: GatewayConfig,
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_parse_gateway_config() {
        let json5 = r#"
        {
            gateway: {
                mode: "client",
                connect: ["tcp/knx-gateway.local:7447"],
                key_prefix: "home/knx",
                format: "cbor",
            },
            logging: {
                level: "debug",
            },
        }
        "#;

        let config: TestConfig = parse_config(json5).unwrap();

        assert_eq!(config.gateway.mode, "client");
        assert_eq!(config.gateway.connect, vec!["tcp/knx-gateway.local:7447"]);
        assert_eq!(config.gateway.key_prefix, "home/knx");
        assert_eq!(config.gateway.format, Format::Cbor);
        assert_eq!(config.logging.level, "debug");
        assert!(config.gateway.validate().is_ok());
    }

    #[test]
    fn test_default_config() {
        let config: TestConfig = parse_config("{}").unwrap();

        assert_eq!(config.gateway.mode, "peer");
        assert!(config.gateway.connect.is_empty());
        assert_eq!(config.gateway.key_prefix, "knx");
        assert_eq!(config.gateway.format, Format::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_json_logging_format() {
        let json5 = r#"{ logging: { level: "debug", format: "json" } }"#;
        let config: TestConfig = parse_config(json5).unwrap();

        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_rejects_bad_mode() {
        let config = GatewayConfig {
            mode: "broker".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_wildcard_prefix() {
        let config = GatewayConfig {
            key_prefix: "knx/**".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::KeyExpr(_))));
    }

    #[test]
    fn test_gateway_config_is_hashable() {
        use std::collections::HashSet;

        let json = GatewayConfig::default();
        let cbor = GatewayConfig {
            format: Format::Cbor,
            ..GatewayConfig::default()
        };
        let set: HashSet<GatewayConfig> = [json.clone(), cbor, json].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
