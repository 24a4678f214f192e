//! knxmetrics common library
//!
//! Shared types and utilities for talking to a KNX gateway:
//!
//! - [`event`] - Bus event wire model (`GroupEvent`, `EventKind`)
//! - [`group_address`] - KNX 3-level group addresses
//! - [`keyexpr`] - Gateway key expression builders and parsers
//! - [`serialization`] - JSON/CBOR encoding and decoding
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`session`] - Gateway session management
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod event;
pub mod group_address;
pub mod keyexpr;
pub mod serialization;
pub mod session;

pub use config::{GatewayConfig, LogFormat, LoggingConfig, parse_config};
pub use error::{Error, Result};
pub use event::{EventKind, GroupEvent, current_timestamp_millis};
pub use group_address::GroupAddress;
pub use keyexpr::{KEY_PREFIX, KeyExprBuilder, ParsedKeyExpr};
pub use serialization::{Format, decode, decode_auto, encode};
pub use session::connect;

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// ```ignore
/// use knxmetrics_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
