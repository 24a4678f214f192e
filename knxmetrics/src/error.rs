//! Exporter error types.

use knxmetrics_common::GroupAddress;
use thiserror::Error;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Errors that stop the exporter.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("startup refresh of {address} failed: {source}")]
    Refresh {
        address: GroupAddress,
        #[source]
        source: TransportError,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Http(std::io::Error),

    #[error("task failed to complete: {0}")]
    TaskPanicked(String),
}

impl ServerError {
    /// True when the error only reports that work was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ServerError::Transport(TransportError::Cancelled)
                | ServerError::Refresh {
                    source: TransportError::Cancelled,
                    ..
                }
        )
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
