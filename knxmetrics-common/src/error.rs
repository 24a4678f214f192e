use thiserror::Error;

/// Common error type for knxmetrics components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CBOR serialization error: {0}")]
    Cbor(String),

    #[error("Invalid group address '{address}': {reason}")]
    GroupAddress { address: String, reason: String },

    #[error("Invalid key expression: {0}")]
    KeyExpr(String),
}

impl Error {
    /// Create a group address error.
    pub fn group_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GroupAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::Cbor(e.to_string())
    }
}

/// Result type alias using the common [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
