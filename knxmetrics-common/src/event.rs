use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of a group telegram observed on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// GroupValueRead: someone asks for the current value.
    Read,
    /// GroupValueResponse: answer to a read.
    Response,
    /// GroupValueWrite: a device announces or sets a new value.
    Write,
    /// Anything the gateway reports that is none of the above.
    #[serde(other)]
    Other,
}

impl EventKind {
    /// Kinds that carry a value worth recording.
    pub const VALUE_KINDS: [EventKind; 2] = [EventKind::Response, EventKind::Write];

    /// Get the string representation used in key expressions.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Read => "read",
            EventKind::Response => "response",
            EventKind::Write => "write",
            EventKind::Other => "other",
        }
    }

    /// Whether this kind carries a value (response or write).
    pub fn carries_value(&self) -> bool {
        matches!(self, EventKind::Response | EventKind::Write)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "read" => EventKind::Read,
            "response" => EventKind::Response,
            "write" => EventKind::Write,
            _ => EventKind::Other,
        })
    }
}

/// A group telegram as exchanged with the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEvent {
    /// Group address in 3-level notation (e.g. "1/2/3").
    pub group_address: String,

    /// Telegram kind.
    pub event: EventKind,

    /// Raw APDU data bytes.
    #[serde(default)]
    pub data: Vec<u8>,

    /// Unix epoch milliseconds when the gateway saw the telegram.
    #[serde(default)]
    pub timestamp: i64,
}

impl GroupEvent {
    /// Create a new event stamped with the current time.
    pub fn new(group_address: impl Into<String>, event: EventKind, data: Vec<u8>) -> Self {
        Self {
            group_address: group_address.into(),
            event,
            data,
            timestamp: current_timestamp_millis(),
        }
    }

    /// Create a read request for a group address.
    pub fn read_request(group_address: impl Into<String>) -> Self {
        Self::new(group_address, EventKind::Read, Vec::new())
    }
}

/// Get the current Unix timestamp in milliseconds.
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
