//! Bus transport abstraction.
//!
//! The exporter only needs two things from the KNX side: a filtered stream of
//! group events and a way to ask a group address for its current value.
//! [`BusTransport`] captures both so the orchestration can run against the
//! zenoh gateway in production and an in-memory bus in tests.

use async_trait::async_trait;
use knxmetrics_common::{EventKind, GroupAddress};
use thiserror::Error;

/// A decoded group event as seen by the dispatcher.
///
/// The address is kept as the bus reported it. Addresses in valid 3-level
/// notation are normalized so they compare equal to configured ones; anything
/// else is carried through verbatim and simply never resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEvent {
    pub group_address: String,
    pub kind: EventKind,
    pub data: Vec<u8>,
}

impl BusEvent {
    pub fn new(group_address: impl Into<String>, kind: EventKind, data: Vec<u8>) -> Self {
        Self {
            group_address: normalize_address(group_address.into()),
            kind,
            data,
        }
    }
}

/// Canonical form of a bus address string.
pub fn normalize_address(address: String) -> String {
    match address.parse::<GroupAddress>() {
        Ok(parsed) => parsed.to_string(),
        Err(_) => address,
    }
}

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("subscription failed: {0}")]
    Subscribe(String),

    #[error("read request for {address} failed: {message}")]
    Read {
        address: GroupAddress,
        message: String,
    },

    #[error("event stream failed: {0}")]
    Stream(String),

    #[error("operation cancelled")]
    Cancelled,
}


/// Live, filtered sequence of bus events.
#[async_trait]
pub trait EventStream: Send {
    /// Next event. `None` means the stream ended.
    ///
    /// Must be cancel-safe: dropping the future loses no event.
    async fn recv(&mut self) -> Option<Result<BusEvent, TransportError>>;

    /// Release the subscription. Calling it more than once is harmless.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Connection to a KNX bus.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Subscribe to events for `addresses` whose kind is in `kinds`.
    async fn subscribe(
        &self,
        addresses: &[GroupAddress],
        kinds: &[EventKind],
    ) -> Result<Box<dyn EventStream>, TransportError>;

    /// Ask the device owning `address` to report its value. The answer
    /// arrives later as a `Response` event on any open stream.
    async fn request_read(&self, address: &GroupAddress) -> Result<(), TransportError>;
}
