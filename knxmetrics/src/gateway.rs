//! [`BusTransport`] over a zenoh-connected KNX gateway.
//!
//! The gateway publishes every group telegram under
//! `<prefix>/<main>/<middle>/<sub>/<event>` and listens for read requests on
//! `<prefix>/<main>/<middle>/<sub>/read`.

use std::collections::HashSet;

use async_trait::async_trait;
use knxmetrics_common::{
    EventKind, Format, GroupAddress, GroupEvent, KeyExprBuilder, decode_auto, encode,
};
use zenoh::Session;
use zenoh::handlers::FifoChannelHandler;
use zenoh::pubsub::Subscriber;
use zenoh::sample::{Sample, SampleKind};

use crate::transport::{BusEvent, BusTransport, EventStream, TransportError};

/// Gateway transport backed by a zenoh session.
#[derive(Clone)]
pub struct ZenohTransport {
    session: Session,
    keys: KeyExprBuilder,
    format: Format,
}

impl ZenohTransport {
    /// `format` is used for outgoing read requests; incoming events are
    /// auto-detected.
    pub fn new(session: Session, key_prefix: &str, format: Format) -> Self {
        Self {
            session,
            keys: KeyExprBuilder::new(key_prefix),
            format,
        }
    }
}

#[async_trait]
impl BusTransport for ZenohTransport {
    async fn subscribe(
        &self,
        addresses: &[GroupAddress],
        kinds: &[EventKind],
    ) -> Result<Box<dyn EventStream>, TransportError> {
        let key_expr = self.keys.all_events_wildcard();
        let subscriber = self
            .session
            .declare_subscriber(&key_expr)
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;

        tracing::debug!(key_expr = %key_expr, "Declared gateway subscriber");

        Ok(Box::new(GatewayStream {
            subscriber: Some(subscriber),
            keys: self.keys.clone(),
            addresses: addresses.iter().copied().collect(),
            kinds: kinds.to_vec(),
        }))
    }

    async fn request_read(&self, address: &GroupAddress) -> Result<(), TransportError> {
        let read_error = |message: String| TransportError::Read {
            address: *address,
            message,
        };

        let request = GroupEvent::read_request(address.to_string());
        let payload = encode(&request, self.format).map_err(|e| read_error(e.to_string()))?;

        self.session
            .put(self.keys.read_key(address), payload)
            .await
            .map_err(|e| read_error(e.to_string()))
    }
}

/// Subscriber filtered to a set of group addresses and event kinds.
///
/// Keys whose address is not valid 3-level notation cannot be matched
/// against the subscribed set and are passed through, so the dispatcher
/// reports them as unknown.
struct GatewayStream {
    subscriber: Option<Subscriber<FifoChannelHandler<Sample>>>,
    keys: KeyExprBuilder,
    addresses: HashSet<GroupAddress>,
    kinds: Vec<EventKind>,
}

impl GatewayStream {
    /// Turn a sample into a bus event, or `None` if it is filtered out.
    fn accept(&self, sample: &Sample) -> Option<BusEvent> {
        if sample.kind() == SampleKind::Delete {
            return None;
        }

        let key = sample.key_expr().as_str();
        let Some((address, kind)) = self.keys.split(key) else {
            tracing::trace!(key = %key, "Ignoring sample with unexpected key");
            return None;
        };
        if !self.kinds.contains(&kind) {
            return None;
        }
        if address
            .parse::<GroupAddress>()
            .is_ok_and(|parsed| !self.addresses.contains(&parsed))
        {
            return None;
        }

        let payload = sample.payload().to_bytes();
        match decode_auto::<GroupEvent>(&payload) {
            Ok(event) => Some(BusEvent::new(address, kind, event.data)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to decode group event");
                None
            }
        }
    }
}

#[async_trait]
impl EventStream for GatewayStream {
    async fn recv(&mut self) -> Option<Result<BusEvent, TransportError>> {
        loop {
            let sample = match self.subscriber.as_ref()?.recv_async().await {
                Ok(sample) => sample,
                Err(e) => return Some(Err(TransportError::Stream(e.to_string()))),
            };

            if let Some(event) = self.accept(&sample) {
                return Some(Ok(event));
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(subscriber) = self.subscriber.take() {
            subscriber
                .undeclare()
                .await
                .map_err(|e| TransportError::Stream(e.to_string()))?;
            tracing::debug!("Undeclared gateway subscriber");
        }
        Ok(())
    }
}
