//! Subscription loop: feeds bus events into the dispatcher.

use std::sync::Arc;

use knxmetrics_common::EventKind;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{Result, ServerError};
use crate::transport::{BusTransport, EventStream};

/// Subscribes to every mapped group address and dispatches incoming
/// `response`/`write` events until cancelled or the transport fails.
pub struct SubscriptionLoop {
    transport: Arc<dyn BusTransport>,
    dispatcher: Arc<Dispatcher>,
}

impl SubscriptionLoop {
    pub fn new(transport: Arc<dyn BusTransport>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            transport,
            dispatcher,
        }
    }

    /// Run until `token` is cancelled (returns `Ok`) or the transport fails.
    ///
    /// The stream is closed on every exit path once it has been opened.
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        let addresses = self.dispatcher.table().addresses();
        debug!(addresses = addresses.len(), "Subscribing to group addresses");

        let mut stream = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            result = self.transport.subscribe(&addresses, &EventKind::VALUE_KINDS) => result?,
        };
        info!(addresses = addresses.len(), "Subscribed to KNX bus");

        let result = self.stream(stream.as_mut(), &token).await;

        if let Err(e) = stream.close().await {
            debug!(error = %e, "Failed to close event stream");
        }
        debug!("Subscription closed");

        result
    }

    async fn stream(&self, stream: &mut dyn EventStream, token: &CancellationToken) -> Result<()> {
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                next = stream.recv() => next,
            };

            match next {
                Some(Ok(event)) => {
                    self.dispatcher.dispatch(&event)?;
                }
                Some(Err(_)) if token.is_cancelled() => return Ok(()),
                Some(Err(e)) => return Err(ServerError::Transport(e)),
                None => {
                    if !token.is_cancelled() {
                        warn!("Event stream ended");
                    }
                    return Ok(());
                }
            }
        }
    }
}
