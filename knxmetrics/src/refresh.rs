//! Startup refresh: ask every mapped group address for its current value.

use std::sync::Arc;

use knxmetrics_common::GroupAddress;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Result, ServerError};
use crate::transport::{BusTransport, TransportError};

/// One-shot read requests for all mapped addresses.
///
/// Responses come back through the subscription loop like any other event.
pub struct StartupRefresh {
    transport: Arc<dyn BusTransport>,
    addresses: Vec<GroupAddress>,
}

impl StartupRefresh {
    pub fn new(transport: Arc<dyn BusTransport>, addresses: Vec<GroupAddress>) -> Self {
        Self {
            transport,
            addresses,
        }
    }

    /// Issue one read per address, in order. The first failed request fails
    /// the refresh; cancellation stops it early.
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        for address in &self.addresses {
            let result = tokio::select! {
                _ = token.cancelled() => Err(TransportError::Cancelled),
                result = self.transport.request_read(address) => result,
            };

            result.map_err(|source| ServerError::Refresh {
                address: *address,
                source,
            })?;
            debug!(group_address = %address, "Requested current value");
        }

        info!(addresses = self.addresses.len(), "Startup refresh requested");
        Ok(())
    }
}
