//! Routes bus events to gauges.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::dpt::{self, DecodeError};
use crate::error::Result;
use crate::mapping::MappingTable;
use crate::metrics::EventCounters;
use crate::transport::BusEvent;

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispatchOutcome {
    /// Kind carries no value (e.g. a read request).
    Ignored,
    /// No mapping for the group address.
    UnknownAddress,
    /// Datapoint type unknown or payload malformed.
    Undecodable,
    /// The gauge was set to this value.
    Recorded(f64),
}

/// Snapshot of dispatch counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub ignored: u64,
    pub unknown_address: u64,
    pub undecodable: u64,
    pub recorded: u64,
}

impl DispatchStats {
    pub fn total(&self) -> u64 {
        self.ignored + self.unknown_address + self.undecodable + self.recorded
    }
}

/// Decodes events against the mapping table and records the result.
///
/// Stateless apart from the gauges and counters it writes to, so one
/// dispatcher may be shared by any number of tasks.
#[derive(Debug)]
pub struct Dispatcher {
    table: Arc<MappingTable>,
    counters: EventCounters,
}

impl Dispatcher {
    pub fn new(table: Arc<MappingTable>, counters: EventCounters) -> Self {
        Self { table, counters }
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    /// Handle one event.
    ///
    /// Unknown addresses and undecodable payloads are logged and reported in
    /// the outcome; neither is an error. An `Err` aborts the subscription.
    pub fn dispatch(&self, event: &BusEvent) -> Result<DispatchOutcome> {
        if !event.kind.carries_value() {
            self.counters.ignored.inc();
            return Ok(DispatchOutcome::Ignored);
        }

        let Some(mapping) = self.table.resolve(&event.group_address) else {
            warn!(
                group_address = %event.group_address,
                event = %event.kind,
                "Unknown group address"
            );
            self.counters.unknown_address.inc();
            return Ok(DispatchOutcome::UnknownAddress);
        };

        trace!(
            group_address = %event.group_address,
            event = %event.kind,
            metric = %mapping.metric_name(),
            bytes = event.data.len(),
            "Received event"
        );

        let outcome = match dpt::decode(mapping.decoder_kind(), &event.data) {
            Ok(value) => {
                mapping.record(value);
                self.counters.recorded.inc();
                DispatchOutcome::Recorded(value)
            }
            Err(DecodeError::UnknownKind(kind)) => {
                warn!(
                    group_address = %event.group_address,
                    metric = %mapping.metric_name(),
                    metric_type = kind,
                    "Unknown datapoint type"
                );
                self.counters.undecodable.inc();
                DispatchOutcome::Undecodable
            }
            Err(e) => {
                warn!(
                    group_address = %event.group_address,
                    metric = %mapping.metric_name(),
                    error = %e,
                    previous = ?mapping.value(),
                    "Failed to decode payload, keeping previous value"
                );
                self.counters.undecodable.inc();
                DispatchOutcome::Undecodable
            }
        };
        Ok(outcome)
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            ignored: self.counters.ignored.get(),
            unknown_address: self.counters.unknown_address.get(),
            undecodable: self.counters.undecodable.get(),
            recorded: self.counters.recorded.get(),
        }
    }
}
