//! Prometheus exporter for KNX group address values.
//!
//! This crate subscribes to group telegrams from a KNX gateway, decodes the
//! payload of every mapped group address according to its datapoint type and
//! exposes the latest values as gauges on an HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   KNX gateway   │────>│   Dispatcher    │────>│   HTTP Server   │
//! │  (knx/**)       │     │ (mapping + DPT) │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!          ^
//!          └──── startup refresh (read requests)
//! ```
//!
//! # Usage
//!
//! Run the exporter binary with a configuration file:
//!
//! ```bash
//! knxmetrics --config knxmetrics.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod dispatcher;
pub mod dpt;
pub mod error;
pub mod gateway;
pub mod http;
pub mod mapping;
pub mod metrics;
pub mod refresh;
pub mod server;
pub mod subscriber;
pub mod transport;

pub use config::{ExporterConfig, MappingConfig, MetricLabel};
pub use dispatcher::{DispatchOutcome, DispatchStats, Dispatcher};
pub use dpt::{DatapointType, DecodeError};
pub use error::{Result, ServerError};
pub use gateway::ZenohTransport;
pub use http::HttpServer;
pub use mapping::{Mapping, MappingTable};
pub use metrics::{MetricRegistry, SharedRegistry};
pub use refresh::StartupRefresh;
pub use server::Server;
pub use subscriber::SubscriptionLoop;
pub use transport::{BusEvent, BusTransport, EventStream, TransportError};
