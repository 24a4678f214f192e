//! Lifecycle orchestration.
//!
//! [`Server::run`] starts the subscription loop, the HTTP endpoint and the
//! startup refresh as one task group sharing a cancellation token. The first
//! task to fail cancels the others; the run returns once all three are done.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::ExporterConfig;
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::error::{Result, ServerError};
use crate::http::HttpServer;
use crate::mapping::MappingTable;
use crate::metrics::{MetricRegistry, SharedRegistry};
use crate::refresh::StartupRefresh;
use crate::subscriber::SubscriptionLoop;
use crate::transport::BusTransport;

type TaskResult = (&'static str, Result<()>);

/// The exporter: mapping table, gauges and the tasks that feed and serve them.
pub struct Server {
    config: ExporterConfig,
    transport: Arc<dyn BusTransport>,
    registry: SharedRegistry,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    /// Validate `config` and bind every mapping to its gauge.
    pub fn new(config: ExporterConfig, transport: Arc<dyn BusTransport>) -> Result<Self> {
        config.validate()?;

        let mut registry = MetricRegistry::new();
        let table = MappingTable::build(&config.mappings, &mut registry)?;
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(table), registry.event_counters()));

        info!(
            mappings = config.mappings.len(),
            gauges = registry.gauge_count(),
            "Mapping table ready"
        );

        Ok(Self {
            config,
            transport,
            registry: Arc::new(registry),
            dispatcher,
        })
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Run until `shutdown` is cancelled or a task fails.
    ///
    /// Cancellation is a clean exit. Any other task failure cancels the
    /// remaining tasks and is returned once they have stopped.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let token = shutdown.child_token();
        let mut tasks: JoinSet<TaskResult> = JoinSet::new();

        let subscription = SubscriptionLoop::new(self.transport.clone(), self.dispatcher.clone());
        let subscription_token = token.clone();
        tasks.spawn(async move { ("subscription", subscription.run(subscription_token).await) });

        let http = HttpServer::new(self.config.server.clone(), self.registry.clone());
        let http_token = token.clone();
        tasks.spawn(async move { ("http", http.run(http_token).await) });

        let refresh = StartupRefresh::new(
            self.transport.clone(),
            self.dispatcher.table().addresses(),
        );
        let refresh_token = token.clone();
        tasks.spawn(async move { ("refresh", refresh.run(refresh_token).await) });

        info!("knxmetrics started");

        let mut failure: Option<ServerError> = None;
        while let Some(joined) = tasks.join_next().await {
            let (task, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => ("unknown", Err(ServerError::TaskPanicked(e.to_string()))),
            };

            match result {
                Ok(()) => debug!(task, "Task finished"),
                Err(e) if e.is_cancelled() => debug!(task, "Task cancelled"),
                Err(e) => {
                    error!(task, error = %e, "Task failed, shutting down");
                    token.cancel();
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }

        info!("Server stopped");
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
