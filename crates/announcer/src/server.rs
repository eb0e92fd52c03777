//! Daemon wiring: transport, client, announcer, and shutdown handling.

use crate::announcer::Announcer;
use crate::config::Config;
use herald_agent::{AgentClient, HttpTransport};
use herald_common::{Error, Result};
use std::sync::Arc;
use tracing::info;

/// The announcer daemon.
pub struct AnnounceServer {
    config: Config,
}

impl AnnounceServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the daemon: announce every configured service, then keep the
    /// heartbeats alive until interrupted, deregistering on the way out.
    pub async fn run(self) -> Result<()> {
        info!("Starting announce server");

        // Startup requires a working HTTP transport; without one the
        // daemon cannot do anything and exits fatally.
        let transport = HttpTransport::with_timeouts(
            self.config.agent.request_timeout,
            self.config.agent.connect_timeout,
        )
        .map_err(Error::transport)?;

        let client = Arc::new(AgentClient::new(
            self.config.agent.endpoint.clone(),
            self.config.agent.token.clone(),
            Arc::new(transport),
        ));
        let announcer = Announcer::new(client);

        for settings in &self.config.services {
            announcer
                .register(settings.to_service())
                .await
                .map_err(Error::announce)?;
        }
        info!(count = self.config.services.len(), "All services announced");

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");

        announcer.shutdown().await;
        Ok(())
    }
}
