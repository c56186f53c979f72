//! Config server

use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::catalog::{open_store, ConfigCatalog, ShardCacheRegistry};
use crate::chunk::{LogicalClock, ShardId};
use crate::common::{Config, Result};
use crate::coordinator::engine::EngineSettings;
use crate::coordinator::http::{create_router, ConfigState};
use crate::coordinator::service::DdlCoordinatorService;

const MAX_COMMAND_BYTES: usize = 16 * 1024 * 1024;

pub struct ConfigServer {
    config: Config,
}

impl ConfigServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Open the metadata store, wire up the catalog and the coordinator
    /// service, and resume coordinators left over from a previous run.
    pub fn build_state(config: &Config) -> Result<ConfigState> {
        let store = open_store(config)?;
        let catalog = Arc::new(ConfigCatalog::new(store.clone(), Arc::new(LogicalClock::new())));

        let shard_ids = config
            .shards
            .iter()
            .map(ShardId::new)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let shards = Arc::new(ShardCacheRegistry::new(shard_ids, catalog.clone(), store.clone()));

        let service = Arc::new(
            DdlCoordinatorService::new(
                store,
                catalog.clone(),
                shards.clone(),
                EngineSettings::from(&config.coordinator),
            )
            .with_default_timeout(config.coordinator.default_timeout()),
        );

        let resumed = service.resume()?;
        if !resumed.is_empty() {
            tracing::info!("Resumed {} coordinators", resumed.len());
        }

        Ok(ConfigState {
            node_id: config.node_id.clone(),
            catalog,
            shards,
            service,
        })
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!("Starting config server: {}", self.config.node_id);
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!(
            "  Storage: {:?} at {}",
            self.config.storage.backend,
            self.config.storage.path.display()
        );
        tracing::info!("  Shards: {}", self.config.shards.join(", "));

        let state = Self::build_state(&self.config)?;
        let service = state.service.clone();

        let router = create_router(state)
            .layer(RequestBodyLimitLayer::new(MAX_COMMAND_BYTES))
            .layer(TraceLayer::new_for_http());

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("✓ Config server ready");

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
                tracing::info!("Shutdown requested");
            })
            .await;

        service.shutdown().await;
        if let Err(e) = result {
            tracing::error!("HTTP server error: {}", e);
        }
        Ok(())
    }
}
