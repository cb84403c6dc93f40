//! Factory functions for creating production-ready components
//!
//! Turns a loaded `GatewayConfig` into a running gateway: HTTP transport,
//! the configured response store and the pagination/enrichment policies.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::builders::GatewayBuilder;
use crate::catalog::{CatalogGateway, PostgresResponseStore};
use crate::config::{CacheBackend, GatewayConfig};
use crate::observability::{record_metric, MetricType};

/// Create a gateway from configuration
///
/// The Postgres backend connects and creates its table before returning.
pub async fn create_gateway(config: &GatewayConfig) -> Result<Arc<CatalogGateway>> {
    let mut builder = GatewayBuilder::new()
        .http_transport(
            &config.catalog.endpoint,
            &config.catalog.api_key,
            config.catalog.request_timeout,
        )?
        .provider(config.catalog.provider_id)
        .language(config.catalog.language.clone())
        .country(config.catalog.country.clone())
        .mock_mode(config.catalog.mock_mode)
        .ttl(config.cache.ttl)
        .max_entries(config.cache.max_entries)
        .pagination(config.pagination)
        .enrichment(config.enrichment);

    if config.cache.backend == CacheBackend::Postgres {
        let url = config
            .cache
            .database_url
            .as_deref()
            .context("postgres cache backend needs a database URL")?;
        let store = PostgresResponseStore::connect(url, config.cache.max_connections).await?;
        store.ensure_schema().await?;
        builder = builder.store(Arc::new(store));
        info!("using postgres response cache");
    }

    if config.catalog.mock_mode {
        info!("catalog mock mode enabled, upstream will not be called");
    } else if config.catalog.api_key.is_empty() {
        warn!("CATALOG_API_KEY is empty, upstream calls will be rejected");
    }

    Ok(Arc::new(builder.build()?))
}

/// Periodically drop expired cache entries so a long-running process stays bounded
pub fn spawn_cache_sweeper(gateway: Arc<CatalogGateway>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match gateway.cache().sweep_expired().await {
                Ok(removed) => {
                    let stats = gateway.cache_stats().await;
                    record_metric(MetricType::Gauge {
                        name: "cache.entries",
                        value: stats.entries as f64,
                    });
                    record_metric(MetricType::Counter {
                        name: "cache.swept",
                        value: removed as u64,
                    });
                }
                Err(e) => warn!(error = %e, "cache sweep failed"),
            }
        }
    })
}
