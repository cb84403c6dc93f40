// Builder Patterns
// Fluent construction of a CatalogGateway with sensible defaults and
// validation at build time.

use anyhow::{ensure, Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{
    CatalogGateway, CatalogTransport, Clock, EnrichmentPolicy, EnvelopeDefaults, HttpTransport,
    MemoryResponseStore, MockResponder, PaginationPolicy, ResponseCache, ResponseStore,
    SystemClock, DEFAULT_MAX_ENTRIES, DEFAULT_TTL,
};

/// Fluent builder for creating a CatalogGateway
pub struct GatewayBuilder {
    transport: Option<Arc<dyn CatalogTransport>>,
    store: Option<Arc<dyn ResponseStore>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    max_entries: usize,
    defaults: EnvelopeDefaults,
    mock_mode: bool,
    pagination: PaginationPolicy,
    enrichment: EnrichmentPolicy,
}

impl GatewayBuilder {
    /// Create a new gateway builder
    pub fn new() -> Self {
        Self {
            transport: None,
            store: None,
            clock: Arc::new(SystemClock),
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
            defaults: EnvelopeDefaults::new(0),
            mock_mode: false,
            pagination: PaginationPolicy::default(),
            enrichment: EnrichmentPolicy::default(),
        }
    }

    /// Use a custom transport
    pub fn transport(mut self, transport: Arc<dyn CatalogTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Talk to the upstream JSON endpoint over HTTP
    pub fn http_transport(
        mut self,
        endpoint: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let transport = HttpTransport::new(endpoint, api_key, timeout)
            .context("failed to build catalog HTTP client")?;
        self.transport = Some(Arc::new(transport));
        Ok(self)
    }

    /// Keep cache entries in a custom store instead of process memory
    pub fn store(mut self, store: Arc<dyn ResponseStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Cache time-to-live
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Bound for the default in-memory store
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn provider(mut self, provider: u32) -> Self {
        self.defaults.provider = provider;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.defaults.language = language.into();
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.defaults.country = country.into();
        self
    }

    /// Answer every call from canned data instead of upstream
    pub fn mock_mode(mut self, enabled: bool) -> Self {
        self.mock_mode = enabled;
        self
    }

    pub fn pagination(mut self, policy: PaginationPolicy) -> Self {
        self.pagination = policy;
        self
    }

    pub fn enrichment(mut self, policy: EnrichmentPolicy) -> Self {
        self.enrichment = policy;
        self
    }

    /// Build the gateway
    pub fn build(self) -> Result<CatalogGateway> {
        let transport = self
            .transport
            .context("catalog gateway needs a transport")?;
        ensure!(self.pagination.page_size > 0, "page_size must be positive");
        ensure!(self.pagination.max_pages > 0, "max_pages must be positive");
        ensure!(
            self.enrichment.max_in_flight > 0,
            "max_in_flight must be positive"
        );
        ensure!(self.max_entries > 0, "max_entries must be positive");
        ensure!(!self.ttl.is_zero(), "cache ttl must be positive");

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryResponseStore::new(self.max_entries)));

        Ok(CatalogGateway {
            transport,
            cache: ResponseCache::new(store, self.ttl, self.clock),
            defaults: self.defaults,
            mock: MockResponder::new(self.mock_mode),
            pagination: self.pagination,
            enrichment: self.enrichment,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_transport() {
        let err = GatewayBuilder::new().build().err().expect("no transport");
        assert!(err.to_string().contains("transport"));
    }

    #[test]
    fn test_build_rejects_zero_policies() {
        let result = GatewayBuilder::new()
            .http_transport("http://127.0.0.1:9", "key", Duration::from_secs(1))
            .expect("client builds")
            .pagination(PaginationPolicy {
                page_size: 0,
                max_pages: 5,
            })
            .build();
        assert!(result.is_err());

        let result = GatewayBuilder::new()
            .http_transport("http://127.0.0.1:9", "key", Duration::from_secs(1))
            .expect("client builds")
            .enrichment(EnrichmentPolicy {
                max_items: 10,
                max_in_flight: 0,
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_applies_settings() {
        let gateway = GatewayBuilder::new()
            .http_transport("http://127.0.0.1:9", "key", Duration::from_secs(1))
            .expect("client builds")
            .provider(22610)
            .language("en")
            .mock_mode(true)
            .ttl(Duration::from_secs(60))
            .build()
            .expect("gateway builds");

        assert!(gateway.mock_mode());
        assert_eq!(gateway.defaults.provider, 22610);
        assert_eq!(gateway.defaults.language, "en");
        assert_eq!(gateway.defaults.country, "NO");
        assert_eq!(gateway.cache().ttl(), Duration::from_secs(60));
    }
}
