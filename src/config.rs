use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::catalog::{
    EnrichmentPolicy, PaginationPolicy, DEFAULT_MAX_ENTRIES, DEFAULT_TIMEOUT_SECONDS, DEFAULT_TTL,
};

/// Default upstream JSON endpoint
pub const DEFAULT_CATALOG_ENDPOINT: &str =
    "https://webservice.tecalliance.services/pegasus-3-0/services/TecdocToCatDLB.jsonEndpoint";

/// Missing sections take their defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub cache: CacheConfig,
    pub pagination: PaginationPolicy,
    pub enrichment: EnrichmentPolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    pub endpoint: String,
    pub api_key: String,
    pub provider_id: u32,
    pub language: String,
    pub country: String,
    pub mock_mode: bool,
    #[serde(with = "duration_string")]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    #[serde(with = "duration_string")]
    pub ttl: Duration,
    pub max_entries: usize,
    #[serde(with = "duration_string")]
    pub sweep_interval: Duration,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                enable_cors: true,
            },
            catalog: CatalogConfig {
                endpoint: DEFAULT_CATALOG_ENDPOINT.to_string(),
                api_key: String::new(),
                provider_id: 0,
                language: "no".to_string(),
                country: "NO".to_string(),
                mock_mode: false,
                request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            },
            cache: CacheConfig {
                backend: CacheBackend::Memory,
                ttl: DEFAULT_TTL,
                max_entries: DEFAULT_MAX_ENTRIES,
                sweep_interval: Duration::from_secs(300),
                database_url: None,
                max_connections: 5,
            },
            pagination: PaginationPolicy::default(),
            enrichment: EnrichmentPolicy::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: GatewayConfig = toml::from_str(content).context("invalid config TOML")?;
        Ok(config)
    }

    /// Defaults, then the optional file, then environment variables
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from environment-style lookups
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PARTSGATE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PARTSGATE_PORT") {
            self.server.port = port.parse().context("PARTSGATE_PORT must be a port number")?;
        }
        if let Some(endpoint) = lookup("CATALOG_ENDPOINT") {
            self.catalog.endpoint = endpoint;
        }
        if let Some(api_key) = lookup("CATALOG_API_KEY") {
            self.catalog.api_key = api_key;
        }
        if let Some(provider) = lookup("CATALOG_PROVIDER_ID") {
            self.catalog.provider_id = provider
                .parse()
                .context("CATALOG_PROVIDER_ID must be numeric")?;
        }
        if let Some(mock) = lookup("CATALOG_MOCK_MODE") {
            self.catalog.mock_mode = matches!(mock.as_str(), "1" | "true" | "yes");
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.cache.database_url = Some(url);
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.catalog.endpoint)
            .with_context(|| format!("invalid catalog endpoint {}", self.catalog.endpoint))?;
        if self.cache.backend == CacheBackend::Postgres && self.cache.database_url.is_none() {
            bail!("cache backend 'postgres' requires cache.database_url or DATABASE_URL");
        }
        if self.pagination.page_size == 0 || self.pagination.max_pages == 0 {
            bail!("pagination page_size and max_pages must be positive");
        }
        Ok(())
    }
}

// Helper module for duration serialization
mod duration_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = format!("{}s", duration.as_secs());
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if let Some(stripped) = s.strip_suffix('s') {
            let secs: u64 = stripped.parse().map_err(serde::de::Error::custom)?;
            Ok(Duration::from_secs(secs))
        } else {
            Err(serde::de::Error::custom(
                "Expected duration string ending with 's'",
            ))
        }
    }
}
