// partsgate - Gateway to an external automotive parts/vehicle catalog
// Root library module

pub mod builders;
pub mod catalog;
pub mod config;
pub mod factory;
pub mod http_server;
pub mod http_types;
pub mod observability;

// Re-export key types
pub use observability::{
    get_metrics, init_logging, init_logging_with_level, log_operation, record_metric,
    with_trace_id, MetricType, Operation, OperationContext,
};

pub use catalog::{
    ArticlePage, ArticleRecord, AssemblyGroupTree, CacheStats, CatalogError, CatalogGateway,
    CatalogMethod, CatalogTransport, HttpTransport, PaginatedArticles, VehicleRecord,
};

pub use builders::GatewayBuilder;
pub use config::{CacheBackend, GatewayConfig};
pub use factory::{create_gateway, spawn_cache_sweeper};
pub use http_server::{create_server, create_server_with_cors, serve, start_server};
