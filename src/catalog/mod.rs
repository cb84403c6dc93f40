// External parts/vehicle catalog gateway
// Request building, mock short-circuit, TTL response cache, pagination,
// error classification and detail enrichment for the upstream catalog API.

pub mod cache;
pub mod enrichment;
pub mod envelope;
pub mod errors;
pub mod gateway;
pub mod mock;
pub mod pagination;
pub mod postgres_store;
pub mod transport;
pub mod types;

pub use cache::{
    CacheEntry, CacheStats, Clock, Fingerprint, ManualClock, MemoryResponseStore, ResponseCache,
    ResponseStore, SystemClock, DEFAULT_MAX_ENTRIES, DEFAULT_TTL,
};
pub use enrichment::{enrich_with, merge_detail, EnrichmentPolicy};
pub use envelope::{CatalogMethod, EnvelopeDefaults, RequestEnvelope};
pub use errors::{classify_status, CatalogError};
pub use gateway::{check_application_status, CatalogGateway};
pub use mock::{normalize_plate, MockResponder, FIXTURE_PLATE};
pub use pagination::{walk_pages, PaginatedArticles, PaginationPolicy};
pub use postgres_store::PostgresResponseStore;
pub use transport::{CatalogTransport, HttpTransport, API_KEY_HEADER, DEFAULT_TIMEOUT_SECONDS};
pub use types::{
    sort_for_display, ArticleAttribute, ArticlePage, ArticlePrice, ArticleRecord,
    AssemblyGroupBranch, AssemblyGroupNode, AssemblyGroupTree, CatalogResponse, VehicleRecord,
};
