// HTTP REST API Server Implementation
// Route handlers consuming the catalog gateway and shaping its results as JSON

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::catalog::{
    ArticleRecord, AssemblyGroupTree, CatalogError, CatalogGateway, PaginatedArticles,
};
use crate::http_types::{
    ArticleQuery, CacheStatsResponse, ErrorResponse, HealthResponse, PartsQuery, VehiclesResponse,
};
use crate::observability::{get_metrics, log_operation, with_trace_id, Operation, OperationContext};

// Global server start time for uptime tracking
static SERVER_START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    gateway: Arc<CatalogGateway>,
}

/// Create HTTP server with all routes configured
pub fn create_server(gateway: Arc<CatalogGateway>) -> Router {
    create_server_with_cors(gateway, true)
}

pub fn create_server_with_cors(gateway: Arc<CatalogGateway>, enable_cors: bool) -> Router {
    let state = AppState { gateway };

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/api/vehicles/plate/:plate", get(lookup_vehicle))
        .route("/api/parts", get(list_parts))
        .route("/api/articles/:number", get(get_article))
        .route("/api/assembly-groups/:vehicle_id", get(get_assembly_groups))
        .route("/api/cache/stats", get(cache_stats))
        .with_state(state);

    if enable_cors {
        router.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
    } else {
        router.layer(TraceLayer::new_for_http())
    }
}

/// Serve on an already bound listener
pub async fn serve(listener: TcpListener, router: Router) -> Result<()> {
    let ctx = OperationContext::new("server.start");
    log_operation(
        &ctx,
        &Operation::Startup {
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        &Ok::<_, anyhow::Error>(()),
    );
    Lazy::force(&SERVER_START_TIME);

    if let Ok(addr) = listener.local_addr() {
        info!("partsgate HTTP server listening on {}", addr);
    }

    let result = axum::serve(listener, router).await;
    log_operation(
        &ctx,
        &Operation::Shutdown {
            reason: "server loop exited".to_string(),
        },
        &result,
    );
    Ok(result?)
}

/// Start the HTTP server on the specified host and port
pub async fn start_server(
    gateway: Arc<CatalogGateway>,
    host: &str,
    port: u16,
    enable_cors: bool,
) -> Result<()> {
    let listener = TcpListener::bind(&format!("{host}:{port}")).await?;
    serve(listener, create_server_with_cors(gateway, enable_cors)).await
}

/// Map a failed handler future to an HTTP error.
/// Upstream 404 and 429 pass through; every other catalog failure is a 502.
fn error_response(error: &anyhow::Error) -> ApiError {
    let Some(catalog_error) = error.downcast_ref::<CatalogError>() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("internal_error", error.to_string())),
        );
    };

    let status = match catalog_error.status() {
        Some(404) => StatusCode::NOT_FOUND,
        Some(429) => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::BAD_GATEWAY,
    };
    let code = match catalog_error {
        CatalogError::Transport(_) => "upstream_unreachable",
        CatalogError::Http { .. } | CatalogError::Application { .. } => "upstream_error",
        CatalogError::Parse { .. } | CatalogError::Shape { .. } => "upstream_invalid_response",
    };

    warn!(status = %status, error = %catalog_error, "catalog request failed");
    (
        status,
        Json(ErrorResponse::new(code, catalog_error.to_string())),
    )
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: SERVER_START_TIME.elapsed().as_secs(),
        mock_mode: state.gateway.mock_mode(),
    })
}

/// Look up vehicles by registration plate
async fn lookup_vehicle(
    State(state): State<AppState>,
    Path(plate): Path<String>,
) -> Result<Json<VehiclesResponse>, ApiError> {
    if plate.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("plate must not be empty")),
        ));
    }

    let result = with_trace_id("lookup_vehicle", async {
        state
            .gateway
            .lookup_vehicle_by_plate(&plate)
            .await
            .map_err(anyhow::Error::from)
    })
    .await;

    match result {
        Ok(vehicles) => Ok(Json(VehiclesResponse { plate, vehicles })),
        Err(e) => Err(error_response(&e)),
    }
}

/// Compatible parts for a vehicle and assembly group, sorted for display
async fn list_parts(
    State(state): State<AppState>,
    Query(query): Query<PartsQuery>,
) -> Result<Json<PaginatedArticles>, ApiError> {
    let result = with_trace_id("list_parts", async {
        state
            .gateway
            .parts_for_display(query.vehicle_id, query.assembly_group_id, query.enrich)
            .await
            .map_err(anyhow::Error::from)
    })
    .await;

    result.map(Json).map_err(|e| error_response(&e))
}

/// Article detail by number and brand
async fn get_article(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Query(query): Query<ArticleQuery>,
) -> Result<Json<ArticleRecord>, ApiError> {
    let result = with_trace_id("get_article", async {
        state
            .gateway
            .fetch_article_detail(&number, query.brand_id)
            .await
            .map_err(anyhow::Error::from)
    })
    .await;

    match result {
        Ok(Some(article)) => Ok(Json(article)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found(format!(
                "Article {number} from brand {} not found",
                query.brand_id
            ))),
        )),
        Err(e) => Err(error_response(&e)),
    }
}

/// Assembly-group hierarchy for a vehicle
async fn get_assembly_groups(
    State(state): State<AppState>,
    Path(vehicle_id): Path<u64>,
) -> Result<Json<AssemblyGroupTree>, ApiError> {
    let result = with_trace_id("get_assembly_groups", async {
        state
            .gateway
            .fetch_assembly_groups(vehicle_id)
            .await
            .map_err(anyhow::Error::from)
    })
    .await;

    result.map(Json).map_err(|e| error_response(&e))
}

/// Cache statistics and gateway counters
async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        cache: state.gateway.cache_stats().await,
        metrics: get_metrics(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let not_found = anyhow::Error::from(CatalogError::http(404, "Not Found"));
        assert_eq!(error_response(&not_found).0, StatusCode::NOT_FOUND);

        let limited = anyhow::Error::from(CatalogError::application(429, "slow down"));
        assert_eq!(error_response(&limited).0, StatusCode::TOO_MANY_REQUESTS);

        let (status, Json(body)) =
            error_response(&anyhow::Error::from(CatalogError::http(401, "Unauthorized")));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.error, "upstream_error");
        assert!(body.message.contains("Unauthorized"));

        let (status, Json(body)) =
            error_response(&anyhow::Error::from(CatalogError::Transport("dns".to_string())));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.error, "upstream_unreachable");

        let (status, _) = error_response(&anyhow::anyhow!("something else"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
