// Catalog gateway
// BUILD -> MOCK_CHECK -> CACHE_CHECK -> NETWORK_CALL -> CACHE_WRITE -> PAGINATE
// No retries: one failed network call fails that call. Only pagination and
// detail enrichment degrade to partial results.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::instrument;

use super::cache::{CacheStats, Fingerprint, ResponseCache};
use super::enrichment::{enrich_with, EnrichmentPolicy};
use super::envelope::{CatalogMethod, EnvelopeDefaults, RequestEnvelope};
use super::errors::CatalogError;
use super::mock::{normalize_plate, MockResponder, PLATE_PARAM};
use super::pagination::{walk_pages, PaginatedArticles, PaginationPolicy};
use super::transport::CatalogTransport;
use super::types::{
    sort_for_display, ArticlePage, ArticleRecord, AssemblyGroupTree, CatalogResponse,
    VehicleRecord,
};
use crate::builders::GatewayBuilder;
use crate::observability::{log_operation, Operation, OperationContext};

/// Key-system type for Norwegian registration plates
const NORWEGIAN_PLATE_KEY_SYSTEM: u32 = 99;

/// Linkage target type for passenger cars
const PASSENGER_CAR_TARGET: &str = "P";

/// Gateway to the external parts/vehicle catalog
pub struct CatalogGateway {
    pub(crate) transport: Arc<dyn CatalogTransport>,
    pub(crate) cache: ResponseCache,
    pub(crate) defaults: EnvelopeDefaults,
    pub(crate) mock: MockResponder,
    pub(crate) pagination: PaginationPolicy,
    pub(crate) enrichment: EnrichmentPolicy,
}

impl CatalogGateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub fn mock_mode(&self) -> bool {
        self.mock.mock_mode()
    }

    pub fn pagination(&self) -> PaginationPolicy {
        self.pagination
    }

    pub fn enrichment(&self) -> EnrichmentPolicy {
        self.enrichment
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Raw call: every typed operation goes through here.
    pub async fn call(
        &self,
        method: CatalogMethod,
        params: Map<String, Value>,
    ) -> Result<Value, CatalogError> {
        self.call_in(OperationContext::new("catalog.call"), method, params)
            .await
    }

    #[instrument(skip(self, ctx, method, params), fields(method = %method))]
    async fn call_in(
        &self,
        mut ctx: OperationContext,
        method: CatalogMethod,
        params: Map<String, Value>,
    ) -> Result<Value, CatalogError> {
        ctx.add_attribute("method", method.wire_name());

        if let Some(payload) = self.mock.respond(method, &params) {
            log_operation(&ctx, &Operation::MockServed { method }, &Ok::<_, CatalogError>(()));
            return Ok(payload);
        }

        let fingerprint = Fingerprint::new(method, &params);
        if let Some(payload) = self.cache.get(&fingerprint).await {
            log_operation(&ctx, &Operation::CacheHit { method }, &Ok::<_, CatalogError>(()));
            return Ok(payload);
        }

        let envelope = RequestEnvelope::build(method, &params, &self.defaults);
        let result = match self.transport.send(&envelope).await {
            Ok(payload) => check_application_status(&payload).map(|()| payload),
            Err(e) => Err(e),
        };
        log_operation(&ctx, &Operation::UpstreamCall { method }, &result);

        let payload = result?;
        self.cache.put(fingerprint, payload.clone()).await;
        Ok(payload)
    }

    /// Vehicles registered under a plate
    pub async fn lookup_vehicle_by_plate(
        &self,
        plate: &str,
    ) -> Result<Vec<VehicleRecord>, CatalogError> {
        let method = CatalogMethod::VehiclesByPlate;
        let params = object(json!({
            PLATE_PARAM: normalize_plate(plate),
            "keySystemType": NORWEGIAN_PLATE_KEY_SYSTEM,
        }));
        match CatalogResponse::parse(method, &self.call(method, params).await?)? {
            CatalogResponse::Vehicles(vehicles) => Ok(vehicles),
            other => Err(mismatch(method, &other)),
        }
    }

    /// One page of the article listing for a vehicle and assembly group
    pub async fn fetch_article_page(
        &self,
        vehicle_id: u64,
        assembly_group_id: u64,
        page: u32,
    ) -> Result<ArticlePage, CatalogError> {
        self.article_page_in(
            OperationContext::new("catalog.call"),
            vehicle_id,
            assembly_group_id,
            page,
        )
        .await
    }

    async fn article_page_in(
        &self,
        ctx: OperationContext,
        vehicle_id: u64,
        assembly_group_id: u64,
        page: u32,
    ) -> Result<ArticlePage, CatalogError> {
        let method = CatalogMethod::Articles;
        let params = object(json!({
            "linkageTargetType": PASSENGER_CAR_TARGET,
            "linkageTargetId": vehicle_id,
            "assemblyGroupNodeIds": assembly_group_id,
            "perPage": self.pagination.page_size,
            "page": page,
            "includeGenericArticles": true,
            "includeImages": true,
            "includeArticleCriteria": true,
        }));
        match CatalogResponse::parse(method, &self.call_in(ctx, method, params).await?)? {
            CatalogResponse::Articles(page) => Ok(page),
            other => Err(mismatch(method, &other)),
        }
    }

    /// Every compatible article, up to the page cap.
    /// Mock mode never requests pages past the first.
    #[instrument(skip(self))]
    pub async fn fetch_compatible_parts(
        &self,
        vehicle_id: u64,
        assembly_group_id: u64,
    ) -> Result<PaginatedArticles, CatalogError> {
        let mut ctx = OperationContext::new("catalog.paginate");
        ctx.add_attribute("vehicle_id", vehicle_id.to_string());
        ctx.add_attribute("assembly_group_id", assembly_group_id.to_string());
        let first = self
            .article_page_in(ctx.child("catalog.page"), vehicle_id, assembly_group_id, 1)
            .await?;

        let listing = walk_pages(self.pagination, first, !self.mock_mode(), |page| {
            self.article_page_in(ctx.child("catalog.page"), vehicle_id, assembly_group_id, page)
        })
        .await;

        log_operation(
            &ctx,
            &Operation::Pagination {
                pages_fetched: listing.pages_fetched,
                article_count: listing.articles.len(),
                partial: listing.partial,
            },
            &Ok::<_, CatalogError>(()),
        );
        Ok(listing)
    }

    /// Article detail by article number and brand, `None` when upstream has no match
    pub async fn fetch_article_detail(
        &self,
        article_number: &str,
        brand_id: u64,
    ) -> Result<Option<ArticleRecord>, CatalogError> {
        self.article_detail_in(OperationContext::new("catalog.call"), article_number, brand_id)
            .await
    }

    async fn article_detail_in(
        &self,
        ctx: OperationContext,
        article_number: &str,
        brand_id: u64,
    ) -> Result<Option<ArticleRecord>, CatalogError> {
        let method = CatalogMethod::ArticleDetail;
        let params = object(json!({
            "articleNumber": article_number,
            "brandId": brand_id,
            "numberType": 0,
            "searchExact": true,
        }));
        match CatalogResponse::parse(method, &self.call_in(ctx, method, params).await?)? {
            CatalogResponse::ArticleDetail(detail) => Ok(detail),
            other => Err(mismatch(method, &other)),
        }
    }

    /// Assembly-group hierarchy for a vehicle
    pub async fn fetch_assembly_groups(
        &self,
        vehicle_id: u64,
    ) -> Result<AssemblyGroupTree, CatalogError> {
        let method = CatalogMethod::AssemblyGroups;
        let params = object(json!({
            "linkingTargetId": vehicle_id,
            "linkingTargetType": PASSENGER_CAR_TARGET,
            "childNodes": true,
        }));
        match CatalogResponse::parse(method, &self.call(method, params).await?)? {
            CatalogResponse::AssemblyGroups(nodes) => Ok(AssemblyGroupTree::from_nodes(nodes)),
            other => Err(mismatch(method, &other)),
        }
    }

    /// Replace the first articles with their detail records; failures keep the original
    pub async fn enrich_articles(&self, articles: Vec<ArticleRecord>) -> Vec<ArticleRecord> {
        let ctx = OperationContext::new("catalog.enrich");
        let requested = articles.len().min(self.enrichment.max_items);

        let enriched = enrich_with(articles, self.enrichment, |article| {
            let number = article.article_number.clone();
            let brand_id = article.data_supplier_id;
            let detail_ctx = ctx.child("catalog.detail");
            async move { self.article_detail_in(detail_ctx, &number, brand_id).await }
        })
        .await;

        log_operation(&ctx, &Operation::Enrichment { requested }, &Ok::<_, CatalogError>(()));
        enriched
    }

    /// Listing sorted for display, optionally enriched after sorting
    pub async fn parts_for_display(
        &self,
        vehicle_id: u64,
        assembly_group_id: u64,
        enrich: bool,
    ) -> Result<PaginatedArticles, CatalogError> {
        let mut listing = self
            .fetch_compatible_parts(vehicle_id, assembly_group_id)
            .await?;
        sort_for_display(&mut listing.articles);
        if enrich {
            listing.articles = self.enrich_articles(listing.articles).await;
        }
        Ok(listing)
    }
}

/// A numeric `status` other than 200 inside a 2xx body is an error.
/// An absent or non-numeric `status` is treated as success.
pub fn check_application_status(payload: &Value) -> Result<(), CatalogError> {
    let Some(status) = payload.get("status").and_then(Value::as_i64) else {
        return Ok(());
    };
    if status == 200 {
        return Ok(());
    }

    let status_text = payload
        .get("statusText")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Err(CatalogError::application(status, status_text))
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn mismatch(method: CatalogMethod, parsed: &CatalogResponse) -> CatalogError {
    CatalogError::shape(method, format!("parsed as {}", parsed.method()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_status_contract() {
        assert!(check_application_status(&json!({"articles": []})).is_ok());
        assert!(check_application_status(&json!({"status": 200, "data": {}})).is_ok());
        assert!(check_application_status(&json!({"status": "OK"})).is_ok());

        let err = check_application_status(&json!({"status": 401, "statusText": "bad key"}))
            .expect_err("401 envelope is an error");
        assert!(err.to_string().contains("Unauthorized"));
        assert!(matches!(err, CatalogError::Application { status: 401, .. }));
    }
}
