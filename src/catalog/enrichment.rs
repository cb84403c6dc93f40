// Detail enrichment fan-out
// Replaces listing records with their detail records, a bounded number at a time.
// One failed detail fetch never affects its siblings.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, warn};

use super::errors::CatalogError;
use super::types::ArticleRecord;

pub const DEFAULT_MAX_ITEMS: usize = 10;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// How much detail enrichment a call may do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentPolicy {
    /// Only the first `max_items` articles are enriched
    pub max_items: usize,
    /// Concurrent detail fetches in flight
    pub max_in_flight: usize,
}

impl Default for EnrichmentPolicy {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// Fold a detail record into the listing record it came from.
/// Listing fields survive wherever the detail record left them empty.
pub fn merge_detail(original: ArticleRecord, detail: ArticleRecord) -> ArticleRecord {
    ArticleRecord {
        article_number: if detail.article_number.is_empty() {
            original.article_number
        } else {
            detail.article_number
        },
        data_supplier_id: if detail.data_supplier_id == 0 {
            original.data_supplier_id
        } else {
            detail.data_supplier_id
        },
        price: detail.price.or(original.price),
        generic_article_description: if detail.generic_article_description.is_empty() {
            original.generic_article_description
        } else {
            detail.generic_article_description
        },
        manufacturer_name: if detail.manufacturer_name.is_empty() {
            original.manufacturer_name
        } else {
            detail.manufacturer_name
        },
        detailed: true,
        ..detail
    }
}

/// Enrich up to `policy.max_items` articles with `fetch_detail`, keeping input order.
///
/// A fetch that fails, or finds nothing, leaves that article exactly as it was.
/// Articles past `max_items` are returned untouched.
pub async fn enrich_with<F, Fut>(
    articles: Vec<ArticleRecord>,
    policy: EnrichmentPolicy,
    fetch_detail: F,
) -> Vec<ArticleRecord>
where
    F: Fn(&ArticleRecord) -> Fut,
    Fut: Future<Output = Result<Option<ArticleRecord>, CatalogError>>,
{
    let mut head = articles;
    let tail = head.split_off(policy.max_items.min(head.len()));
    debug!(
        enriching = head.len(),
        untouched = tail.len(),
        max_in_flight = policy.max_in_flight,
        "enriching articles"
    );

    let mut enriched: Vec<ArticleRecord> = stream::iter(head.into_iter().map(|original| {
        let pending = fetch_detail(&original);
        async move {
            match pending.await {
                Ok(Some(detail)) => merge_detail(original, detail),
                Ok(None) => original,
                Err(e) => {
                    warn!(
                        article_number = %original.article_number,
                        error = %e,
                        "detail fetch failed, keeping listing record"
                    );
                    original
                }
            }
        }
    }))
    .buffered(policy.max_in_flight.max(1))
    .collect()
    .await;

    enriched.extend(tail);
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::ArticleAttribute;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn listing(n: usize) -> Vec<ArticleRecord> {
        (0..n)
            .map(|i| ArticleRecord {
                article_number: format!("A{i}"),
                data_supplier_id: 30,
                manufacturer_name: "BOSCH".to_string(),
                ..Default::default()
            })
            .collect()
    }

    fn detailed(original: &ArticleRecord) -> ArticleRecord {
        ArticleRecord {
            attributes: vec![ArticleAttribute {
                name: "Detail".to_string(),
                value: original.article_number.clone(),
            }],
            ..original.clone()
        }
    }

    #[tokio::test]
    async fn test_failed_details_keep_originals() {
        let originals = listing(10);
        let result = enrich_with(originals.clone(), EnrichmentPolicy::default(), |a| {
            let a = a.clone();
            async move {
                if a.article_number == "A3" || a.article_number == "A7" {
                    Err(CatalogError::http(500, "boom"))
                } else {
                    Ok(Some(detailed(&a)))
                }
            }
        })
        .await;

        assert_eq!(result.len(), 10);
        assert_eq!(result[3], originals[3]);
        assert_eq!(result[7], originals[7]);
        assert_eq!(result[0].attributes[0].value, "A0");
        assert_eq!(result[9].attributes[0].value, "A9");
        assert!(result[0].detailed);
        assert!(!result[3].detailed);
    }

    #[tokio::test]
    async fn test_only_first_max_items_enriched() {
        let calls = AtomicUsize::new(0);
        let result = enrich_with(listing(15), EnrichmentPolicy::default(), |a| {
            calls.fetch_add(1, Ordering::SeqCst);
            let a = a.clone();
            async move { Ok::<_, CatalogError>(Some(detailed(&a))) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(result.len(), 15);
        assert!(result[14].attributes.is_empty());
        assert_eq!(result[14].article_number, "A14");
    }

    #[tokio::test]
    async fn test_respects_max_in_flight() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let policy = EnrichmentPolicy {
            max_items: 10,
            max_in_flight: 3,
        };

        let result = enrich_with(listing(10), policy, |_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<Option<ArticleRecord>, CatalogError>(None)
            }
        })
        .await;

        assert_eq!(result, listing(10));
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_merge_keeps_listing_price() {
        let original = ArticleRecord {
            price: Some(crate::catalog::types::ArticlePrice {
                amount: 10.0,
                currency: "NOK".to_string(),
            }),
            generic_article_description: "Brake Disc".to_string(),
            ..Default::default()
        };
        let merged = merge_detail(original.clone(), ArticleRecord::default());
        assert_eq!(merged.price, original.price);
        assert_eq!(merged.generic_article_description, "Brake Disc");
        assert!(merged.detailed);
    }
}
