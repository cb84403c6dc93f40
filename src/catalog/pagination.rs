// Pagination Walker
// Page 1 decides how many pages exist; further pages are fetched one after
// another up to a hard cap. A failing page ends the walk with what was gathered.

use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, warn};

use super::errors::CatalogError;
use super::types::{ArticlePage, ArticleRecord};

pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Upper bound on pages fetched per listing, bounds upstream cost
pub const DEFAULT_MAX_PAGES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationPolicy {
    pub page_size: u32,
    pub max_pages: u32,
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl PaginationPolicy {
    /// `ceil(total / page_size)`
    pub fn total_pages(&self, total_matching: u64) -> u64 {
        total_matching.div_ceil(u64::from(self.page_size.max(1)))
    }

    /// Last page number the walker will request, never below 1
    pub fn last_page(&self, total_matching: u64) -> u32 {
        let capped = self.total_pages(total_matching).min(u64::from(self.max_pages.max(1)));
        u32::try_from(capped).unwrap_or(u32::MAX).max(1)
    }
}

/// Accumulated result of one paginated listing
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaginatedArticles {
    pub articles: Vec<ArticleRecord>,
    pub total_matching: u64,
    pub pages_fetched: u32,
    /// A page after the first failed and the walk stopped early
    pub partial: bool,
}

/// Continue a listing from its first page.
///
/// With `follow` false only the first page is returned. Otherwise pages
/// `2..=last_page` are requested sequentially through `fetch_page`, and
/// articles are concatenated in page order.
pub async fn walk_pages<F, Fut>(
    policy: PaginationPolicy,
    first_page: ArticlePage,
    follow: bool,
    mut fetch_page: F,
) -> PaginatedArticles
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<ArticlePage, CatalogError>>,
{
    let total_matching = first_page.total_matching;
    let mut result = PaginatedArticles {
        articles: first_page.articles,
        total_matching,
        pages_fetched: 1,
        partial: false,
    };

    if !follow {
        return result;
    }

    let last_page = policy.last_page(total_matching);
    debug!(
        total_matching,
        total_pages = policy.total_pages(total_matching),
        last_page,
        "walking article pages"
    );

    for page in 2..=last_page {
        match fetch_page(page).await {
            Ok(next) => {
                result.articles.extend(next.articles);
                result.pages_fetched += 1;
            }
            Err(e) => {
                warn!(page, error = %e, "page fetch failed, returning partial results");
                result.partial = true;
                break;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn page(total: u64, page_no: u32, count: usize) -> ArticlePage {
        ArticlePage {
            total_matching: total,
            articles: (0..count)
                .map(|i| ArticleRecord {
                    article_number: format!("P{page_no}-{i}"),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn test_page_arithmetic() {
        let policy = PaginationPolicy::default();
        assert_eq!(policy.total_pages(0), 0);
        assert_eq!(policy.total_pages(100), 1);
        assert_eq!(policy.total_pages(101), 2);
        assert_eq!(policy.last_page(0), 1);
        assert_eq!(policy.last_page(250), 3);
        assert_eq!(policy.last_page(1000), 5);
    }

    #[tokio::test]
    async fn test_fetches_only_needed_pages() {
        let requested = AtomicU32::new(0);
        let result = walk_pages(PaginationPolicy::default(), page(250, 1, 100), true, |n| {
            requested.fetch_add(1, Ordering::SeqCst);
            let count = if n == 3 { 50 } else { 100 };
            async move { Ok::<_, CatalogError>(page(250, n, count)) }
        })
        .await;

        assert_eq!(requested.load(Ordering::SeqCst), 2);
        assert_eq!(result.pages_fetched, 3);
        assert_eq!(result.articles.len(), 250);
        assert!(!result.partial);
    }

    #[tokio::test]
    async fn test_caps_at_max_pages() {
        let result = walk_pages(PaginationPolicy::default(), page(1000, 1, 100), true, |n| async move {
            Ok::<_, CatalogError>(page(1000, n, 100))
        })
        .await;

        assert_eq!(result.pages_fetched, 5);
        assert_eq!(result.articles.len(), 500);
        assert_eq!(result.total_matching, 1000);
        assert_eq!(result.articles[499].article_number, "P5-99");
    }

    #[tokio::test]
    async fn test_failure_returns_partial_results() {
        let result = walk_pages(PaginationPolicy::default(), page(500, 1, 100), true, |n| async move {
            if n == 3 {
                Err(CatalogError::http(500, "Internal Server Error"))
            } else {
                Ok(page(500, n, 100))
            }
        })
        .await;

        assert!(result.partial);
        assert_eq!(result.pages_fetched, 2);
        assert_eq!(result.articles.len(), 200);
    }

    #[tokio::test]
    async fn test_no_follow_returns_first_page() {
        let result = walk_pages(PaginationPolicy::default(), page(1000, 1, 100), false, |_| async {
            Err::<ArticlePage, _>(CatalogError::Transport("must not be called".to_string()))
        })
        .await;

        assert_eq!(result.pages_fetched, 1);
        assert!(!result.partial);
    }
}
