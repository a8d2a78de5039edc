use std::future::Future;
use std::sync::Arc;

use cached::{Cached, SizedCache};
use provider_core::{ProviderError, ReportSet};
use tokio::sync::RwLock;

/// Financial reports are keyed by entity and the first year requested;
/// a wider request is a different dataset, not a superset hit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportCacheKey {
    pub symbol: String,
    pub start_year: i32,
}

/// LRU cache over parsed report sets. Annual reports change once a
/// year, so no TTL; capacity is the only eviction pressure.
#[derive(Clone)]
pub struct ReportCache {
    inner: Arc<RwLock<SizedCache<ReportCacheKey, ReportSet>>>,
}

impl ReportCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SizedCache::with_size(capacity.max(1)))),
        }
    }

    pub async fn get(&self, key: &ReportCacheKey) -> Option<ReportSet> {
        self.inner.write().await.cache_get(key).cloned()
    }

    /// Only successful parses are installed; failures stay out so the
    /// next caller retries the fetch.
    pub async fn insert(&self, key: ReportCacheKey, reports: ReportSet) {
        self.inner.write().await.cache_set(key, reports);
    }

    /// Hit or compute-and-install. The lock is not held across the
    /// compute, so concurrent misses may compute twice; the last full
    /// value wins, which is safe because entries are whole replacements.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: ReportCacheKey,
        compute: F,
    ) -> Result<ReportSet, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ReportSet, ProviderError>>,
    {
        if let Some(hit) = self.get(&key).await {
            tracing::debug!(symbol = %key.symbol, start_year = key.start_year, "report cache hit");
            return Ok(hit);
        }
        let reports = compute().await?;
        self.insert(key, reports.clone()).await;
        Ok(reports)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.inner.write().await.cache_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(symbol: &str, start_year: i32) -> ReportCacheKey {
        ReportCacheKey {
            symbol: symbol.to_string(),
            start_year,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let cache = ReportCache::new(4);
        assert!(cache.get(&key("600519", 2020)).await.is_none());

        cache.insert(key("600519", 2020), ReportSet::new()).await;
        assert!(cache.get(&key("600519", 2020)).await.is_some());
        // a different start year is a different entry
        assert!(cache.get(&key("600519", 2015)).await.is_none());
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recent() {
        let cache = ReportCache::new(2);
        cache.insert(key("a", 2020), ReportSet::new()).await;
        cache.insert(key("b", 2020), ReportSet::new()).await;
        // touch "a" so "b" is the eviction candidate
        assert!(cache.get(&key("a", 2020)).await.is_some());
        cache.insert(key("c", 2020), ReportSet::new()).await;

        assert!(cache.get(&key("a", 2020)).await.is_some());
        assert!(cache.get(&key("b", 2020)).await.is_none());
        assert!(cache.get(&key("c", 2020)).await.is_some());
    }

    #[tokio::test]
    async fn test_compute_runs_once_per_key() {
        let cache = ReportCache::new(4);
        let calls = std::sync::atomic::AtomicUsize::new(0);

        for _ in 0..3 {
            cache
                .get_or_compute(key("600519", 2020), || async {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(ReportSet::new())
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_compute_caches_nothing() {
        let cache = ReportCache::new(4);
        let err = cache
            .get_or_compute(key("600519", 2020), || async {
                Err(ProviderError::InvalidData("upstream broke".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidData(_)));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = ReportCache::new(4);
        cache.insert(key("600519", 2020), ReportSet::new()).await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
