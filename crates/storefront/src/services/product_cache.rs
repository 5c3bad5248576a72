//! Cached product list.
//!
//! The whole catalog is cached under a single key (5 minute TTL) and dropped
//! whenever a seller adds a product or changes stock. Each write bumps a
//! generation counter; a load that overlapped a write removes what it just
//! stored, so a list read before the write never outlives it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;

use crate::models::Product;

/// How long the product list stays cached.
pub const PRODUCT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Product list cache shared by the catalog routes.
pub struct ProductCache {
    cache: Cache<(), Arc<Vec<Product>>>,
    generation: AtomicU64,
}

impl ProductCache {
    /// Create an empty cache with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
            generation: AtomicU64::new(0),
        }
    }

    /// Return the cached list, or run `load` and cache its result.
    ///
    /// # Errors
    ///
    /// Returns the loader's error; nothing is cached in that case.
    pub async fn get_or_load<F, Fut, E>(&self, load: F) -> Result<Arc<Vec<Product>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Product>, E>>,
    {
        if let Some(cached) = self.cache.get(&()).await {
            return Ok(cached);
        }

        let started = self.generation.load(Ordering::Acquire);
        let fresh = Arc::new(load().await?);
        self.cache.insert((), Arc::clone(&fresh)).await;

        if self.generation.load(Ordering::Acquire) != started {
            self.cache.invalidate(&()).await;
        }
        Ok(fresh)
    }

    /// Drop the cached list after a catalog write has committed.
    pub async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate(&()).await;
    }
}

impl Default for ProductCache {
    fn default() -> Self {
        Self::new(PRODUCT_CACHE_TTL)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    async fn load_counting(cache: &ProductCache, loads: &AtomicUsize) -> Arc<Vec<Product>> {
        cache
            .get_or_load(|| async move {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(Vec::new())
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let cache = ProductCache::default();
        let loads = AtomicUsize::new(0);

        let first = load_counting(&cache, &loads).await;
        let second = load_counting(&cache, &loads).await;

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let cache = ProductCache::default();
        let loads = AtomicUsize::new(0);

        load_counting(&cache, &loads).await;
        cache.invalidate().await;
        load_counting(&cache, &loads).await;

        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_load_overlapping_a_write_is_not_kept() {
        let cache = ProductCache::default();
        let loads = AtomicUsize::new(0);

        // The write commits while the list is being read from the database
        let writer = &cache;
        cache
            .get_or_load(|| async move {
                writer.invalidate().await;
                Ok::<_, Infallible>(Vec::new())
            })
            .await
            .unwrap();

        load_counting(&cache, &loads).await;
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache = ProductCache::default();
        let loads = AtomicUsize::new(0);

        let result = cache
            .get_or_load(|| async { Err::<Vec<Product>, _>("database down") })
            .await;
        assert!(result.is_err());

        load_counting(&cache, &loads).await;
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
