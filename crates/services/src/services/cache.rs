//! Invalidation seam toward the UI cache layer.
//!
//! The write workflow's only contract with the cache is which semantic
//! keys it touches after which operation; what "invalidate" and "refetch"
//! mean is up to the embedding application.

use async_trait::async_trait;

/// Semantic key for a set of cached query results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Every cached order list view.
    Orders,
    /// The detail view of one order, keyed by readable id.
    Order(String),
    /// Cached location and terminal lists.
    OrderLocations,
}

#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Mark cached results under `key` as stale.
    async fn invalidate(&self, key: CacheKey);

    /// Mark cached results under `key` as stale and eagerly refetch them.
    async fn refetch(&self, key: CacheKey);
}

/// For callers that run the workflow without a UI cache attached.
pub struct NoopCache;

#[async_trait]
impl CacheInvalidator for NoopCache {
    async fn invalidate(&self, _key: CacheKey) {}

    async fn refetch(&self, _key: CacheKey) {}
}
