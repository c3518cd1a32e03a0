use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::hub::models::HubSnapshot;

/// Latest hub snapshot plus the wall-clock time it was fetched.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks.
/// Uses `tokio::sync::RwLock` so concurrent readers never block each other;
/// a refresh swaps the whole snapshot in one write.
#[derive(Clone, Default)]
pub struct SnapshotCache {
    inner: Arc<RwLock<Option<Cached>>>,
}

#[derive(Clone)]
struct Cached {
    snapshot: Arc<HubSnapshot>,
    fetched_at: DateTime<Utc>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached snapshot wholesale.
    pub async fn replace(&self, snapshot: HubSnapshot) {
        *self.inner.write().await = Some(Cached {
            snapshot: Arc::new(snapshot),
            fetched_at: Utc::now(),
        });
    }

    /// The current snapshot, or `None` before the first successful fetch.
    pub async fn current(&self) -> Option<Arc<HubSnapshot>> {
        self.inner.read().await.as_ref().map(|c| Arc::clone(&c.snapshot))
    }

    /// When the current snapshot was fetched.
    pub async fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.as_ref().map(|c| c.fetched_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_snapshot;

    #[tokio::test]
    async fn empty_cache_returns_nothing() {
        let cache = SnapshotCache::new();
        assert!(cache.current().await.is_none());
        assert!(cache.fetched_at().await.is_none());
    }

    #[tokio::test]
    async fn replace_then_read() {
        let cache = SnapshotCache::new();
        cache.replace(sample_snapshot()).await;

        let got = cache.current().await.unwrap();
        assert_eq!(*got, sample_snapshot());
        assert!(cache.fetched_at().await.is_some());
    }

    #[tokio::test]
    async fn replace_supersedes_previous_snapshot() {
        let cache = SnapshotCache::new();
        cache.replace(sample_snapshot()).await;
        let first = cache.current().await.unwrap();

        cache.replace(HubSnapshot::default()).await;
        let second = cache.current().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.devices.is_empty());
        // Readers holding the old snapshot keep a consistent view.
        assert_eq!(first.devices.len(), 5);
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let cache = SnapshotCache::new();
        let clone = cache.clone();

        cache.replace(sample_snapshot()).await;

        assert!(clone.current().await.is_some());
    }
}
