//! Memo of resolved cluster leaves

use crate::{ClusterId, Leaf, LeafResolver, Result};
use dashmap::DashMap;
use std::sync::Arc;

/// Concurrent `cluster id → leaves` memo for the current dataset
///
/// Entries are only ever added until [`LeafCache::clear`] is called on dataset change.
/// Cluster ids embed the index generation, so ids from a previous dataset can never
/// alias a fresh entry even before the cache is cleared.
#[derive(Debug, Default)]
pub struct LeafCache {
    entries: DashMap<ClusterId, Arc<[Leaf]>>,
}

impl LeafCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cluster_id: ClusterId) -> Option<Arc<[Leaf]>> {
        self.entries.get(&cluster_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn insert(&self, cluster_id: ClusterId, leaves: Arc<[Leaf]>) {
        self.entries.insert(cluster_id, leaves);
    }

    /// Cached leaves for `cluster_id`, resolving and storing them on a miss
    ///
    /// Failures are returned to the caller and not stored.
    pub async fn get_or_resolve<R: LeafResolver>(
        &self,
        cluster_id: ClusterId,
        limit: usize,
        resolver: &R,
    ) -> Result<Arc<[Leaf]>> {
        if let Some(leaves) = self.get(cluster_id) {
            return Ok(leaves);
        }

        let leaves: Arc<[Leaf]> = resolver.resolve_leaves(cluster_id, limit, 0).await?.into();
        tracing::debug!("Cached {} leaves for cluster {}", leaves.len(), cluster_id);
        self.insert(cluster_id, Arc::clone(&leaves));
        Ok(leaves)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
