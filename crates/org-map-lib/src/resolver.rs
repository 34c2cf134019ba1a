//! Cluster leaf resolution
//!
//! [`LeafResolver`] is the seam between the interactive controllers and whatever can
//! enumerate a cluster's members. The [`ClusterIndex`] resolves from its own levels;
//! [`CallbackResolver`] adapts a host-provided `(id, limit, offset, callback)` function.

use crate::{ClusterId, ClusterIndex, Leaf, MapError, Result};
use std::future::Future;
use tokio::sync::oneshot;

/// Asynchronous source of cluster member leaves
pub trait LeafResolver: Send + Sync {
    /// Resolve up to `limit` leaves of `cluster_id`, skipping the first `offset`
    fn resolve_leaves(
        &self,
        cluster_id: ClusterId,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<Leaf>>> + Send;
}

impl LeafResolver for ClusterIndex {
    fn resolve_leaves(
        &self,
        cluster_id: ClusterId,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<Leaf>>> + Send {
        std::future::ready(Ok(self.get_cluster_leaves(cluster_id, limit, offset)))
    }
}

/// Completion callback handed to a [`CallbackResolver`] function
pub type LeafCallback = Box<dyn FnOnce(Result<Vec<Leaf>>) + Send>;

/// Adapter for callback-style resolvers
///
/// The wrapped function receives `(cluster_id, limit, offset, callback)` and must call
/// `callback` exactly once, either synchronously or later from any thread. Dropping the
/// callback without calling it resolves to [`MapError::ResolverDropped`].
pub struct CallbackResolver<F> {
    resolve: F,
}

impl<F> CallbackResolver<F>
where
    F: Fn(ClusterId, usize, usize, LeafCallback) + Send + Sync,
{
    pub fn new(resolve: F) -> Self {
        Self { resolve }
    }
}

impl<F> LeafResolver for CallbackResolver<F>
where
    F: Fn(ClusterId, usize, usize, LeafCallback) + Send + Sync,
{
    fn resolve_leaves(
        &self,
        cluster_id: ClusterId,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<Leaf>>> + Send {
        let (tx, rx) = oneshot::channel();
        (self.resolve)(
            cluster_id,
            limit,
            offset,
            Box::new(move |result| {
                // The receiver is gone if the caller stopped waiting
                let _ = tx.send(result);
            }),
        );
        async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(MapError::ResolverDropped),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::test_point;

    fn leaf(id: &str) -> Leaf {
        Leaf::from(&test_point(id, 0.0, 0.0))
    }

    #[tokio::test]
    async fn test_callback_resolver_sync_answer() {
        let resolver = CallbackResolver::new(|id: ClusterId, limit: usize, offset: usize, done: LeafCallback| {
            assert_eq!(id.as_u64(), 9);
            assert_eq!((limit, offset), (5, 2));
            done(Ok(vec![leaf("a")]));
        });
        let leaves = resolver
            .resolve_leaves(ClusterId::from_u64(9), 5, 2)
            .await
            .unwrap();
        assert_eq!(leaves, vec![leaf("a")]);
    }

    #[tokio::test]
    async fn test_callback_resolver_deferred_answer() {
        let resolver = CallbackResolver::new(|_: ClusterId, _: usize, _: usize, done: LeafCallback| {
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                done(Ok(vec![leaf("late")]));
            });
        });
        let leaves = resolver
            .resolve_leaves(ClusterId::from_u64(1), 10, 0)
            .await
            .unwrap();
        assert_eq!(leaves[0].org_id, "late");
    }

    #[tokio::test]
    async fn test_callback_resolver_error() {
        let resolver = CallbackResolver::new(|_: ClusterId, _: usize, _: usize, done: LeafCallback| {
            done(Err(MapError::LeafFetch("boom".to_string())));
        });
        let result = resolver.resolve_leaves(ClusterId::from_u64(1), 10, 0).await;
        assert!(matches!(result, Err(MapError::LeafFetch(_))));
    }

    #[tokio::test]
    async fn test_callback_resolver_dropped() {
        let resolver = CallbackResolver::new(|_: ClusterId, _: usize, _: usize, done: LeafCallback| drop(done));
        let result = resolver.resolve_leaves(ClusterId::from_u64(1), 10, 0).await;
        assert!(matches!(result, Err(MapError::ResolverDropped)));
    }

    #[tokio::test]
    async fn test_index_resolver_unknown_cluster_is_empty() {
        let index = ClusterIndex::empty();
        let leaves = index
            .resolve_leaves(ClusterId::from_u64(42), 10, 0)
            .await
            .unwrap();
        assert!(leaves.is_empty());
    }
}
