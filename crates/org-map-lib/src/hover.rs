//! Hover preview of cluster members
//!
//! [`HoverMachine`] is the synchronous state machine: every event either advances it or is
//! rejected as stale by comparing request generations. [`HoverController`] drives the
//! machine from async code, owning the debounce timer task and the leaf fetch.

use crate::{ClusterId, LEAF_FETCH_FAILED_MESSAGE, Leaf, LeafCache, LeafResolver, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Hover timing configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HoverConfig {
    /// Time the pointer must rest on a cluster before its leaves are requested
    pub debounce: Duration,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(180),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HoverPhase {
    #[default]
    Idle,
    Debouncing,
    Resolving,
    Previewing,
}

/// Observable hover state
#[derive(Clone, Debug, PartialEq)]
pub struct HoverSnapshot {
    pub phase: HoverPhase,
    pub cluster: Option<ClusterId>,
    pub leaves: Arc<[Leaf]>,
    /// Inline message when the leaf fetch failed
    pub error: Option<&'static str>,
}

impl HoverSnapshot {
    /// Preview rows whose org name contains `query` (case-insensitive)
    pub fn filtered(&self, query: &str) -> Vec<Leaf> {
        self.leaves.iter().filter(|leaf| leaf.matches(query)).cloned().collect()
    }
}

/// What the driver must do after the debounce timer fires
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoverStep {
    /// The timer belongs to a superseded request
    Stale,
    /// Leaves were cached and the preview is showing
    Previewing,
    /// Leaves must be resolved for this cluster
    Fetch(ClusterId),
}

/// Hover state machine
#[derive(Clone, Debug)]
pub struct HoverMachine {
    generation: u64,
    phase: HoverPhase,
    cluster: Option<ClusterId>,
    leaves: Arc<[Leaf]>,
    error: Option<&'static str>,
}

impl Default for HoverMachine {
    fn default() -> Self {
        Self {
            generation: 0,
            phase: HoverPhase::Idle,
            cluster: None,
            leaves: Vec::new().into(),
            error: None,
        }
    }
}

impl HoverMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> HoverPhase {
        self.phase
    }

    /// Pointer rests on `cluster`
    ///
    /// Returns the generation of the new debounce request, or `None` when the pointer
    /// is still on the cluster already being handled.
    pub fn pointer_enter(&mut self, cluster: ClusterId) -> Option<u64> {
        if self.phase != HoverPhase::Idle && self.cluster == Some(cluster) {
            return None;
        }
        self.generation += 1;
        self.phase = HoverPhase::Debouncing;
        self.cluster = Some(cluster);
        self.leaves = Vec::new().into();
        self.error = None;
        Some(self.generation)
    }

    /// Debounce timer for `generation` elapsed
    pub fn timer_fired(&mut self, generation: u64, cache: &LeafCache) -> HoverStep {
        if generation != self.generation || self.phase != HoverPhase::Debouncing {
            return HoverStep::Stale;
        }
        let Some(cluster) = self.cluster else {
            return HoverStep::Stale;
        };

        match cache.get(cluster) {
            Some(leaves) => {
                self.leaves = leaves;
                self.phase = HoverPhase::Previewing;
                HoverStep::Previewing
            }
            None => {
                self.phase = HoverPhase::Resolving;
                HoverStep::Fetch(cluster)
            }
        }
    }

    /// Leaf fetch for `generation` finished; returns `false` if the result was discarded
    pub fn resolved(&mut self, generation: u64, result: Result<Arc<[Leaf]>>) -> bool {
        if generation != self.generation || self.phase != HoverPhase::Resolving {
            return false;
        }
        match result {
            Ok(leaves) => {
                self.leaves = leaves;
                self.error = None;
            }
            Err(_) => {
                self.leaves = Vec::new().into();
                self.error = Some(LEAF_FETCH_FAILED_MESSAGE);
            }
        }
        self.phase = HoverPhase::Previewing;
        true
    }

    pub fn pointer_leave(&mut self) {
        self.reset();
    }

    /// Any pan or zoom start clears the preview
    pub fn view_change_start(&mut self) {
        self.reset();
    }

    pub fn snapshot(&self) -> HoverSnapshot {
        HoverSnapshot {
            phase: self.phase,
            cluster: self.cluster,
            leaves: Arc::clone(&self.leaves),
            error: self.error,
        }
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.phase = HoverPhase::Idle;
        self.cluster = None;
        self.leaves = Vec::new().into();
        self.error = None;
    }
}

/// Async driver for [`HoverMachine`]
///
/// At most one debounce/fetch task is alive at a time. It is aborted when superseded by
/// another cluster, on pointer leave, on view change start and when the controller is
/// dropped.
pub struct HoverController<R> {
    machine: Arc<Mutex<HoverMachine>>,
    resolver: Arc<R>,
    cache: Arc<LeafCache>,
    config: HoverConfig,
    leaf_limit: usize,
    pending: Option<JoinHandle<()>>,
}

impl<R: LeafResolver + 'static> HoverController<R> {
    pub fn new(resolver: Arc<R>, cache: Arc<LeafCache>, config: HoverConfig, leaf_limit: usize) -> Self {
        Self {
            machine: Arc::new(Mutex::new(HoverMachine::new())),
            resolver,
            cache,
            config,
            leaf_limit,
            pending: None,
        }
    }

    pub async fn pointer_enter(&mut self, cluster: ClusterId) {
        let Some(generation) = self.machine.lock().await.pointer_enter(cluster) else {
            return;
        };
        self.abort_pending();

        let machine = Arc::clone(&self.machine);
        let resolver = Arc::clone(&self.resolver);
        let cache = Arc::clone(&self.cache);
        let debounce = self.config.debounce;
        let leaf_limit = self.leaf_limit;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;

            let step = machine.lock().await.timer_fired(generation, &cache);
            let HoverStep::Fetch(cluster) = step else {
                return;
            };

            let result = cache.get_or_resolve(cluster, leaf_limit, resolver.as_ref()).await;
            if let Err(err) = &result {
                tracing::warn!("Hover preview for cluster {} failed: {}", cluster, err);
            }
            if !machine.lock().await.resolved(generation, result) {
                tracing::debug!("Discarded stale hover result for cluster {}", cluster);
            }
        }));
    }

    pub async fn pointer_leave(&mut self) {
        self.abort_pending();
        self.machine.lock().await.pointer_leave();
    }

    pub async fn view_change_start(&mut self) {
        self.abort_pending();
        self.machine.lock().await.view_change_start();
    }

    pub async fn snapshot(&self) -> HoverSnapshot {
        self.machine.lock().await.snapshot()
    }

    fn abort_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<R> Drop for HoverController<R> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapError;
    use crate::cache::tests::CountingResolver;
    use crate::point::test_point;
    use std::sync::atomic::Ordering;

    fn leaves(ids: &[&str]) -> Arc<[Leaf]> {
        ids.iter()
            .map(|id| Leaf::from(&test_point(id, 0.0, 0.0)))
            .collect::<Vec<_>>()
            .into()
    }

    fn controller() -> (HoverController<CountingResolver>, Arc<CountingResolver>, Arc<LeafCache>) {
        let resolver = Arc::new(CountingResolver::default());
        let cache = Arc::new(LeafCache::new());
        let hover = HoverController::new(Arc::clone(&resolver), Arc::clone(&cache), HoverConfig::default(), 50);
        (hover, resolver, cache)
    }

    #[test]
    fn test_machine_cache_miss_then_resolved() {
        let cache = LeafCache::new();
        let mut machine = HoverMachine::new();
        let a = ClusterId::from_u64(1);

        let generation = machine.pointer_enter(a).unwrap();
        assert_eq!(machine.phase(), HoverPhase::Debouncing);
        assert_eq!(machine.timer_fired(generation, &cache), HoverStep::Fetch(a));
        assert_eq!(machine.phase(), HoverPhase::Resolving);

        assert!(machine.resolved(generation, Ok(leaves(&["x", "y"]))));
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.phase, HoverPhase::Previewing);
        assert_eq!(snapshot.cluster, Some(a));
        assert_eq!(snapshot.leaves.len(), 2);
        assert_eq!(snapshot.error, None);
    }

    #[test]
    fn test_machine_cache_hit_previews_immediately() {
        let cache = LeafCache::new();
        let a = ClusterId::from_u64(1);
        cache.insert(a, leaves(&["x"]));

        let mut machine = HoverMachine::new();
        let generation = machine.pointer_enter(a).unwrap();
        assert_eq!(machine.timer_fired(generation, &cache), HoverStep::Previewing);
        assert_eq!(machine.snapshot().leaves.len(), 1);
    }

    #[test]
    fn test_machine_same_cluster_ignored() {
        let mut machine = HoverMachine::new();
        let a = ClusterId::from_u64(1);
        let generation = machine.pointer_enter(a).unwrap();
        assert_eq!(machine.pointer_enter(a), None);
        assert_eq!(machine.generation(), generation);
    }

    #[test]
    fn test_machine_stale_timer_and_result() {
        let cache = LeafCache::new();
        let mut machine = HoverMachine::new();
        let a = ClusterId::from_u64(1);
        let b = ClusterId::from_u64(2);

        let gen_a = machine.pointer_enter(a).unwrap();
        let gen_b = machine.pointer_enter(b).unwrap();
        assert_eq!(machine.timer_fired(gen_a, &cache), HoverStep::Stale);
        assert_eq!(machine.timer_fired(gen_b, &cache), HoverStep::Fetch(b));

        // A late answer for A must not replace B
        assert!(!machine.resolved(gen_a, Ok(leaves(&["a"]))));
        assert_eq!(machine.phase(), HoverPhase::Resolving);
        assert!(machine.resolved(gen_b, Ok(leaves(&["b"]))));
        assert_eq!(machine.snapshot().leaves[0].org_id, "b");
    }

    #[test]
    fn test_machine_result_after_view_change_dropped() {
        let cache = LeafCache::new();
        let mut machine = HoverMachine::new();
        let generation = machine.pointer_enter(ClusterId::from_u64(1)).unwrap();
        machine.timer_fired(generation, &cache);
        machine.view_change_start();

        assert!(!machine.resolved(generation, Ok(leaves(&["x"]))));
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.phase, HoverPhase::Idle);
        assert_eq!(snapshot.cluster, None);
        assert!(snapshot.leaves.is_empty());
    }

    #[test]
    fn test_machine_failure_sets_message() {
        let cache = LeafCache::new();
        let mut machine = HoverMachine::new();
        let a = ClusterId::from_u64(3);
        let generation = machine.pointer_enter(a).unwrap();
        machine.timer_fired(generation, &cache);

        assert!(machine.resolved(generation, Err(MapError::LeafFetch("down".to_string()))));
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.phase, HoverPhase::Previewing);
        assert_eq!(snapshot.cluster, Some(a));
        assert!(snapshot.leaves.is_empty());
        assert_eq!(snapshot.error, Some(LEAF_FETCH_FAILED_MESSAGE));
    }

    #[test]
    fn test_snapshot_filter() {
        let snapshot = HoverSnapshot {
            phase: HoverPhase::Previewing,
            cluster: None,
            leaves: leaves(&["alpha", "beta"]),
            error: None,
        };
        assert_eq!(snapshot.filtered("ALPHA").len(), 1);
        assert_eq!(snapshot.filtered("").len(), 2);
        assert!(snapshot.filtered("gamma").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_cluster_never_fetched() {
        let (mut hover, resolver, cache) = controller();
        let a = ClusterId::from_u64(10);
        let b = ClusterId::from_u64(20);

        hover.pointer_enter(a).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        hover.pointer_enter(b).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert!(cache.get(a).is_none());
        assert!(cache.get(b).is_some());

        let snapshot = hover.snapshot().await;
        assert_eq!(snapshot.phase, HoverPhase::Previewing);
        assert_eq!(snapshot.cluster, Some(b));
        assert_eq!(snapshot.leaves.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_fetched_before_debounce() {
        let (mut hover, resolver, _cache) = controller();
        hover.pointer_enter(ClusterId::from_u64(1)).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(hover.snapshot().await.phase, HoverPhase::Debouncing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_change_cancels_pending_hover() {
        let (mut hover, resolver, _cache) = controller();
        hover.pointer_enter(ClusterId::from_u64(1)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        hover.view_change_start().await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(hover.snapshot().await.phase, HoverPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pointer_leave_clears_preview() {
        let (mut hover, _resolver, _cache) = controller();
        hover.pointer_enter(ClusterId::from_u64(1)).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(hover.snapshot().await.phase, HoverPhase::Previewing);

        hover.pointer_leave().await;
        let snapshot = hover.snapshot().await;
        assert_eq!(snapshot.phase, HoverPhase::Idle);
        assert!(snapshot.leaves.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_cluster_skips_resolver() {
        let (mut hover, resolver, cache) = controller();
        let a = ClusterId::from_u64(4);
        cache.insert(a, leaves(&["cached"]));

        hover.pointer_enter(a).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        let snapshot = hover.snapshot().await;
        assert_eq!(snapshot.phase, HoverPhase::Previewing);
        assert_eq!(snapshot.leaves[0].org_id, "cached");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_shows_message_without_retry() {
        let (mut hover, resolver, cache) = controller();
        resolver.fail.store(true, Ordering::SeqCst);
        let a = ClusterId::from_u64(6);

        hover.pointer_enter(a).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let snapshot = hover.snapshot().await;
        assert_eq!(snapshot.phase, HoverPhase::Previewing);
        assert_eq!(snapshot.cluster, Some(a));
        assert_eq!(snapshot.error, Some(LEAF_FETCH_FAILED_MESSAGE));
        assert!(cache.is_empty());

        // Resting on the same cluster does not trigger another attempt
        hover.pointer_enter(a).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_pending_debounce() {
        let (mut hover, resolver, cache) = controller();
        hover.pointer_enter(ClusterId::from_u64(9)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        drop(hover);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty());
    }
}
