//! Spider expansion of an opened cluster
//!
//! Leaves are spread on one or two rings around the cluster center with a spoke from
//! the center to each leaf. Ring radii are expressed in meters and converted to degrees
//! at the center latitude, so the layout keeps its shape away from the equator.

use crate::{ClusterId, LEAF_FETCH_FAILED_MESSAGE, Leaf, Result, utils};
use geo::{Coord, Line};
use std::f64::consts::TAU;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Spider layout configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpiderConfig {
    /// Maximum number of leaves laid out at once
    pub max_leaves: usize,
    /// Above this many leaves, odd legs move to the outer ring
    pub crowded_threshold: usize,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            max_leaves: 80,
            crowded_threshold: 14,
        }
    }
}

/// Inner and outer ring radius in meters for `n` leaves
pub fn ring_radii(n: usize) -> (f64, f64) {
    let n = n as f64;
    let inner = (8.0 + 0.55 * n).clamp(12.0, 40.0);
    let outer = (18.0 + 0.7 * n).clamp(22.0, 65.0);
    (inner, outer)
}

/// One leg of the spider
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SpiderLeg {
    /// Index into [`Spider::leaves`]
    pub leaf_index: usize,
    /// Leg end in degrees (x = lon, y = lat)
    pub position: Coord<f64>,
    /// 1 for the inner ring, 2 for the outer ring
    pub ring: u8,
    pub angle: f64,
}

/// Lay out `n` legs around `center`
pub fn layout(center: Coord<f64>, n: usize, config: &SpiderConfig) -> Vec<SpiderLeg> {
    if n == 0 {
        return Vec::new();
    }
    let (inner, outer) = ring_radii(n);
    let crowded = n > config.crowded_threshold;
    let step = TAU / n as f64;

    (0..n)
        .map(|i| {
            let ring = if crowded && i % 2 == 1 { 2 } else { 1 };
            let radius = if ring == 2 { outer } else { inner };
            let angle = i as f64 * step;
            SpiderLeg {
                leaf_index: i,
                position: utils::offset_polar(center, radius, angle),
                ring,
                angle,
            }
        })
        .collect()
}

/// An opened cluster with its laid out leaves
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Spider {
    pub cluster_id: ClusterId,
    /// Cluster center in degrees
    pub center: Coord<f64>,
    pub leaves: Vec<Leaf>,
    pub legs: Vec<SpiderLeg>,
    /// Leaves available before the `max_leaves` cap
    pub total_leaves: usize,
}

impl Spider {
    /// Build a spider from the first `max_leaves` of `leaves`
    pub fn new(cluster_id: ClusterId, center: Coord<f64>, leaves: &[Leaf], config: &SpiderConfig) -> Self {
        let shown: Vec<Leaf> = leaves.iter().take(config.max_leaves).cloned().collect();
        let legs = layout(center, shown.len(), config);
        Self {
            cluster_id,
            center,
            leaves: shown,
            legs,
            total_leaves: leaves.len(),
        }
    }

    /// Legs paired with their leaves, the click targets of the spider
    pub fn point_features(&self) -> impl Iterator<Item = (&SpiderLeg, &Leaf)> {
        self.legs
            .iter()
            .filter_map(|leg| self.leaves.get(leg.leaf_index).map(|leaf| (leg, leaf)))
    }

    /// Spoke lines from the center to each leg
    pub fn spoke_features(&self) -> Vec<Line<f64>> {
        self.legs
            .iter()
            .map(|leg| Line::new(self.center, leg.position))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

/// Open spider plus the in-flight request that may replace it
#[derive(Clone, Debug, Default)]
pub struct SpiderState {
    config: SpiderConfig,
    generation: u64,
    pending: Option<PendingSpider>,
    spider: Option<Spider>,
    /// Every leaf fetched for the open spider, so filters can reach past the cap
    fetched: Option<Arc<[Leaf]>>,
    filter: String,
    error: Option<&'static str>,
}

#[derive(Clone, Copy, Debug)]
struct PendingSpider {
    generation: u64,
    cluster_id: ClusterId,
    center: Coord<f64>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl SpiderState {
    pub fn new(config: SpiderConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Start opening `cluster_id`; the currently open spider stays until completion
    pub fn begin(&mut self, cluster_id: ClusterId, center: Coord<f64>) -> u64 {
        self.generation += 1;
        self.pending = Some(PendingSpider {
            generation: self.generation,
            cluster_id,
            center,
        });
        self.error = None;
        self.generation
    }

    /// Finish the request `generation`; returns `false` if it was superseded
    ///
    /// On failure the previous spider is kept and the inline error is set.
    pub fn complete(&mut self, generation: u64, result: Result<Arc<[Leaf]>>) -> bool {
        let Some(pending) = self.pending.filter(|p| p.generation == generation) else {
            return false;
        };
        self.pending = None;

        match result {
            Ok(leaves) => {
                self.filter.clear();
                self.spider = Some(Spider::new(pending.cluster_id, pending.center, &leaves, &self.config));
                self.fetched = Some(leaves);
                self.error = None;
            }
            Err(err) => {
                tracing::warn!("Spider for cluster {} failed: {}", pending.cluster_id, err);
                self.error = Some(LEAF_FETCH_FAILED_MESSAGE);
            }
        }
        true
    }

    pub fn close(&mut self) {
        self.generation += 1;
        self.pending = None;
        self.spider = None;
        self.fetched = None;
        self.filter.clear();
        self.error = None;
    }

    /// Re-lay out the open spider with the leaves whose org name matches `query`
    pub fn set_filter(&mut self, query: &str) {
        self.filter = query.to_string();
        let (Some(spider), Some(fetched)) = (&self.spider, &self.fetched) else {
            return;
        };
        let matching: Vec<Leaf> = fetched.iter().filter(|leaf| leaf.matches(query)).cloned().collect();
        self.spider = Some(Spider::new(spider.cluster_id, spider.center, &matching, &self.config));
    }

    pub fn spider(&self) -> Option<&Spider> {
        self.spider.as_ref()
    }

    pub fn error(&self) -> Option<&'static str> {
        self.error
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Cluster of the open spider, or of the one being opened
    pub fn target(&self) -> Option<ClusterId> {
        self.pending
            .map(|p| p.cluster_id)
            .or_else(|| self.spider.as_ref().map(|s| s.cluster_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapError;
    use crate::point::test_point;

    fn leaves(n: usize) -> Arc<[Leaf]> {
        (0..n)
            .map(|i| Leaf::from(&test_point(&i.to_string(), 0.0, 0.0)))
            .collect::<Vec<_>>()
            .into()
    }

    fn distance_meters(center: Coord<f64>, p: Coord<f64>) -> f64 {
        let cos_lat = center.y.to_radians().cos().max(utils::MIN_LATITUDE_COSINE);
        let east = (p.x - center.x) * utils::METERS_PER_DEGREE * cos_lat;
        let north = (p.y - center.y) * utils::METERS_PER_DEGREE;
        east.hypot(north)
    }

    #[test]
    fn test_ring_radii() {
        assert_eq!(ring_radii(5), (12.0, 22.0));
        let (inner, outer) = ring_radii(20);
        assert!((inner - 19.0).abs() < 1e-9);
        assert!((outer - 32.0).abs() < 1e-9);
        assert_eq!(ring_radii(80), (40.0, 65.0));
    }

    #[test]
    fn test_small_spider_single_ring() {
        let center = Coord { x: -75.0, y: 40.0 };
        let legs = layout(center, 5, &SpiderConfig::default());
        assert_eq!(legs.len(), 5);
        for (i, leg) in legs.iter().enumerate() {
            assert_eq!(leg.ring, 1);
            assert!((leg.angle - i as f64 * TAU / 5.0).abs() < 1e-12);
            assert!((distance_meters(center, leg.position) - 12.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_crowded_spider_alternates_rings() {
        let center = Coord { x: 10.0, y: 50.0 };
        let legs = layout(center, 20, &SpiderConfig::default());
        for leg in &legs {
            let expected = if leg.leaf_index % 2 == 1 { (2, 32.0) } else { (1, 19.0) };
            assert_eq!(leg.ring, expected.0);
            assert!((distance_meters(center, leg.position) - expected.1).abs() < 1e-6);
        }
    }

    #[test]
    fn test_spider_caps_leaves() {
        let spider = Spider::new(ClusterId::from_u64(1), Coord { x: 0.0, y: 0.0 }, &leaves(120), &SpiderConfig::default());
        assert_eq!(spider.len(), 80);
        assert_eq!(spider.legs.len(), 80);
        assert_eq!(spider.total_leaves, 120);
        assert_eq!(spider.spoke_features().len(), 80);
        assert_eq!(spider.point_features().count(), 80);
    }

    #[test]
    fn test_spokes_start_at_center() {
        let center = Coord { x: 2.0, y: 48.0 };
        let spider = Spider::new(ClusterId::from_u64(1), center, &leaves(3), &SpiderConfig::default());
        for (spoke, leg) in spider.spoke_features().iter().zip(&spider.legs) {
            assert_eq!(spoke.start, center);
            assert_eq!(spoke.end, leg.position);
        }
    }

    #[test]
    fn test_state_open_and_filter() {
        let mut state = SpiderState::new(SpiderConfig::default());
        let generation = state.begin(ClusterId::from_u64(1), Coord { x: 0.0, y: 0.0 });
        assert!(state.is_loading());
        assert!(state.complete(generation, Ok(leaves(12))));
        assert!(!state.is_loading());
        assert_eq!(state.spider().unwrap().len(), 12);

        // "Org 1", "Org 10", "Org 11"
        state.set_filter("org 1");
        let filtered = state.spider().unwrap().clone();
        assert_eq!(filtered.len(), 3);
        assert_eq!(filtered.legs, layout(filtered.center, 3, &SpiderConfig::default()));

        state.set_filter("org 1");
        assert_eq!(state.spider().unwrap(), &filtered);

        state.set_filter("");
        assert_eq!(state.spider().unwrap().len(), 12);
    }

    #[test]
    fn test_state_discards_superseded_fetch() {
        let mut state = SpiderState::new(SpiderConfig::default());
        let first = state.begin(ClusterId::from_u64(1), Coord { x: 0.0, y: 0.0 });
        let second = state.begin(ClusterId::from_u64(2), Coord { x: 1.0, y: 1.0 });

        assert!(!state.complete(first, Ok(leaves(4))));
        assert!(state.spider().is_none());
        assert!(state.complete(second, Ok(leaves(2))));
        assert_eq!(state.spider().unwrap().cluster_id, ClusterId::from_u64(2));
    }

    #[test]
    fn test_state_failure_keeps_previous_spider() {
        let mut state = SpiderState::new(SpiderConfig::default());
        let generation = state.begin(ClusterId::from_u64(1), Coord { x: 0.0, y: 0.0 });
        state.complete(generation, Ok(leaves(4)));

        let generation = state.begin(ClusterId::from_u64(2), Coord { x: 5.0, y: 5.0 });
        assert!(state.complete(generation, Err(MapError::LeafFetch("x".to_string()))));
        assert_eq!(state.error(), Some(LEAF_FETCH_FAILED_MESSAGE));
        assert_eq!(state.spider().unwrap().cluster_id, ClusterId::from_u64(1));
        assert_eq!(state.spider().unwrap().len(), 4);
    }

    #[test]
    fn test_close_discards_late_fetch() {
        let mut state = SpiderState::new(SpiderConfig::default());
        let generation = state.begin(ClusterId::from_u64(1), Coord { x: 0.0, y: 0.0 });
        state.close();
        assert!(!state.complete(generation, Ok(leaves(4))));
        assert!(state.spider().is_none());
        assert_eq!(state.target(), None);
    }
}
