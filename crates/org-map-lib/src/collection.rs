//! LocationCollection - Top-level manager for points, clusters and interaction state
//!
//! This module provides the high-level API a map host talks to: loading a dataset,
//! querying visible features, and routing hover, click, spider and box-selection events
//! into the two selection models.

use crate::normalize::normalize_records;
use crate::selection::{HierarchySelection, LocationSelection, NavigationPayload, NavigationSource};
use crate::{
    BoxSelection, ClusterConfig, ClusterId, ClusterIndex, Feature, FeatureHit, HoverConfig,
    HoverController, HoverSnapshot, JitteredPoint, Leaf, LeafCache, LeafResolver, MapSurface, Point,
    Result, ScreenRect, SelectionSummary, Spider, SpiderConfig, SpiderState, jitter,
};

use geo::Coord;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

/// Configuration for the location collection
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    pub cluster: ClusterConfig,
    pub hover: HoverConfig,
    pub spider: SpiderConfig,
    /// Maximum number of leaves requested per cluster by hover previews and spiders.
    /// Both fill the same cache, so they share one limit.
    /// Default: 500
    pub leaf_fetch_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster: ClusterConfig::default(),
            hover: HoverConfig::default(),
            spider: SpiderConfig::default(),
            leaf_fetch_limit: 500,
        }
    }
}

/// Information about the loaded dataset
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CollectionInfo {
    /// Number of points with usable coordinates
    pub point_count: usize,
    /// Number of raw records dropped during normalization
    pub dropped_records: usize,
    /// Number of points sharing their coordinate with at least one other point
    pub coincident_points: usize,
    /// Generation of the current cluster index (0 before the first load)
    pub index_generation: u32,
}

/// Contents of a selection after it changed
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum SelectionChange {
    Hierarchy(SelectionSummary),
    Locations(Vec<String>),
}

/// Which selection model a navigation request reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Hierarchy,
    Locations,
}

/// Callbacks fired by the collection
pub trait ExplorerListener: Send + Sync {
    /// A selection's summarized contents changed
    fn on_selection_change(&self, _change: &SelectionChange) {}

    /// The user asked to view the orgs matching a selection
    fn on_view_orgs(&self, _payload: &NavigationPayload) {}
}

/// Result of a click on the map
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "action", rename_all = "camelCase"))]
pub enum ClickOutcome {
    /// Nothing clickable under the pointer
    Nothing,
    /// The camera moved to where the cluster splits
    #[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
    FlyTo {
        cluster_id: ClusterId,
        center: Coord<f64>,
        zoom: u8,
    },
    /// The cluster can no longer split and was expanded into a spider
    SpiderOpened { cluster: ClusterId },
    /// The spider's leaves could not be resolved
    SpiderFailed { cluster: ClusterId },
    /// A point was clicked and its location toggled
    Point { index: usize },
    /// A spider leaf was clicked and its location toggled
    SpiderLeaf { index: usize },
}

/// Where hover previews and spiders get their leaves from
enum LeafSource<R> {
    /// The current cluster index
    Index(Arc<ClusterIndex>),
    /// A resolver supplied by the host
    Host(Arc<R>),
}

impl<R: LeafResolver> LeafResolver for LeafSource<R> {
    fn resolve_leaves(
        &self,
        cluster_id: ClusterId,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<Leaf>>> + Send {
        async move {
            match self {
                LeafSource::Index(index) => index.resolve_leaves(cluster_id, limit, offset).await,
                LeafSource::Host(host) => host.resolve_leaves(cluster_id, limit, offset).await,
            }
        }
    }
}

/// Top-level manager for a location dataset and its map interaction state
///
/// Leaves are resolved from the cluster index unless a host resolver is supplied with
/// [`LocationCollection::with_resolver`].
pub struct LocationCollection<R = ClusterIndex> {
    config: Config,
    index: Arc<ClusterIndex>,
    host_resolver: Option<Arc<R>>,
    dropped_records: usize,
    cache: Arc<LeafCache>,
    hover: HoverController<LeafSource<R>>,
    spider: SpiderState,
    box_selection: BoxSelection,
    hierarchy: HierarchySelection,
    locations: LocationSelection,
    listeners: Vec<Arc<dyn ExplorerListener>>,
}

impl LocationCollection {
    /// Create an empty collection resolving leaves from its own cluster index
    pub fn new(config: Config) -> Self {
        Self::build(config, None)
    }
}

impl<R: LeafResolver + 'static> LocationCollection<R> {
    /// Create an empty collection resolving leaves through `resolver`
    pub fn with_resolver(config: Config, resolver: Arc<R>) -> Self {
        Self::build(config, Some(resolver))
    }

    fn build(config: Config, host_resolver: Option<Arc<R>>) -> Self {
        let index = Arc::new(ClusterIndex::empty());
        let cache = Arc::new(LeafCache::new());
        let hover = HoverController::new(
            Arc::new(Self::leaf_source(&index, host_resolver.as_ref())),
            Arc::clone(&cache),
            config.hover.clone(),
            config.leaf_fetch_limit,
        );
        Self {
            spider: SpiderState::new(config.spider.clone()),
            config,
            index,
            host_resolver,
            dropped_records: 0,
            cache,
            hover,
            box_selection: BoxSelection::new(),
            hierarchy: HierarchySelection::new(),
            locations: LocationSelection::new(),
            listeners: Vec::new(),
        }
    }

    fn leaf_source(index: &Arc<ClusterIndex>, host_resolver: Option<&Arc<R>>) -> LeafSource<R> {
        match host_resolver {
            Some(host) => LeafSource::Host(Arc::clone(host)),
            None => LeafSource::Index(Arc::clone(index)),
        }
    }

    /// Replace the dataset with raw records
    pub fn load_records(&mut self, records: &[Value]) -> CollectionInfo {
        #[cfg(feature = "profiling")]
        profiling::scope!("collection::load_records");

        let normalized = normalize_records(records);
        self.rebuild(normalized.points, normalized.dropped)
    }

    /// Replace the dataset with already normalized points
    pub fn load_points(&mut self, points: Vec<Point>) -> CollectionInfo {
        self.rebuild(points, 0)
    }

    /// Replace the dataset with the JSON array of records stored at `path`
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<CollectionInfo> {
        #[cfg(feature = "profiling")]
        profiling::scope!("collection::load_from_file");

        let file = std::fs::File::open(path.as_ref())?;
        let reader = std::io::BufReader::new(file);
        let records: Vec<Value> = serde_json::from_reader(reader)?;
        Ok(self.load_records(&records))
    }

    fn rebuild(&mut self, points: Vec<Point>, dropped_records: usize) -> CollectionInfo {
        let jittered: Arc<[JitteredPoint]> = jitter::apply_jitter(points).into();
        self.index = Arc::new(ClusterIndex::build(jittered, self.config.cluster.clone()));
        self.dropped_records = dropped_records;

        // Everything tied to the previous point set goes away with it
        self.cache.clear();
        self.hover = HoverController::new(
            Arc::new(Self::leaf_source(&self.index, self.host_resolver.as_ref())),
            Arc::clone(&self.cache),
            self.config.hover.clone(),
            self.config.leaf_fetch_limit,
        );
        self.spider.close();
        self.box_selection.clear();

        let info = self.info();
        tracing::info!(
            "Loaded {} points ({} records dropped, {} coincident)",
            info.point_count,
            info.dropped_records,
            info.coincident_points
        );
        info
    }

    /// Get collection information
    pub fn info(&self) -> CollectionInfo {
        let points = self.index.points();
        CollectionInfo {
            point_count: points.len(),
            dropped_records: self.dropped_records,
            coincident_points: points.iter().filter(|p| p.coincident_group_size > 1).count(),
            index_generation: self.index.generation(),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn index(&self) -> &ClusterIndex {
        &self.index
    }

    #[inline]
    pub fn points(&self) -> &[JitteredPoint] {
        self.index.points()
    }

    #[inline]
    pub fn cache(&self) -> &LeafCache {
        &self.cache
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.points().is_empty()
    }

    /// Bounding box of the true coordinates as `[west, south, east, north]`
    ///
    /// Returns `None` if no points are loaded.
    pub fn bounding_box_wgs84(&self) -> Option<[f64; 4]> {
        let mut points = self.index.points().iter().map(|p| &p.point);
        let first = points.next()?;
        let init = [first.longitude, first.latitude, first.longitude, first.latitude];
        Some(points.fold(init, |[w, s, e, n], p| {
            [
                w.min(p.longitude),
                s.min(p.latitude),
                e.max(p.longitude),
                n.max(p.latitude),
            ]
        }))
    }

    /// Center of the bounding box (x = lon, y = lat)
    #[inline]
    pub fn center_wgs84(&self) -> Option<Coord<f64>> {
        self.bounding_box_wgs84().map(|[w, s, e, n]| Coord {
            x: (w + e) / 2.0,
            y: (s + n) / 2.0,
        })
    }

    /// Clusters and points visible in `bbox` (`[west, south, east, north]`) at `zoom`
    #[inline]
    pub fn query_visible(&self, bbox: [f64; 4], zoom: f64) -> Vec<Feature> {
        #[cfg(feature = "profiling")]
        profiling::scope!("collection::query_visible");

        self.index.get_clusters(bbox, zoom)
    }

    /// Register a listener for selection and navigation events
    pub fn add_listener(&mut self, listener: Arc<dyn ExplorerListener>) {
        self.listeners.push(listener);
    }

    // --- Clicks and spider ---

    /// Handle a click on whatever the surface reports under `screen`
    pub async fn click_at(&mut self, surface: &mut dyn MapSurface, screen: Coord<f64>) -> ClickOutcome {
        let hit = surface.query_features(screen).into_iter().next();
        match hit {
            Some(FeatureHit::Cluster(cluster_id)) => self.handle_cluster_click(cluster_id, Some(surface)).await,
            Some(FeatureHit::Point(index)) => {
                let location_id = self
                    .index
                    .points()
                    .get(index)
                    .and_then(|p| p.point.stable_id())
                    .map(str::to_owned);
                if let Some(location_id) = location_id {
                    self.toggle_location(&location_id);
                }
                ClickOutcome::Point { index }
            }
            Some(FeatureHit::SpiderLeg(index)) => {
                let location_id = self
                    .spider
                    .spider()
                    .and_then(|spider| spider.leaves.get(index))
                    .and_then(|leaf| leaf.location_id.clone());
                if let Some(location_id) = location_id {
                    self.toggle_location(&location_id);
                }
                ClickOutcome::SpiderLeaf { index }
            }
            None => ClickOutcome::Nothing,
        }
    }

    /// Zoom into a cluster, or expand it into a spider once it cannot split any further
    ///
    /// The camera only moves when the cluster splits within the index zoom range and the
    /// surface is not already at that zoom. Without a surface the fly-to is skipped.
    pub async fn handle_cluster_click(
        &mut self,
        cluster_id: ClusterId,
        surface: Option<&mut dyn MapSurface>,
    ) -> ClickOutcome {
        let Some(cluster) = self.index.get_cluster(cluster_id) else {
            tracing::debug!("Ignoring click on unknown cluster {}", cluster_id);
            return ClickOutcome::Nothing;
        };

        if let Some(zoom) = self.index.get_cluster_expansion_zoom(cluster_id) {
            let current_zoom = surface.as_ref().map(|s| s.zoom());
            let splits_in_range = zoom <= self.config.cluster.max_zoom;
            if splits_in_range && current_zoom.is_none_or(|current| f64::from(zoom) > current) {
                if let Some(surface) = surface {
                    surface.fly_to(cluster.centroid, f64::from(zoom));
                }
                return ClickOutcome::FlyTo {
                    cluster_id,
                    center: cluster.centroid,
                    zoom,
                };
            }
        }

        self.open_spider(cluster_id, cluster.centroid).await
    }

    /// Resolve a cluster's leaves and lay them out as a spider around `center`
    pub async fn open_spider(&mut self, cluster_id: ClusterId, center: Coord<f64>) -> ClickOutcome {
        let generation = self.spider.begin(cluster_id, center);
        let source = Self::leaf_source(&self.index, self.host_resolver.as_ref());
        let result = self
            .cache
            .get_or_resolve(cluster_id, self.config.leaf_fetch_limit, &source)
            .await;
        self.spider.complete(generation, result);

        if self.spider.error().is_some() {
            ClickOutcome::SpiderFailed { cluster: cluster_id }
        } else {
            ClickOutcome::SpiderOpened { cluster: cluster_id }
        }
    }

    pub fn close_spider(&mut self) {
        self.spider.close();
    }

    /// Re-lay out the open spider with the leaves matching `query`
    pub fn set_spider_filter(&mut self, query: &str) {
        self.spider.set_filter(query);
    }

    pub fn spider(&self) -> Option<&Spider> {
        self.spider.spider()
    }

    pub fn spider_state(&self) -> &SpiderState {
        &self.spider
    }

    // --- Hover ---

    pub async fn hover_enter(&mut self, cluster_id: ClusterId) {
        self.hover.pointer_enter(cluster_id).await;
    }

    pub async fn hover_leave(&mut self) {
        self.hover.pointer_leave().await;
    }

    /// Hover whatever cluster the surface reports under `screen`
    pub async fn hover_at(&mut self, surface: &dyn MapSurface, screen: Coord<f64>) {
        let cluster = surface.query_features(screen).into_iter().find_map(|hit| match hit {
            FeatureHit::Cluster(id) => Some(id),
            _ => None,
        });
        match cluster {
            Some(cluster_id) => self.hover.pointer_enter(cluster_id).await,
            None => self.hover.pointer_leave().await,
        }
    }

    pub async fn hover_snapshot(&self) -> HoverSnapshot {
        self.hover.snapshot().await
    }

    /// Pan or zoom started: cancels hover, leaves the spider open
    pub async fn view_change_start(&mut self) {
        self.hover.view_change_start().await;
    }

    // --- Box selection ---

    pub fn set_box_modifier(&mut self, held: bool) {
        self.box_selection.set_modifier(held);
    }

    pub fn box_drag_start(&mut self, screen: Coord<f64>) -> bool {
        self.box_selection.drag_start(screen)
    }

    pub fn box_drag_move(&mut self, screen: Coord<f64>) {
        self.box_selection.drag_move(screen);
    }

    pub fn box_overlay(&self) -> Option<ScreenRect> {
        self.box_selection.overlay()
    }

    pub fn box_captures_pointer(&self) -> bool {
        self.box_selection.captures_pointer()
    }

    /// Finish a box drag; the picked points replace the location selection
    ///
    /// Returns the indices of the picked points, or `None` if nothing happened.
    pub fn box_drag_end(&mut self, screen: Coord<f64>, surface: Option<&dyn MapSurface>) -> Option<Vec<usize>> {
        let picked = self
            .box_selection
            .drag_end(screen, surface, self.index.points())?
            .to_vec();

        let ids: Vec<String> = picked
            .iter()
            .filter_map(|&i| self.index.points()[i].point.stable_id())
            .map(str::to_owned)
            .collect();
        let before = self.locations.clone();
        self.locations.replace(ids);
        if self.locations != before {
            self.notify_locations();
        }
        Some(picked)
    }

    // --- Selection ---

    pub fn hierarchy(&self) -> &HierarchySelection {
        &self.hierarchy
    }

    pub fn locations(&self) -> &LocationSelection {
        &self.locations
    }

    /// Toggle a `region||country||city` key; `None` if the key is not hierarchical
    pub fn toggle_key(&mut self, key: &str) -> Option<bool> {
        let selected = self.hierarchy.toggle(key)?;
        self.notify(&SelectionChange::Hierarchy(self.hierarchy.summarize()));
        Some(selected)
    }

    pub fn toggle_location(&mut self, location_id: &str) -> bool {
        let before = self.locations.len();
        let selected = self.locations.toggle(location_id);
        if self.locations.len() != before {
            self.notify_locations();
        }
        selected
    }

    pub fn clear_selection(&mut self) {
        if !self.hierarchy.is_empty() {
            self.hierarchy.clear();
            self.notify(&SelectionChange::Hierarchy(SelectionSummary::default()));
        }
        if !self.locations.is_empty() {
            self.locations.clear();
            self.notify_locations();
        }
    }

    /// Build the navigation payload for `mode` and hand it to the listeners
    pub fn view_orgs(&self, mode: SelectionMode) -> NavigationPayload {
        let payload = match mode {
            SelectionMode::Hierarchy => self.hierarchy.navigation_payload(),
            SelectionMode::Locations => self.locations.navigation_payload(),
        };
        for listener in &self.listeners {
            listener.on_view_orgs(&payload);
        }
        payload
    }

    fn notify_locations(&self) {
        self.notify(&SelectionChange::Locations(self.locations.ids()));
    }

    fn notify(&self, change: &SelectionChange) {
        for listener in &self.listeners {
            listener.on_selection_change(change);
        }
    }
}
