//! Cluster index
//!
//! Hierarchical greedy clustering of points over integer zoom levels. The finest level
//! (`max_zoom + 1`) holds the raw points; each coarser level is produced by merging the
//! nodes of the level below that fall within the screen-space clustering radius of a
//! seed node. Every level keeps a [`Quadtree`] so viewport and radius queries stay cheap.
//!
//! Clustering runs on true coordinates. Jittered positions are only reported on
//! singleton features.

use crate::quadtree::Quadtree;
use crate::{JitteredPoint, Leaf, MapError, utils};
use geo::{Coord, Rect};
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Highest zoom the id encoding can represent (5 bits, one reserved for the raw level)
const MAX_SUPPORTED_ZOOM: u8 = 30;

/// Marker for nodes not yet visited by the clustering pass
const UNVISITED: u8 = u8::MAX;

const ZOOM_BITS: u32 = 5;
const INDEX_BITS: u32 = 35;
const GENERATION_SHIFT: u32 = ZOOM_BITS + INDEX_BITS;
const ZOOM_MASK: u64 = (1 << ZOOM_BITS) - 1;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: u32 = (1 << 24) - 1;

/// Process-wide index generation, so cluster ids are never reused across rebuilds
static NEXT_GENERATION: AtomicU32 = AtomicU32::new(1);

fn next_generation() -> u32 {
    loop {
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed) & GENERATION_MASK;
        // Generation 0 is reserved for the never-built index
        if generation != 0 {
            return generation;
        }
    }
}

/// Clustering parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterConfig {
    /// Cluster radius in pixels at tile `extent`
    pub radius: f64,
    /// Tile extent the radius is expressed in
    pub extent: f64,
    /// Lowest zoom level that gets a clustered level
    pub min_zoom: u8,
    /// Highest zoom level that clusters; above it raw points are returned
    pub max_zoom: u8,
    /// Minimum number of points forming a cluster
    pub min_points: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius: 52.0,
            extent: 512.0,
            min_zoom: 0,
            max_zoom: 16,
            min_points: 2,
        }
    }
}

impl ClusterConfig {
    /// Clustering radius at `zoom` in normalized world units
    #[inline]
    fn world_radius(&self, zoom: u8) -> f64 {
        self.radius / (self.extent * 2f64.powi(i32::from(zoom)))
    }
}

/// Identifier of a cluster within one index build
///
/// Encodes the index generation, the zoom at which the cluster was formed and the
/// position of its seed node one level finer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ClusterId(u64);

impl ClusterId {
    fn new(generation: u32, seed_index: usize, zoom: u8) -> Self {
        Self(
            (u64::from(generation & GENERATION_MASK) << GENERATION_SHIFT)
                | (((seed_index as u64) & INDEX_MASK) << ZOOM_BITS)
                | (u64::from(zoom) & ZOOM_MASK),
        )
    }

    /// Reconstruct an id from its raw value
    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Generation of the index build that produced this id
    pub fn generation(self) -> u32 {
        (self.0 >> GENERATION_SHIFT) as u32
    }

    /// Zoom level at which the cluster was formed
    pub fn zoom(self) -> u8 {
        (self.0 & ZOOM_MASK) as u8
    }

    fn seed_index(self) -> usize {
        ((self.0 >> ZOOM_BITS) & INDEX_MASK) as usize
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClusterId {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(ClusterId)
            .map_err(|_| MapError::InvalidClusterId(s.to_string()))
    }
}

/// A clustered marker
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ClusterFeature {
    pub cluster_id: ClusterId,
    /// Weighted centroid of the member points (x = lon, y = lat)
    pub centroid: Coord<f64>,
    pub point_count: usize,
    pub point_count_abbreviated: String,
}

/// A single, unclustered point marker
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PointFeature {
    /// Index into the index's point set
    pub index: usize,
    /// Display position after jitter (x = lon, y = lat)
    pub position: Coord<f64>,
    pub coincident_group_size: usize,
    pub leaf: Leaf,
}

/// Result item of a viewport query
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "camelCase"))]
pub enum Feature {
    Cluster(ClusterFeature),
    Point(PointFeature),
}

impl Feature {
    /// Position at which the feature is drawn
    pub fn position(&self) -> Coord<f64> {
        match self {
            Feature::Cluster(cluster) => cluster.centroid,
            Feature::Point(point) => point.position,
        }
    }

    /// Number of points represented by the feature
    pub fn point_count(&self) -> usize {
        match self {
            Feature::Cluster(cluster) => cluster.point_count,
            Feature::Point(_) => 1,
        }
    }

    pub fn cluster_id(&self) -> Option<ClusterId> {
        match self {
            Feature::Cluster(cluster) => Some(cluster.cluster_id),
            Feature::Point(_) => None,
        }
    }
}

/// Human-friendly point count ("950", "1.2k", "12k")
pub fn abbreviate_count(count: usize) -> String {
    if count >= 10_000 {
        format!("{}k", (count as f64 / 1000.0).round())
    } else if count >= 1_000 {
        format!("{}k", (count as f64 / 100.0).round() / 10.0)
    } else {
        count.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeKind {
    Point(usize),
    Cluster(ClusterId),
}

#[derive(Debug, Clone)]
struct ClusterNode {
    /// Position in normalized world space
    position: Coord<f64>,
    /// Zoom at which the clustering pass consumed this node
    visited_zoom: u8,
    parent: Option<ClusterId>,
    num_points: usize,
    kind: NodeKind,
}

impl ClusterNode {
    /// Copy of this node for the next coarser level
    fn carried(&self) -> Self {
        Self {
            visited_zoom: UNVISITED,
            parent: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone)]
struct Level {
    nodes: Vec<ClusterNode>,
    tree: Quadtree,
}

impl Level {
    fn new(nodes: Vec<ClusterNode>) -> Self {
        let tree = Quadtree::from_items(nodes.iter().enumerate().map(|(i, n)| (i, n.position)));
        Self { nodes, tree }
    }

    fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// Spatial clustering index over one point set
#[derive(Debug, Clone)]
pub struct ClusterIndex {
    config: ClusterConfig,
    generation: u32,
    points: Arc<[JitteredPoint]>,
    /// Levels indexed by zoom; `levels[max_zoom + 1]` holds the raw points
    levels: Vec<Level>,
}

impl Default for ClusterIndex {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ClusterIndex {
    /// An index that has not been built; every query returns nothing
    pub fn empty() -> Self {
        Self {
            config: ClusterConfig::default(),
            generation: 0,
            points: Arc::from(Vec::new()),
            levels: Vec::new(),
        }
    }

    /// Build the index for a point set
    pub fn build(points: Arc<[JitteredPoint]>, config: ClusterConfig) -> Self {
        #[cfg(feature = "profiling")]
        profiling::scope!("index::build");

        let mut config = config;
        config.max_zoom = config.max_zoom.min(MAX_SUPPORTED_ZOOM);
        config.min_zoom = config.min_zoom.min(config.max_zoom);
        let generation = next_generation();

        let raw_nodes: Vec<ClusterNode> = points
            .par_iter()
            .enumerate()
            .map(|(i, p)| ClusterNode {
                position: utils::lon_lat_to_world(p.point.coord()),
                visited_zoom: UNVISITED,
                parent: None,
                num_points: 1,
                kind: NodeKind::Point(i),
            })
            .collect();

        let raw_level = usize::from(config.max_zoom) + 1;
        let mut levels: Vec<Level> = (0..raw_level).map(|_| Level::empty()).collect();
        levels.push(Level::new(raw_nodes));

        for zoom in (config.min_zoom..=config.max_zoom).rev() {
            let z = usize::from(zoom);
            let nodes = Self::cluster_level(&mut levels[z + 1], zoom, generation, &config);
            levels[z] = Level::new(nodes);
        }

        tracing::debug!(
            "Built cluster index generation {} over {} points ({} nodes at zoom {})",
            generation,
            points.len(),
            levels[usize::from(config.min_zoom)].tree.len(),
            config.min_zoom
        );

        Self {
            config,
            generation,
            points,
            levels,
        }
    }

    /// Merge the nodes of `finer` into the node list of the level at `zoom`
    fn cluster_level(
        finer: &mut Level,
        zoom: u8,
        generation: u32,
        config: &ClusterConfig,
    ) -> Vec<ClusterNode> {
        let radius = config.world_radius(zoom);
        let mut next = Vec::new();

        for i in 0..finer.nodes.len() {
            if finer.nodes[i].visited_zoom <= zoom {
                continue;
            }
            finer.nodes[i].visited_zoom = zoom;

            let seed = finer.nodes[i].position;
            let seed_points = finer.nodes[i].num_points;
            let neighbors = finer.tree.within(seed, radius);

            let num_points = seed_points
                + neighbors
                    .iter()
                    .map(|&n| &finer.nodes[n])
                    .filter(|node| node.visited_zoom > zoom)
                    .map(|node| node.num_points)
                    .sum::<usize>();

            if num_points > seed_points && num_points >= config.min_points {
                let id = ClusterId::new(generation, i, zoom);
                let mut wx = seed.x * seed_points as f64;
                let mut wy = seed.y * seed_points as f64;

                for &n in &neighbors {
                    let node = &mut finer.nodes[n];
                    if node.visited_zoom <= zoom {
                        continue;
                    }
                    node.visited_zoom = zoom;
                    node.parent = Some(id);
                    wx += node.position.x * node.num_points as f64;
                    wy += node.position.y * node.num_points as f64;
                }
                finer.nodes[i].parent = Some(id);

                next.push(ClusterNode {
                    position: Coord {
                        x: wx / num_points as f64,
                        y: wy / num_points as f64,
                    },
                    visited_zoom: UNVISITED,
                    parent: None,
                    num_points,
                    kind: NodeKind::Cluster(id),
                });
            } else {
                next.push(finer.nodes[i].carried());

                // Too few points for a cluster: neighbors are carried over individually
                if num_points > seed_points {
                    for &n in &neighbors {
                        let node = &mut finer.nodes[n];
                        if node.visited_zoom <= zoom {
                            continue;
                        }
                        node.visited_zoom = zoom;
                        next.push(node.carried());
                    }
                }
            }
        }

        next
    }

    /// Whether the index holds a built point set
    #[inline]
    pub fn is_ready(&self) -> bool {
        !self.levels.is_empty()
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[inline]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// The indexed points, in dataset order
    #[inline]
    pub fn points(&self) -> &[JitteredPoint] {
        &self.points
    }

    /// Shared handle to the indexed points
    #[inline]
    pub fn points_arc(&self) -> Arc<[JitteredPoint]> {
        self.points.clone()
    }

    /// Level index used for a (possibly fractional) map zoom
    fn limit_zoom(&self, zoom: f64) -> usize {
        let min = f64::from(self.config.min_zoom);
        let max = f64::from(self.config.max_zoom) + 1.0;
        if zoom.is_nan() {
            return self.config.min_zoom as usize;
        }
        zoom.floor().clamp(min, max) as usize
    }

    /// Clusters and points visible in `bbox` (`[west, south, east, north]` degrees) at `zoom`
    pub fn get_clusters(&self, bbox: [f64; 4], zoom: f64) -> Vec<Feature> {
        if !self.is_ready() || bbox.iter().any(|v| !v.is_finite()) {
            return Vec::new();
        }

        let [west, south, east, north] = bbox;
        let mut min_lng = utils::wrap_longitude(west);
        let min_lat = south.clamp(-90.0, 90.0);
        let mut max_lng = if east == 180.0 {
            180.0
        } else {
            utils::wrap_longitude(east)
        };
        let max_lat = north.clamp(-90.0, 90.0);

        if east - west >= 360.0 {
            min_lng = -180.0;
            max_lng = 180.0;
        } else if min_lng > max_lng {
            // Viewport crosses the antimeridian
            let mut features = self.get_clusters([min_lng, min_lat, 180.0, max_lat], zoom);
            features.extend(self.get_clusters([-180.0, min_lat, max_lng, max_lat], zoom));
            return features;
        }

        let level = &self.levels[self.limit_zoom(zoom)];
        let area = Rect::new(
            utils::lon_lat_to_world(Coord {
                x: min_lng,
                y: max_lat,
            }),
            utils::lon_lat_to_world(Coord {
                x: max_lng,
                y: min_lat,
            }),
        );

        level
            .tree
            .range(area)
            .into_iter()
            .map(|i| self.feature(&level.nodes[i]))
            .collect()
    }

    fn feature(&self, node: &ClusterNode) -> Feature {
        match node.kind {
            NodeKind::Cluster(cluster_id) => Feature::Cluster(ClusterFeature {
                cluster_id,
                centroid: utils::world_to_lon_lat(node.position),
                point_count: node.num_points,
                point_count_abbreviated: abbreviate_count(node.num_points),
            }),
            NodeKind::Point(index) => {
                let point = &self.points[index];
                Feature::Point(PointFeature {
                    index,
                    position: point.visual_coord(),
                    coincident_group_size: point.coincident_group_size,
                    leaf: Leaf::from(&point.point),
                })
            }
        }
    }

    /// Level holding the children of `cluster_id`, if the id belongs to this build
    fn origin_level(&self, cluster_id: ClusterId) -> Option<&Level> {
        if !self.is_ready() || cluster_id.generation() != self.generation {
            return None;
        }
        let level = self.levels.get(usize::from(cluster_id.zoom()) + 1)?;
        let seed = level.nodes.get(cluster_id.seed_index())?;
        (seed.parent == Some(cluster_id)).then_some(level)
    }

    fn child_nodes(&self, cluster_id: ClusterId) -> Vec<&ClusterNode> {
        let Some(level) = self.origin_level(cluster_id) else {
            return Vec::new();
        };
        let seed = &level.nodes[cluster_id.seed_index()];
        let radius = self.config.world_radius(cluster_id.zoom());

        let mut children: Vec<usize> = level
            .tree
            .within(seed.position, radius)
            .into_iter()
            .filter(|&n| level.nodes[n].parent == Some(cluster_id))
            .collect();
        children.sort_unstable();
        children.into_iter().map(|n| &level.nodes[n]).collect()
    }

    /// Direct children of a cluster, one zoom level finer
    pub fn get_children(&self, cluster_id: ClusterId) -> Vec<Feature> {
        self.child_nodes(cluster_id)
            .into_iter()
            .map(|node| self.feature(node))
            .collect()
    }

    /// Cluster feature for an id, reconstructed from its children
    pub fn get_cluster(&self, cluster_id: ClusterId) -> Option<ClusterFeature> {
        let children = self.child_nodes(cluster_id);
        if children.is_empty() {
            return None;
        }
        let point_count: usize = children.iter().map(|c| c.num_points).sum();
        let (wx, wy) = children.iter().fold((0.0, 0.0), |(wx, wy), c| {
            (
                wx + c.position.x * c.num_points as f64,
                wy + c.position.y * c.num_points as f64,
            )
        });
        Some(ClusterFeature {
            cluster_id,
            centroid: utils::world_to_lon_lat(Coord {
                x: wx / point_count as f64,
                y: wy / point_count as f64,
            }),
            point_count,
            point_count_abbreviated: abbreviate_count(point_count),
        })
    }

    /// Minimum zoom at which the cluster splits into more than one child
    pub fn get_cluster_expansion_zoom(&self, cluster_id: ClusterId) -> Option<u8> {
        self.origin_level(cluster_id)?;

        let mut expansion_zoom = cluster_id.zoom();
        let mut current = cluster_id;
        while expansion_zoom <= self.config.max_zoom {
            let children = self.child_nodes(current);
            expansion_zoom += 1;
            if children.len() != 1 {
                break;
            }
            match children[0].kind {
                NodeKind::Cluster(child) => current = child,
                NodeKind::Point(_) => break,
            }
        }
        Some(expansion_zoom)
    }

    /// Member leaves of a cluster, depth-first, paged by `offset` and `limit`
    pub fn get_cluster_leaves(&self, cluster_id: ClusterId, limit: usize, offset: usize) -> Vec<Leaf> {
        let mut leaves = Vec::new();
        if limit > 0 {
            self.append_leaves(&mut leaves, cluster_id, limit, offset, 0);
        }
        leaves
    }

    fn append_leaves(
        &self,
        out: &mut Vec<Leaf>,
        cluster_id: ClusterId,
        limit: usize,
        offset: usize,
        mut skipped: usize,
    ) -> usize {
        for child in self.child_nodes(cluster_id) {
            match child.kind {
                NodeKind::Cluster(inner) => {
                    if skipped + child.num_points <= offset {
                        skipped += child.num_points;
                    } else {
                        skipped = self.append_leaves(out, inner, limit, offset, skipped);
                    }
                }
                NodeKind::Point(index) => {
                    if skipped < offset {
                        skipped += 1;
                    } else {
                        out.push(Leaf::from(&self.points[index].point));
                    }
                }
            }
            if out.len() >= limit {
                break;
            }
        }
        skipped
    }
}
