//! Org Map Library - Clustering, Jitter and Spider Expansion for Location Maps
//!
//! This library turns a directory of organization locations into an interactive map model:
//! raw rows are normalized into points, coincident points are spread apart for display,
//! points are clustered per zoom level, clusters can be previewed on hover or expanded into
//! a radial "spider", and selections are tracked at region/country/city/location granularity.
//!
//! # Architecture
//!
//! - **[`normalize`]**: Typed extraction of [`Point`]s from heterogeneous raw records
//! - **[`jitter`]**: Deterministic display offsets for points sharing a coordinate
//! - **[`ClusterIndex`]**: Per-zoom hierarchical clustering backed by point quadtrees
//! - **[`LeafCache`]**: Cluster id to leaf list memo, cleared on dataset change
//! - **[`HoverController`]**: Debounced, stale-safe hover previews
//! - **[`spider`]**: Radial leaf layout for an opened cluster
//! - **[`BoxSelection`]**: Screen rectangle to geographic selection
//! - **[`selection`]**: Hierarchical key sets and flat location id sets
//! - **[`LocationCollection`]**: High-level manager tying everything together
//!
//! # Performance Characteristics
//!
//! - **Build Time**: O(Z · N log N) for Z zoom levels
//! - **Query Time**: O(log N + K) per viewport where K=features returned

mod box_select;
mod cache;
mod collection;
mod hover;
mod index;
pub mod jitter;
pub mod normalize;
mod point;
mod quadtree;
mod resolver;
pub mod selection;
pub mod spider;
mod surface;
pub mod utils;

// Public API exports
pub use box_select::{BoxSelection, ScreenRect};
pub use cache::LeafCache;
pub use collection::{
    ClickOutcome, CollectionInfo, Config, ExplorerListener, LocationCollection, SelectionChange,
    SelectionMode,
};
pub use hover::{HoverConfig, HoverController, HoverMachine, HoverPhase, HoverSnapshot, HoverStep};
pub use index::{ClusterConfig, ClusterFeature, ClusterId, ClusterIndex, Feature, PointFeature};
pub use point::{JitteredPoint, Leaf, Point};
pub use resolver::{CallbackResolver, LeafCallback, LeafResolver};
pub use selection::{
    HierarchySelection, LocationSelection, NavigationPayload, NavigationSource, SelectionSummary,
};
pub use spider::{Spider, SpiderConfig, SpiderState};
pub use surface::{FeatureHit, MapSurface, Viewport};

/// Message shown inline when a cluster's leaves could not be resolved
pub const LEAF_FETCH_FAILED_MESSAGE: &str = "Couldn't load orgs in this cluster";

/// Error types for the map engine
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Leaf fetch failed: {0}")]
    LeafFetch(String),

    #[error("Unknown cluster: {0}")]
    UnknownCluster(ClusterId),

    #[error("Invalid cluster id: {0}")]
    InvalidClusterId(String),

    #[error("Leaf resolver dropped its callback without answering")]
    ResolverDropped,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MapError>;
