//! Host map surface capability
//!
//! Interaction code never talks to a renderer directly. It goes through [`MapSurface`],
//! which any host can implement; [`Viewport`] is a self-contained Web Mercator
//! implementation used by the explorer CLI and tests.

use crate::{ClusterId, Feature, Spider, utils};
use geo::Coord;

/// Screen/geo conversion, camera control and hit testing provided by the host
pub trait MapSurface {
    /// Lon/lat (degrees) to screen pixels
    fn project(&self, lon_lat: Coord<f64>) -> Coord<f64>;

    /// Screen pixels to lon/lat (degrees)
    fn unproject(&self, screen: Coord<f64>) -> Coord<f64>;

    /// Move the camera
    fn fly_to(&mut self, center: Coord<f64>, zoom: f64);

    /// Rendered features under a screen position, topmost first
    fn query_features(&self, screen: Coord<f64>) -> Vec<FeatureHit>;

    /// Current zoom level
    fn zoom(&self) -> f64;
}

/// A rendered feature found by [`MapSurface::query_features`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureHit {
    Cluster(ClusterId),
    /// Index into the collection's points
    Point(usize),
    /// Index into the open spider's leaves
    SpiderLeg(usize),
}

/// Web Mercator viewport with pixel hit testing
#[derive(Clone, Debug)]
pub struct Viewport {
    /// Camera center in degrees (x = lon, y = lat)
    pub center: Coord<f64>,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
    /// Pixel size of one tile at zoom 0
    pub tile_size: f64,
    /// Maximum distance in pixels between a query position and a hit feature
    pub hit_radius: f64,
    rendered: Vec<(FeatureHit, Coord<f64>)>,
    spider_legs: Vec<(FeatureHit, Coord<f64>)>,
}

impl Viewport {
    pub fn new(center: Coord<f64>, zoom: f64, width: f64, height: f64) -> Self {
        Self {
            center,
            zoom,
            width,
            height,
            tile_size: 512.0,
            hit_radius: 12.0,
            rendered: Vec::new(),
            spider_legs: Vec::new(),
        }
    }

    /// Visible area as `[west, south, east, north]` in degrees
    pub fn bounds(&self) -> [f64; 4] {
        let top_left = self.unproject(Coord { x: 0.0, y: 0.0 });
        let bottom_right = self.unproject(Coord {
            x: self.width,
            y: self.height,
        });
        [top_left.x, bottom_right.y, bottom_right.x, top_left.y]
    }

    /// Register the features currently drawn, replacing the previous set
    pub fn set_rendered(&mut self, features: &[Feature]) {
        self.rendered = features
            .iter()
            .map(|feature| {
                let hit = match feature {
                    Feature::Cluster(cluster) => FeatureHit::Cluster(cluster.cluster_id),
                    Feature::Point(point) => FeatureHit::Point(point.index),
                };
                (hit, feature.position())
            })
            .collect();
    }

    /// Register the legs of the open spider, drawn above everything else
    pub fn set_spider(&mut self, spider: Option<&Spider>) {
        self.spider_legs = spider
            .map(|spider| {
                spider
                    .legs
                    .iter()
                    .map(|leg| (FeatureHit::SpiderLeg(leg.leaf_index), leg.position))
                    .collect()
            })
            .unwrap_or_default();
    }

    fn scale(&self) -> f64 {
        self.tile_size * self.zoom.exp2()
    }

    fn hits_in(&self, layer: &[(FeatureHit, Coord<f64>)], screen: Coord<f64>) -> Vec<(f64, FeatureHit)> {
        layer
            .iter()
            .filter_map(|(hit, position)| {
                let p = self.project(*position);
                let distance = (p.x - screen.x).hypot(p.y - screen.y);
                (distance <= self.hit_radius).then_some((distance, *hit))
            })
            .collect()
    }
}

impl MapSurface for Viewport {
    fn project(&self, lon_lat: Coord<f64>) -> Coord<f64> {
        let world = utils::lon_lat_to_world(lon_lat);
        let center = utils::lon_lat_to_world(self.center);
        let scale = self.scale();
        Coord {
            x: (world.x - center.x) * scale + self.width / 2.0,
            y: (world.y - center.y) * scale + self.height / 2.0,
        }
    }

    fn unproject(&self, screen: Coord<f64>) -> Coord<f64> {
        let center = utils::lon_lat_to_world(self.center);
        let scale = self.scale();
        utils::world_to_lon_lat(Coord {
            x: (center.x + (screen.x - self.width / 2.0) / scale).clamp(0.0, 1.0),
            y: (center.y + (screen.y - self.height / 2.0) / scale).clamp(0.0, 1.0),
        })
    }

    fn fly_to(&mut self, center: Coord<f64>, zoom: f64) {
        tracing::debug!("Flying to ({:.5}, {:.5}) at zoom {}", center.x, center.y, zoom);
        self.center = center;
        self.zoom = zoom;
    }

    fn query_features(&self, screen: Coord<f64>) -> Vec<FeatureHit> {
        let mut legs = self.hits_in(&self.spider_legs, screen);
        let mut features = self.hits_in(&self.rendered, screen);
        legs.sort_by(|a, b| a.0.total_cmp(&b.0));
        features.sort_by(|a, b| a.0.total_cmp(&b.0));
        legs.into_iter().chain(features).map(|(_, hit)| hit).collect()
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }
}
