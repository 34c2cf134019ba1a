//! Location point records
//!
//! This module provides the immutable [`Point`] produced by normalization, its
//! display-only [`JitteredPoint`] counterpart, and the denormalized [`Leaf`] row
//! used by hover lists and spider layouts.

use geo::Coord;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single organization location with validated coordinates
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Point {
    pub org_id: String,
    pub org_name: String,
    pub sales_region: String,
    pub country_name: String,
    /// City is frequently unknown in directory data and never used for identity
    pub city: Option<String>,
    /// Latitude in degrees, always finite
    pub latitude: f64,
    /// Longitude in degrees, always finite
    pub longitude: f64,
    #[cfg_attr(feature = "serde", serde(rename = "isHQ"))]
    pub is_hq: bool,
    /// Stable identity, `None` when the source had no usable id
    pub location_id: Option<String>,
}

impl Point {
    /// True coordinate as a geo coordinate (x = lon, y = lat)
    #[inline]
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }

    /// The stable id if it can be used for identity-based selection
    #[inline]
    pub fn stable_id(&self) -> Option<&str> {
        self.location_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// A point plus its display position after coincidence jitter
///
/// The visual coordinates are cosmetic. Distances, bounding boxes, selection keys
/// and navigation payloads must read [`JitteredPoint::point`] instead.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct JitteredPoint {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub point: Point,
    pub visual_longitude: f64,
    pub visual_latitude: f64,
    /// Number of points sharing this exact coordinate (1 for singletons)
    pub coincident_group_size: usize,
}

impl JitteredPoint {
    /// Wrap a point without any offset
    pub fn unshifted(point: Point) -> Self {
        Self {
            visual_longitude: point.longitude,
            visual_latitude: point.latitude,
            point,
            coincident_group_size: 1,
        }
    }

    /// Display coordinate (x = lon, y = lat)
    #[inline]
    pub fn visual_coord(&self) -> Coord<f64> {
        Coord {
            x: self.visual_longitude,
            y: self.visual_latitude,
        }
    }
}

/// Denormalized row describing one member of a cluster
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Leaf {
    pub org_id: String,
    pub org_name: String,
    pub sales_region: String,
    pub country_name: String,
    pub city: Option<String>,
    #[cfg_attr(feature = "serde", serde(rename = "isHQ"))]
    pub is_hq: bool,
    pub location_id: Option<String>,
}

impl Leaf {
    /// Case-insensitive substring match on the org name
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        query.is_empty() || self.org_name.to_lowercase().contains(&query.to_lowercase())
    }
}

impl From<&Point> for Leaf {
    fn from(point: &Point) -> Self {
        Self {
            org_id: point.org_id.clone(),
            org_name: point.org_name.clone(),
            sales_region: point.sales_region.clone(),
            country_name: point.country_name.clone(),
            city: point.city.clone(),
            is_hq: point.is_hq,
            location_id: point.stable_id().map(str::to_owned),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_point(org_id: &str, lat: f64, lon: f64) -> Point {
    Point {
        org_id: org_id.to_string(),
        org_name: format!("Org {org_id}"),
        sales_region: "NA".to_string(),
        country_name: "US".to_string(),
        city: Some("Austin".to_string()),
        latitude: lat,
        longitude: lon,
        is_hq: false,
        location_id: Some(format!("loc-{org_id}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_id_ignores_empty() {
        let mut point = test_point("1", 0.0, 0.0);
        assert_eq!(point.stable_id(), Some("loc-1"));

        point.location_id = Some(String::new());
        assert_eq!(point.stable_id(), None);
    }

    #[test]
    fn test_leaf_from_point() {
        let point = test_point("7", 40.0, -75.0);
        let leaf = Leaf::from(&point);
        assert_eq!(leaf.org_id, "7");
        assert_eq!(leaf.org_name, "Org 7");
        assert_eq!(leaf.location_id.as_deref(), Some("loc-7"));
    }

    #[test]
    fn test_leaf_matches_query() {
        let leaf = Leaf::from(&test_point("7", 40.0, -75.0));
        assert!(leaf.matches("org"));
        assert!(leaf.matches("ORG 7"));
        assert!(leaf.matches("  "));
        assert!(!leaf.matches("acme"));
    }

    #[test]
    fn test_unshifted_keeps_coordinates() {
        let jittered = JitteredPoint::unshifted(test_point("1", 1.5, 2.5));
        assert_eq!(jittered.visual_coord(), Coord { x: 2.5, y: 1.5 });
        assert_eq!(jittered.coincident_group_size, 1);
    }
}
