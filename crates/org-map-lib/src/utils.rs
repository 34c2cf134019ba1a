//! Utility functions for coordinate conversions and local metric offsets

use geo::Coord;
use std::f64::consts::{FRAC_PI_2, PI};

/// Highest latitude the Web Mercator square covers
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Meters per degree of latitude in the local equirectangular approximation
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Floor for `cos(lat)` so longitude deltas stay bounded near the poles
pub const MIN_LATITUDE_COSINE: f64 = 0.2;

/// Convert a lon/lat coordinate to normalized world space.
///
/// World space is the Web Mercator square scaled to `[0, 1]` on both axes,
/// with `x` growing east and `y` growing south (screen orientation).
/// Latitudes beyond [`MAX_LATITUDE`] land on the square's edge.
#[inline]
pub fn lon_lat_to_world(lon_lat: Coord<f64>) -> Coord<f64> {
    let sin_lat = lon_lat.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians().sin();
    let y = 0.5 - 0.25 * ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / PI;
    Coord {
        x: (lon_lat.x / 360.0 + 0.5).clamp(0.0, 1.0),
        y: y.clamp(0.0, 1.0),
    }
}

/// Inverse of [`lon_lat_to_world`]
#[inline]
pub fn world_to_lon_lat(world: Coord<f64>) -> Coord<f64> {
    let y = (180.0 - world.y * 360.0).to_radians();
    Coord {
        x: (world.x - 0.5) * 360.0,
        y: 2.0_f64.mul_add(y.exp().atan(), -FRAC_PI_2).to_degrees(),
    }
}

/// Convert an east/north offset in meters to a (Δlon, Δlat) delta in degrees
///
/// Uses a local equirectangular approximation around `reference_lat`:
/// `Δlat = north / 111320` and `Δlon = east / (111320 · cos(lat))`,
/// with `cos(lat)` floored at [`MIN_LATITUDE_COSINE`].
#[inline]
pub fn meters_to_degrees(reference_lat: f64, east: f64, north: f64) -> (f64, f64) {
    let cos_lat = reference_lat.to_radians().cos().max(MIN_LATITUDE_COSINE);
    (
        east / (METERS_PER_DEGREE * cos_lat),
        north / METERS_PER_DEGREE,
    )
}

/// Move `center` (lon/lat) by `distance` meters along `angle` radians
///
/// The angle is measured counter-clockwise from east. The conversion uses the
/// latitude of `center` for the metric scale.
#[inline]
pub fn offset_polar(center: Coord<f64>, distance: f64, angle: f64) -> Coord<f64> {
    let (d_lon, d_lat) = meters_to_degrees(center.y, distance * angle.cos(), distance * angle.sin());
    Coord {
        x: center.x + d_lon,
        y: center.y + d_lat,
    }
}

/// Wrap a longitude into `[-180, 180)`
#[inline]
pub fn wrap_longitude(lon: f64) -> f64 {
    ((lon + 180.0) % 360.0 + 360.0) % 360.0 - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_space_latitude_limit() {
        let top = lon_lat_to_world(Coord { x: -180.0, y: 89.0 });
        assert!(top.x.abs() < 1e-12);
        assert!(top.y.abs() < 1e-6);

        let back = world_to_lon_lat(Coord { x: 0.0, y: 0.0 });
        assert!((back.y - MAX_LATITUDE).abs() < 1e-6);
    }

    #[test]
    fn test_world_space_orientation() {
        let center = lon_lat_to_world(Coord { x: 0.0, y: 0.0 });
        assert!((center.x - 0.5).abs() < 1e-9);
        assert!((center.y - 0.5).abs() < 1e-9);

        // North is up, so a northern point has a smaller y
        let north = lon_lat_to_world(Coord { x: 0.0, y: 45.0 });
        assert!(north.y < 0.5);

        let east = lon_lat_to_world(Coord { x: 90.0, y: 0.0 });
        assert!((east.x - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_world_space_inverse() {
        let original = Coord { x: -75.0, y: 40.0 };
        let back = world_to_lon_lat(lon_lat_to_world(original));
        assert!((back.x - original.x).abs() < 1e-9);
        assert!((back.y - original.y).abs() < 1e-9);
    }

    #[test]
    fn test_meters_to_degrees_equator() {
        let (d_lon, d_lat) = meters_to_degrees(0.0, METERS_PER_DEGREE, METERS_PER_DEGREE);
        assert!((d_lon - 1.0).abs() < 1e-12);
        assert!((d_lat - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_meters_to_degrees_polar_floor() {
        // cos(89°) is ~0.017, floored to 0.2
        let (d_lon, _) = meters_to_degrees(89.0, METERS_PER_DEGREE, 0.0);
        assert!((d_lon - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_offset_polar_north() {
        let center = Coord { x: 10.0, y: 20.0 };
        let moved = offset_polar(center, 111.32, std::f64::consts::FRAC_PI_2);
        assert!((moved.x - 10.0).abs() < 1e-12);
        assert!((moved.y - 20.001).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_longitude() {
        assert_eq!(wrap_longitude(0.0), 0.0);
        assert_eq!(wrap_longitude(190.0), -170.0);
        assert_eq!(wrap_longitude(-190.0), 170.0);
        assert_eq!(wrap_longitude(180.0), -180.0);
    }
}
