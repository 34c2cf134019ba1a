//! Coincidence jitter
//!
//! Points that share the exact same (rounded) coordinate would stack into one
//! unclickable marker. This module spreads each such group evenly around a small
//! ring whose orientation is derived from a hash of the coordinate, so the same
//! input always produces the same layout. Only the visual position changes.

use crate::{JitteredPoint, Point, utils};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::f64::consts::TAU;

/// Decimal places kept when deciding that two coordinates coincide
const KEY_PRECISION: f64 = 1e6;

/// Ring radius bounds and growth per member, in meters
const MIN_RING_RADIUS: f64 = 6.0;
const MAX_RING_RADIUS: f64 = 18.0;
const RING_RADIUS_PER_POINT: f64 = 0.35;

/// Ring radius in meters for a coincident group of `n` points
#[inline]
pub fn ring_radius(n: usize) -> f64 {
    (MIN_RING_RADIUS + RING_RADIUS_PER_POINT * n as f64).clamp(MIN_RING_RADIUS, MAX_RING_RADIUS)
}

/// Grouping key for a coordinate, stable across `-0.0`/`0.0`
pub fn group_key(lat: f64, lon: f64) -> String {
    let lat = (lat * KEY_PRECISION).round() as i64;
    let lon = (lon * KEY_PRECISION).round() as i64;
    format!("{lat}:{lon}")
}

/// Deterministic base angle in `[0, 2π)` for a group key (FNV-1a 32-bit)
pub fn base_angle(key: &str) -> f64 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in key.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    f64::from(hash) / (f64::from(u32::MAX) + 1.0) * TAU
}

/// Apply coincidence jitter to a point set
///
/// Output order matches input order. Singletons are returned unshifted with a group
/// size of 1. Members of a group are ordered by identity before being assigned ring
/// slots, so the layout does not depend on input order.
pub fn apply_jitter(points: Vec<Point>) -> Vec<JitteredPoint> {
    #[cfg(feature = "profiling")]
    profiling::scope!("jitter::apply_jitter");

    let mut groups: HashMap<String, SmallVec<[usize; 4]>> = HashMap::new();
    for (i, point) in points.iter().enumerate() {
        groups
            .entry(group_key(point.latitude, point.longitude))
            .or_default()
            .push(i);
    }

    let mut jittered: Vec<JitteredPoint> = points.into_iter().map(JitteredPoint::unshifted).collect();

    let mut coincident_groups = 0usize;
    for (key, mut members) in groups {
        let n = members.len();
        if n < 2 {
            continue;
        }
        coincident_groups += 1;

        members.sort_by(|&a, &b| {
            let (pa, pb) = (&jittered[a].point, &jittered[b].point);
            pa.location_id
                .cmp(&pb.location_id)
                .then_with(|| pa.org_id.cmp(&pb.org_id))
                .then_with(|| pa.org_name.cmp(&pb.org_name))
                .then_with(|| a.cmp(&b))
        });

        let radius = ring_radius(n);
        let base = base_angle(&key);
        let step = TAU / n as f64;

        for (slot, &index) in members.iter().enumerate() {
            let target = &mut jittered[index];
            let visual = utils::offset_polar(target.point.coord(), radius, base + slot as f64 * step);
            target.visual_longitude = visual.x;
            target.visual_latitude = visual.y;
            target.coincident_group_size = n;
        }
    }

    if coincident_groups > 0 {
        tracing::debug!("Jittered {} coincident groups", coincident_groups);
    }

    jittered
}
