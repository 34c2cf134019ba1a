//! Performance benchmarks for org-map-lib
//!
//! Run with: cargo bench --package org-map-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use org_map_lib::{Config, LocationCollection, normalize, utils};
use serde_json::{Value, json};

/// Generate raw directory records scattered over a few metro areas.
///
/// Every tenth record reuses the previous coordinate so jitter groups exist.
fn generate_records(num_records: usize) -> Vec<Value> {
    const METROS: [(f64, f64); 4] = [(40.71, -74.0), (51.5, -0.12), (48.85, 2.35), (35.68, 139.69)];

    let mut previous = (0.0, 0.0);
    (0..num_records)
        .map(|i| {
            let (lat, lon) = if i % 10 == 9 {
                previous
            } else {
                let (base_lat, base_lon) = METROS[i % METROS.len()];
                let t = i as f64 / num_records as f64;
                (
                    base_lat + (t * 977.0).sin() * 0.5,
                    base_lon + (t * 613.0).cos() * 0.5,
                )
            };
            previous = (lat, lon);
            json!({
                "orgId": i.to_string(),
                "orgName": format!("Org {i}"),
                "salesRegion": "NA",
                "countryName": "US",
                "latitude": lat,
                "longitude": lon,
                "locationId": format!("loc-{i}"),
            })
        })
        .collect()
}

fn loaded_collection(num_records: usize) -> LocationCollection {
    let mut collection = LocationCollection::new(Config::default());
    collection.load_records(&generate_records(num_records));
    collection
}

// ============================================================================
// Core Benchmarks - Key performance indicators
// ============================================================================

fn bench_query_performance(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let collection = loaded_collection(50_000);

    // Whole world at low zoom (overview)
    group.bench_function("world_zoom_2_50k", |b| {
        b.iter(|| collection.query_visible([-180.0, -85.0, 180.0, 85.0], 2.0));
    });

    // City-sized viewport (detailed view)
    group.bench_function("city_zoom_12_50k", |b| {
        b.iter(|| collection.query_visible([-74.3, 40.5, -73.7, 40.9], 12.0));
    });

    // Viewport crossing the antimeridian
    group.bench_function("antimeridian_zoom_4_50k", |b| {
        b.iter(|| collection.query_visible([120.0, 0.0, -150.0, 60.0], 4.0));
    });

    group.finish();
}

fn bench_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction");
    group.sample_size(20);

    for size in [10_000usize, 50_000] {
        let records = generate_records(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("load_records", size), &records, |b, records| {
            let config = Config::default();
            b.iter(|| {
                let mut collection = LocationCollection::new(config.clone());
                collection.load_records(records);
            });
        });
    }

    let records = generate_records(50_000);
    group.throughput(Throughput::Elements(50_000));
    group.bench_function("normalize_50k", |b| {
        b.iter(|| normalize::normalize_records(&records));
    });

    group.finish();
}

fn bench_cluster_drilldown(c: &mut Criterion) {
    let mut group = c.benchmark_group("drilldown");
    let collection = loaded_collection(50_000);
    let index = collection.index();
    let clusters: Vec<_> = collection
        .query_visible([-180.0, -85.0, 180.0, 85.0], 3.0)
        .iter()
        .filter_map(|feature| feature.cluster_id())
        .collect();

    group.bench_function("expansion_zoom", |b| {
        b.iter(|| {
            clusters
                .iter()
                .map(|&id| index.get_cluster_expansion_zoom(id))
                .count()
        });
    });

    group.bench_function("leaves_first_500", |b| {
        b.iter(|| {
            clusters
                .iter()
                .map(|&id| index.get_cluster_leaves(id, 500, 0).len())
                .sum::<usize>()
        });
    });

    group.finish();
}

fn bench_collection_info(c: &mut Criterion) {
    let mut group = c.benchmark_group("info");
    let collection = loaded_collection(50_000);

    group.bench_function("get_info", |b| {
        b.iter(|| collection.info());
    });

    group.bench_function("bounding_box", |b| {
        b.iter(|| collection.bounding_box_wgs84());
    });

    group.bench_function("mercator_world_roundtrip", |b| {
        b.iter(|| {
            let world = utils::lon_lat_to_world(geo::Coord { x: 2.35, y: 48.85 });
            utils::world_to_lon_lat(world)
        });
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(
    benches,
    bench_query_performance,
    bench_construction,
    bench_cluster_drilldown,
    bench_collection_info,
);

criterion_main!(benches);
