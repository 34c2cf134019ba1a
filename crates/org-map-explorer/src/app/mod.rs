//! Command execution for the explorer
//!
//! Every command loads the dataset, drives the collection the way a map host would and
//! prints one JSON document to stdout.

pub mod settings;
pub mod state;

use crate::AppError;
use geo::Coord;
use org_map_lib::{
    ClusterFeature, ClusterId, LeafResolver, LocationCollection, MapError, MapSurface, SelectionMode,
};
use serde_json::{Value, json};
use settings::{Command, Settings};
use state::AppState;
use std::time::Duration;

/// Extra wait after the hover debounce so the preview task can finish
const HOVER_SETTLE: Duration = Duration::from_millis(50);

/// Load the dataset, execute the command and print its output
pub async fn run(settings: Settings) -> Result<(), AppError> {
    let mut state = AppState::load(&settings)?;
    tracing::debug!(
        "Loaded {} points from {}",
        state.info.point_count,
        settings.data.display()
    );
    let output = execute(&mut state, &settings.command).await?;
    print_json(&output, settings.pretty)
}

fn print_json(value: &Value, pretty: bool) -> Result<(), AppError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

fn require_cluster(collection: &LocationCollection, cluster_id: ClusterId) -> Result<ClusterFeature, AppError> {
    collection
        .index()
        .get_cluster(cluster_id)
        .ok_or(AppError::Map(MapError::UnknownCluster(cluster_id)))
}

/// Run one command against a loaded state
pub async fn execute(state: &mut AppState, command: &Command) -> Result<Value, AppError> {
    match command {
        Command::Info => Ok(json!({
            "info": state.info,
            "boundingBox": state.collection.bounding_box_wgs84(),
            "center": state.collection.center_wgs84(),
        })),

        Command::Clusters { view } => {
            let viewport = state.viewport(view);
            let bounds = viewport.bounds();
            let features = state.collection.query_visible(bounds, view.zoom);
            Ok(json!({
                "bounds": bounds,
                "zoom": view.zoom,
                "features": features,
            }))
        }

        Command::Expand { cluster_id } => {
            let cluster = require_cluster(&state.collection, *cluster_id)?;
            let index = state.collection.index();
            Ok(json!({
                "cluster": cluster,
                "expansionZoom": index.get_cluster_expansion_zoom(*cluster_id),
                "children": index.get_children(*cluster_id),
            }))
        }

        Command::Leaves {
            cluster_id,
            limit,
            offset,
            filter,
        } => {
            let cluster = require_cluster(&state.collection, *cluster_id)?;
            let mut leaves = state
                .collection
                .index()
                .resolve_leaves(*cluster_id, *limit, *offset)
                .await?;
            if let Some(query) = filter {
                leaves.retain(|leaf| leaf.matches(query));
            }
            Ok(json!({
                "clusterId": cluster_id,
                "pointCount": cluster.point_count,
                "offset": offset,
                "leaves": leaves,
            }))
        }

        Command::Click { view, x, y } => {
            let mut viewport = state.viewport(view);
            let rendered = state.collection.query_visible(viewport.bounds(), view.zoom);
            viewport.set_rendered(&rendered);
            viewport.set_spider(state.collection.spider());

            let screen = Coord {
                x: x.unwrap_or(view.width / 2.0),
                y: y.unwrap_or(view.height / 2.0),
            };
            let outcome = state.collection.click_at(&mut viewport, screen).await;
            let spider = state.collection.spider();
            Ok(json!({
                "outcome": outcome,
                "camera": { "center": viewport.center, "zoom": viewport.zoom() },
                "spider": spider,
                "selectedLocations": state.collection.locations().ids(),
            }))
        }

        Command::Spider { cluster_id, filter } => {
            let cluster = require_cluster(&state.collection, *cluster_id)?;
            let outcome = state.collection.open_spider(*cluster_id, cluster.centroid).await;
            if let Some(query) = filter {
                state.collection.set_spider_filter(query);
            }
            let spider = state.collection.spider();
            Ok(json!({
                "outcome": outcome,
                "spider": spider,
                "spokes": spider.map(|s| s.spoke_features()),
                "error": state.collection.spider_state().error(),
            }))
        }

        Command::Hover { cluster_id, filter } => {
            require_cluster(&state.collection, *cluster_id)?;
            state.collection.hover_enter(*cluster_id).await;
            tokio::time::sleep(state.collection.config().hover.debounce + HOVER_SETTLE).await;

            let snapshot = state.collection.hover_snapshot().await;
            let leaves = snapshot.filtered(filter.as_deref().unwrap_or(""));
            Ok(json!({
                "phase": format!("{:?}", snapshot.phase),
                "clusterId": snapshot.cluster,
                "leaves": leaves,
                "error": snapshot.error,
            }))
        }

        Command::BoxSelect { view, x0, y0, x1, y1 } => {
            let viewport = state.viewport(view);
            let start = Coord { x: *x0, y: *y0 };
            let end = Coord { x: *x1, y: *y1 };

            state.collection.set_box_modifier(true);
            state.collection.box_drag_start(start);
            state.collection.box_drag_move(end);
            let overlay = state
                .collection
                .box_overlay()
                .map(|rect| [rect.min.x, rect.min.y, rect.max.x, rect.max.y]);
            let picked = state.collection.box_drag_end(end, Some(&viewport)).unwrap_or_default();
            state.collection.set_box_modifier(false);

            let (a, b) = (viewport.unproject(start), viewport.unproject(end));
            Ok(json!({
                "overlay": overlay,
                "bounds": [a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y)],
                "picked": picked,
                "locationIds": state.collection.locations().ids(),
            }))
        }

        Command::Navigate { keys, locations } => {
            for key in keys {
                if state.collection.toggle_key(key).is_none() {
                    return Err(AppError::InvalidArgs(format!(
                        "`{key}` is not a region, country or city key"
                    )));
                }
            }
            for location in locations {
                state.collection.toggle_location(location);
            }
            let mode = if locations.is_empty() {
                SelectionMode::Hierarchy
            } else {
                SelectionMode::Locations
            };
            Ok(serde_json::to_value(state.collection.view_orgs(mode))?)
        }
    }
}
