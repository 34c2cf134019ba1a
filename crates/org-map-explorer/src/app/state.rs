//! Explorer state: the loaded collection and viewport construction

use crate::AppError;
use crate::app::settings::{Settings, ViewArgs};
use geo::Coord;
use org_map_lib::{CollectionInfo, ExplorerListener, LocationCollection, SelectionChange, Viewport};
use std::sync::Arc;

/// Logs selection changes as they happen
struct LoggingListener;

impl ExplorerListener for LoggingListener {
    fn on_selection_change(&self, change: &SelectionChange) {
        match change {
            SelectionChange::Hierarchy(summary) => tracing::info!(
                "Hierarchy selection: {} regions, {} countries, {} cities",
                summary.regions.len(),
                summary.countries.len(),
                summary.cities.len()
            ),
            SelectionChange::Locations(ids) => tracing::info!("Location selection: {} ids", ids.len()),
        }
    }
}

/// Main explorer state
pub struct AppState {
    pub collection: LocationCollection,
    pub info: CollectionInfo,
}

impl AppState {
    /// Load the dataset named by the settings
    pub fn load(settings: &Settings) -> Result<Self, AppError> {
        #[cfg(feature = "profiling")]
        profiling::scope!("AppState::load");
        let mut collection = LocationCollection::new(settings.to_config());
        collection.add_listener(Arc::new(LoggingListener));
        let info = collection.load_from_file(&settings.data)?;
        if info.point_count == 0 {
            tracing::warn!("{} contains no usable points", settings.data.display());
        }
        Ok(Self { collection, info })
    }

    /// Wrap an already populated collection
    pub fn from_collection(collection: LocationCollection) -> Self {
        let info = collection.info();
        Self { collection, info }
    }

    /// Viewport for `view`, centered on the dataset unless a center was given
    pub fn viewport(&self, view: &ViewArgs) -> Viewport {
        let fallback = self.collection.center_wgs84().unwrap_or(Coord { x: 0.0, y: 0.0 });
        let center = Coord {
            x: view.lon.unwrap_or(fallback.x),
            y: view.lat.unwrap_or(fallback.y),
        };
        Viewport::new(center, view.zoom, view.width, view.height)
    }
}
