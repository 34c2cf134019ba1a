//! Org Map Explorer - A headless command line front end for `org-map-lib`
//!
//! Loads a location dataset and drives the same interactions a map host would
//! (viewport queries, cluster clicks, spiders, hover previews, box selection and
//! navigation payloads), printing each result as JSON.

pub mod app;
pub mod logging;

pub use app::run;
pub use app::settings::Settings;

use org_map_lib::MapError;

/// Errors surfaced by explorer commands
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Map(#[from] MapError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),
}
