use clap::{Args, Parser, Subcommand};
use org_map_lib::{ClusterConfig, ClusterId, Config, HoverConfig, SpiderConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Org Map Explorer - Inspect clusters, spiders, hover previews and selections of a location dataset
pub struct Settings {
    /// JSON file holding an array of raw location records
    #[clap(short, long, value_name = "FILE")]
    pub data: PathBuf,

    /// Cluster radius in pixels
    #[clap(long, default_value = "52")]
    pub radius: f64,

    /// Tile extent the radius is relative to
    #[clap(long, default_value = "512")]
    pub extent: f64,

    /// Lowest zoom level that is clustered
    #[clap(long, default_value = "0")]
    pub min_zoom: u8,

    /// Highest zoom level that is clustered
    #[clap(long, default_value = "16")]
    pub max_zoom: u8,

    /// Minimum number of points that form a cluster
    #[clap(long, default_value = "2")]
    pub min_points: usize,

    /// Hover debounce in milliseconds
    #[clap(long, default_value = "180")]
    pub hover_debounce_ms: u64,

    /// Maximum number of leaves laid out in a spider
    #[clap(long, default_value = "80")]
    pub spider_max_leaves: usize,

    /// Maximum number of leaves fetched per cluster
    #[clap(long, default_value = "500")]
    pub leaf_fetch_limit: usize,

    /// Pretty-print JSON output
    #[clap(long, default_value = "false")]
    pub pretty: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Dataset summary: point counts, bounding box and center
    Info,

    /// Clusters and points visible in a viewport
    Clusters {
        #[clap(flatten)]
        view: ViewArgs,
    },

    /// Bounds, expansion zoom and children of a cluster
    Expand { cluster_id: ClusterId },

    /// Page through the member leaves of a cluster
    Leaves {
        cluster_id: ClusterId,

        #[clap(long, default_value = "10")]
        limit: usize,

        #[clap(long, default_value = "0")]
        offset: usize,

        /// Only keep leaves whose org name contains this text
        #[clap(long)]
        filter: Option<String>,
    },

    /// Click a screen position: zoom into a cluster, open a spider or toggle a point
    Click {
        #[clap(flatten)]
        view: ViewArgs,

        /// Screen x in pixels (defaults to the viewport center)
        #[clap(long)]
        x: Option<f64>,

        /// Screen y in pixels (defaults to the viewport center)
        #[clap(long)]
        y: Option<f64>,
    },

    /// Expand a cluster into a spider layout
    Spider {
        cluster_id: ClusterId,

        /// Only lay out leaves whose org name contains this text
        #[clap(long)]
        filter: Option<String>,
    },

    /// Rest the pointer on a cluster and print the preview once the debounce elapses
    Hover {
        cluster_id: ClusterId,

        /// Only list leaves whose org name contains this text
        #[clap(long)]
        filter: Option<String>,
    },

    /// Select the points under a screen rectangle
    #[clap(name = "box")]
    BoxSelect {
        #[clap(flatten)]
        view: ViewArgs,

        #[clap(long)]
        x0: f64,

        #[clap(long)]
        y0: f64,

        #[clap(long)]
        x1: f64,

        #[clap(long)]
        y1: f64,
    },

    /// Print the navigation payload for a selection
    Navigate {
        /// Hierarchical key such as `NA`, `NA||US` or `NA||US||Austin` (repeatable)
        #[clap(long = "key", conflicts_with = "locations")]
        keys: Vec<String>,

        /// Stable location id (repeatable)
        #[clap(long = "location")]
        locations: Vec<String>,
    },
}

/// Viewport used by commands that work in screen space
#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
    /// Center longitude (defaults to the dataset center)
    #[clap(long)]
    pub lon: Option<f64>,

    /// Center latitude (defaults to the dataset center)
    #[clap(long)]
    pub lat: Option<f64>,

    #[clap(long, default_value = "3")]
    pub zoom: f64,

    /// Viewport width in pixels
    #[clap(long, default_value = "1024")]
    pub width: f64,

    /// Viewport height in pixels
    #[clap(long, default_value = "768")]
    pub height: f64,
}

impl Settings {
    /// Library configuration derived from the command line
    pub fn to_config(&self) -> Config {
        let defaults = Config::default();
        Config {
            cluster: ClusterConfig {
                radius: self.radius,
                extent: self.extent,
                min_zoom: self.min_zoom,
                max_zoom: self.max_zoom,
                min_points: self.min_points,
            },
            hover: HoverConfig {
                debounce: Duration::from_millis(self.hover_debounce_ms),
            },
            spider: SpiderConfig {
                max_leaves: self.spider_max_leaves,
                ..defaults.spider
            },
            leaf_fetch_limit: self.leaf_fetch_limit,
        }
    }
}
