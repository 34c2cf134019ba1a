//! Logging setup for the explorer binary

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Default filter when `RUST_LOG` is not set
pub fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Install a fmt subscriber filtered by `RUST_LOG`.
///
/// Logs go to stderr so stdout only carries command output.
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter()));
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_filter(filter);

    if tracing_subscriber::registry().with(fmt_layer).try_init().is_err() {
        tracing::warn!("A global tracing subscriber was already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(default_filter()).is_ok());
    }

    #[test]
    fn test_setup_logging_twice() {
        setup_logging();
        setup_logging();
    }
}
