//! Logging configuration and initialization

use crate::app::config::AppConfig;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber; `RUST_LOG` takes precedence over verbosity.
///
/// Returns false if a global subscriber was already installed.
pub fn init_logging(config: &AppConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.verbose >= 2) // Show target module for -vv and above
        .with_thread_ids(config.verbose >= 3)
        .with_line_number(config.verbose >= 3)
        .try_init()
        .is_ok();

    debug!("osworkflow logging at verbosity level: {}", config.verbose);
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_tolerated() {
        let config = AppConfig::default();
        init_logging(&config);
        assert!(!init_logging(&AppConfig { verbose: 2, ..config }));
    }
}
