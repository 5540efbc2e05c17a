//! Application module
//!
//! Process-level setup shared by anything embedding the runner:
//! - Configuration handling
//! - Logging setup

pub mod config;
pub mod logging;

pub use config::AppConfig;
pub use logging::init_logging;
