//! Application configuration
//!
//! Verbosity, working directory and the runner defaults used by a process.

use crate::config::RunnerConfig;
use anyhow::Result;
use std::path::PathBuf;

/// Application configuration structure
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
    /// Working directory measures run in
    pub working_dir: PathBuf,
    /// Defaults applied to every runner
    pub runner: RunnerConfig,
}

impl AppConfig {
    /// Create a configuration rooted at the process working directory
    pub fn new(verbose: u8) -> Result<Self> {
        let working_dir = std::env::current_dir()
            .map_err(|e| anyhow::anyhow!("Failed to get current directory: {}", e))?;

        Ok(Self {
            verbose,
            working_dir,
            runner: RunnerConfig::default(),
        })
    }

    /// Like [`AppConfig::new`], with runner defaults read from the global config and env
    pub fn load(verbose: u8) -> Result<Self> {
        Ok(Self {
            runner: RunnerConfig::load()?,
            ..Self::new(verbose)?
        })
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_runner_config(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }

    /// Get the log level string based on verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            verbose: 0,
            working_dir: PathBuf::from("."),
            runner: RunnerConfig::default(),
        }
    }
}
