use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_UNITS_PREFERENCE: &str = "OSWORKFLOW_UNITS_PREFERENCE";
pub const ENV_LANGUAGE_PREFERENCE: &str = "OSWORKFLOW_LANGUAGE_PREFERENCE";
pub const ENV_MSG_ALSO_LOGS: &str = "OSWORKFLOW_MSG_ALSO_LOGS";
pub const ENV_ECHO_OUTPUT: &str = "OSWORKFLOW_ECHO_OUTPUT";

/// Get the global osworkflow directory holding `config.toml`
pub fn get_global_config_dir() -> Result<PathBuf> {
    ProjectDirs::from("org", "openstudio", "osworkflow")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow!("Could not determine home directory"))
}

/// Runner-wide defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub units_preference: String,
    pub language_preference: String,
    pub register_msg_also_logs: bool,
    pub echo_captured_output: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            units_preference: "IP".to_string(),
            language_preference: "en".to_string(),
            register_msg_also_logs: false,
            echo_captured_output: true,
        }
    }
}

impl RunnerConfig {
    /// Global `config.toml` if present, then environment overrides
    pub fn load() -> Result<Self> {
        let config_path = get_global_config_dir()?.join("config.toml");
        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };
        config.merge_env_vars();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        debug!("Loaded runner config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn merge_env_vars(&mut self) {
        self.merge_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; unparsable flags are ignored
    pub fn merge_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(units) = lookup(ENV_UNITS_PREFERENCE) {
            self.units_preference = units;
        }

        if let Some(language) = lookup(ENV_LANGUAGE_PREFERENCE) {
            self.language_preference = language;
        }

        if let Some(value) = lookup(ENV_MSG_ALSO_LOGS).and_then(|v| v.parse::<bool>().ok()) {
            self.register_msg_also_logs = value;
        }

        if let Some(value) = lookup(ENV_ECHO_OUTPUT).and_then(|v| v.parse::<bool>().ok()) {
            self.echo_captured_output = value;
        }
    }
}
