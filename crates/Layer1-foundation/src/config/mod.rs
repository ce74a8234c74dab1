//! Config - kiln settings
//!
//! - `loader.rs` - layered `settings.json` loading

mod loader;

pub use loader::{merge_json, strip_json_comments, ConfigLoader, CONFIG_DIR_NAME};

use crate::env_detect::{RuntimeEnv, DEFAULT_ENVIRONMENT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings file name inside [`CONFIG_DIR_NAME`]
pub const SETTINGS_FILE: &str = "settings.json";

/// Merged kiln settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KilnConfig {
    /// Default build environment
    pub environment: String,

    /// `tracing` filter directive, e.g. `info` or `kiln_core=debug`
    pub log_level: Option<String>,

    /// Plugin names removed from the plugin set
    pub disabled_plugins: Vec<String>,

    /// Extra directories searched for external plugin binaries
    pub plugin_paths: Vec<PathBuf>,

    /// How long an external plugin may take to describe itself
    pub discovery_timeout_secs: u64,
}

impl Default for KilnConfig {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            log_level: None,
            disabled_plugins: Vec::new(),
            plugin_paths: Vec::new(),
            discovery_timeout_secs: 5,
        }
    }
}

impl KilnConfig {
    /// Apply process environment overrides on top of file settings
    pub fn apply_env(mut self, env: &RuntimeEnv) -> Self {
        if let Some(environment) = &env.environment {
            self.environment = environment.clone();
        }
        if let Some(filter) = &env.log_filter {
            self.log_level = Some(filter.clone());
        }
        self.plugin_paths.extend(env.plugin_paths.iter().cloned());
        self
    }

    pub fn is_disabled(&self, plugin: &str) -> bool {
        self.disabled_plugins.iter().any(|name| name == plugin)
    }
}
