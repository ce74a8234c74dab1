//! Configuration Loader
//!
//! ## Search order
//!
//! 1. User-level: `~/.kiln/settings.json`
//! 2. Project-level: `.kiln/settings.json`
//! 3. Local (gitignored): `.kiln/settings.local.json`
//!
//! Each level overrides the keys it sets; objects merge key by key.

use super::{KilnConfig, SETTINGS_FILE};
use crate::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Config directory name
pub const CONFIG_DIR_NAME: &str = ".kiln";

// ============================================================================
// ConfigLoader
// ============================================================================

pub struct ConfigLoader {
    search_paths: Vec<ConfigPath>,
}

#[derive(Debug, Clone)]
struct ConfigPath {
    path: PathBuf,
    /// Higher wins
    priority: u8,
    description: &'static str,
}

impl ConfigLoader {
    /// Default search paths for a project
    pub fn new(working_dir: &Path) -> Self {
        let mut paths = Vec::new();

        if let Some(home) = dirs::home_dir() {
            paths.push(ConfigPath {
                path: home.join(CONFIG_DIR_NAME).join(SETTINGS_FILE),
                priority: 10,
                description: "User settings",
            });
        }

        paths.push(ConfigPath {
            path: working_dir.join(CONFIG_DIR_NAME).join(SETTINGS_FILE),
            priority: 20,
            description: "Project settings",
        });

        paths.push(ConfigPath {
            path: working_dir.join(CONFIG_DIR_NAME).join("settings.local.json"),
            priority: 30,
            description: "Local settings",
        });

        paths.sort_by_key(|p| p.priority);

        Self { search_paths: paths }
    }

    /// Explicit paths, lowest priority first
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        let search_paths = paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| ConfigPath {
                path,
                priority: i as u8,
                description: "Custom",
            })
            .collect();

        Self { search_paths }
    }

    /// Load and merge every existing settings file.
    ///
    /// Unreadable or malformed files are skipped with a warning.
    pub fn load_all(&self) -> Result<KilnConfig> {
        let mut merged = Value::Object(Default::default());

        for config_path in &self.search_paths {
            if !config_path.path.exists() {
                continue;
            }
            match load_json(&config_path.path) {
                Ok(value) => {
                    info!(
                        "Loaded {} from: {}",
                        config_path.description,
                        config_path.path.display()
                    );
                    merge_json(&mut merged, value);
                }
                Err(e) => {
                    warn!(
                        "Failed to load settings from {}: {}",
                        config_path.path.display(),
                        e
                    );
                }
            }
        }

        serde_json::from_value(merged)
            .map_err(|e| Error::Config(format!("invalid merged settings: {e}")))
    }

    /// Settings files that currently exist
    pub fn existing_files(&self) -> Vec<PathBuf> {
        self.search_paths
            .iter()
            .filter(|p| p.path.exists())
            .map(|p| p.path.clone())
            .collect()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn load_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    let content = strip_json_comments(&content);

    let value: Value = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("invalid {} at {}: {}", SETTINGS_FILE, path.display(), e)))?;

    if !value.is_object() {
        return Err(Error::Config(format!(
            "{} must contain a JSON object",
            path.display()
        )));
    }

    debug!("Parsed settings file {}", path.display());
    Ok(value)
}

/// Merge `overlay` into `base`; objects merge recursively, anything else
/// is replaced.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Remove `//` and `/* */` comments outside of strings
pub fn strip_json_comments(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if escape_next {
            output.push(c);
            escape_next = false;
            continue;
        }

        if c == '\\' && in_string {
            output.push(c);
            escape_next = true;
            continue;
        }

        if c == '"' {
            in_string = !in_string;
            output.push(c);
            continue;
        }

        if !in_string && c == '/' {
            match chars.peek() {
                Some('/') => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            output.push(c);
                            break;
                        }
                    }
                    continue;
                }
                Some('*') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '*' && chars.peek() == Some(&'/') {
                            chars.next();
                            break;
                        }
                    }
                    continue;
                }
                _ => {}
            }
        }

        output.push(c);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_layers_override_in_order() {
        let dir = tempdir().unwrap();
        let user = dir.path().join("user.json");
        let project = dir.path().join("project.json");

        fs::write(
            &user,
            r#"{ "environment": "staging", "disabledPlugins": ["assets"] }"#,
        )
        .unwrap();
        fs::write(
            &project,
            r#"{
                // project wins
                "environment": "production"
            }"#,
        )
        .unwrap();

        let config = ConfigLoader::with_paths(vec![user, project])
            .load_all()
            .unwrap();

        assert_eq!(config.environment, "production");
        assert_eq!(config.disabled_plugins, vec!["assets".to_string()]);
        assert_eq!(config.discovery_timeout_secs, 5);
    }

    #[test]
    fn test_malformed_file_is_skipped() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("broken.json");
        let good = dir.path().join("good.json");
        fs::write(&broken, "{ not json").unwrap();
        fs::write(&good, r#"{ "logLevel": "debug" }"#).unwrap();

        let config = ConfigLoader::with_paths(vec![broken, good])
            .load_all()
            .unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_missing_files_give_defaults() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let config = ConfigLoader::with_paths(vec![dir.path().join("nope.json")])
            .load_all()
            .unwrap();

        assert_eq!(config, KilnConfig::default());
        assert!(loader
            .existing_files()
            .iter()
            .all(|p| !p.starts_with(dir.path())));
    }

    #[test]
    fn test_strip_comments_keeps_strings() {
        let input = r#"{ "url": "http://example.com" /* note */ }"#;
        let stripped = strip_json_comments(input);
        assert!(stripped.contains("http://example.com"));
        assert!(!stripped.contains("note"));
    }

    #[test]
    fn test_merge_json_nested() {
        let mut base = serde_json::json!({ "a": { "x": 1, "y": 2 }, "b": [1] });
        merge_json(&mut base, serde_json::json!({ "a": { "y": 3 }, "b": [2] }));
        assert_eq!(base, serde_json::json!({ "a": { "x": 1, "y": 3 }, "b": [2] }));
    }
}
