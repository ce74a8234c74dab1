//! Plugin Discovery - external `kiln-*` executables
//!
//! Each executable named `kiln-*` found in the search directories is asked
//! to describe itself with `<binary> available`, which must print a JSON
//! array of [`PluginDescriptor`]s. Binaries that fail, time out or print
//! something else are skipped with a warning.
//!
//! Search order is the configured plugin directories, then `PATH`. The first
//! binary with a given file name wins. Binaries are asked concurrently;
//! descriptors keep search order.

use crate::process::{command_line, run_captured};
use async_trait::async_trait;
use futures::future::join_all;
use kiln_foundation::{Error, KilnConfig, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const BINARY_PREFIX: &str = "kiln-";
pub const DESCRIBE_COMMAND: &str = "available";

/// Descriptor categories understood by kiln
pub mod category {
    /// Top-level command
    pub const ROOT: &str = "root";
    /// Fixer run by `kiln fix`
    pub const FIX: &str = "fix";
    /// Event listener
    pub const EVENTS: &str = "events";
}

// ============================================================================
// PluginDescriptor
// ============================================================================

/// One command advertised by an external plugin binary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,

    /// Sub-command passed to the binary when this descriptor is invoked
    #[serde(default)]
    pub use_command: String,

    /// Category: `root`, `fix` or `events`
    #[serde(default)]
    pub kiln_command: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub aliases: Vec<String>,

    /// Event kind pattern, for `events` descriptors
    #[serde(default)]
    pub listen_for: String,

    /// Filled in by discovery
    #[serde(default)]
    pub binary: PathBuf,
}

impl PluginDescriptor {
    pub fn is(&self, category: &str) -> bool {
        self.kiln_command == category
    }

    /// `<binary> <use_command>` plus `args`, as a loggable line
    pub fn command_line(&self, args: &[String]) -> String {
        let binary = self.binary.to_string_lossy();
        command_line(
            &binary,
            std::iter::once(self.use_command.as_str()).chain(args.iter().map(String::as_str)),
        )
    }

    pub fn to_command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg(&self.use_command).args(args);
        command
    }
}

/// Parse the output of `<binary> available`
pub fn parse_descriptors(binary: &Path, output: &str) -> Result<Vec<PluginDescriptor>> {
    let mut descriptors: Vec<PluginDescriptor> = serde_json::from_str(output.trim())?;
    for descriptor in &mut descriptors {
        descriptor.binary = binary.to_path_buf();
    }
    Ok(descriptors)
}

// ============================================================================
// DescriptorSource
// ============================================================================

#[async_trait]
pub trait DescriptorSource: Send + Sync {
    async fn descriptors(&self) -> Result<Vec<PluginDescriptor>>;
}

/// An already discovered list
#[async_trait]
impl DescriptorSource for Vec<PluginDescriptor> {
    async fn descriptors(&self) -> Result<Vec<PluginDescriptor>> {
        Ok(self.clone())
    }
}

// ============================================================================
// PathDiscovery
// ============================================================================

pub struct PathDiscovery {
    dirs: Vec<PathBuf>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl PathDiscovery {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            timeout: Duration::from_secs(5),
            cancel: CancellationToken::new(),
        }
    }

    /// Configured plugin directories followed by `PATH`
    pub fn from_config(config: &KilnConfig) -> Self {
        let mut dirs = config.plugin_paths.clone();
        if let Some(path) = std::env::var_os("PATH") {
            dirs.extend(std::env::split_paths(&path));
        }
        Self::new(dirs).with_timeout(Duration::from_secs(config.discovery_timeout_secs))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Plugin binaries in search order, one per file name
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for dir in &self.dirs {
            if !dir.is_dir() {
                continue;
            }
            let pattern = format!(
                "{}/{}*",
                glob::Pattern::escape(&dir.to_string_lossy()),
                BINARY_PREFIX
            );
            let entries = match glob::glob(&pattern) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Bad plugin search directory");
                    continue;
                }
            };

            let mut in_dir: Vec<PathBuf> = entries.flatten().filter(|p| p.is_file()).collect();
            in_dir.sort();
            for path in in_dir {
                let Some(file_name) = path.file_name().map(|n| n.to_os_string()) else {
                    continue;
                };
                if seen.insert(file_name) {
                    found.push(path);
                }
            }
        }
        found
    }

    async fn describe(&self, binary: &Path) -> Result<Vec<PluginDescriptor>> {
        let binary_str = binary.to_string_lossy();
        let line = command_line(&binary_str, [DESCRIBE_COMMAND]);
        let mut command = Command::new(binary);
        command.arg(DESCRIBE_COMMAND);

        let output = tokio::time::timeout(self.timeout, run_captured(command, &line, &self.cancel))
            .await
            .map_err(|_| Error::subprocess(&line, format!("timed out after {:?}", self.timeout)))??;

        if !output.success() {
            return Err(Error::subprocess(line, output.combined()));
        }
        parse_descriptors(binary, &output.stdout)
    }
}

#[async_trait]
impl DescriptorSource for PathDiscovery {
    async fn descriptors(&self) -> Result<Vec<PluginDescriptor>> {
        let candidates = self.candidates();
        let described = join_all(candidates.iter().map(|binary| self.describe(binary))).await;

        let mut descriptors = Vec::new();
        for (binary, result) in candidates.iter().zip(described) {
            match result {
                Ok(found) => {
                    debug!(binary = %binary.display(), count = found.len(), "Described plugin");
                    descriptors.extend(found);
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(binary = %binary.display(), error = %e, "Skipping plugin binary");
                }
            }
        }

        info!(count = descriptors.len(), "Discovered external plugins");
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_descriptors() {
        let output = r#"[
            {"name": "heroku", "use_command": "deploy", "kiln_command": "root",
             "description": "deploy to heroku", "aliases": ["h"]},
            {"name": "slack", "use_command": "notify", "kiln_command": "events",
             "listen_for": "kiln:build:.*"}
        ]"#;
        let binary = Path::new("/usr/local/bin/kiln-heroku");
        let descriptors = parse_descriptors(binary, output).unwrap();

        assert_eq!(descriptors.len(), 2);
        assert!(descriptors[0].is(category::ROOT));
        assert_eq!(descriptors[0].aliases, vec!["h"]);
        assert_eq!(descriptors[1].listen_for, "kiln:build:.*");
        assert!(descriptors.iter().all(|d| d.binary == binary));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_descriptors(Path::new("kiln-x"), "usage: kiln-x").is_err());
    }

    #[test]
    fn test_command_line() {
        let descriptor = PluginDescriptor {
            name: "heroku".into(),
            use_command: "deploy".into(),
            binary: PathBuf::from("/bin/kiln-heroku"),
            ..Default::default()
        };
        let line = descriptor.command_line(&["--app".to_string(), "my app".to_string()]);
        assert_eq!(
            shlex::split(&line).unwrap(),
            vec!["/bin/kiln-heroku", "deploy", "--app", "my app"]
        );
    }

    #[test]
    fn test_candidates_first_name_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("kiln-heroku"), "").unwrap();
        fs::write(second.path().join("kiln-heroku"), "").unwrap();
        fs::write(second.path().join("kiln-slack"), "").unwrap();
        fs::write(second.path().join("other"), "").unwrap();

        let discovery = PathDiscovery::new(vec![
            first.path().to_path_buf(),
            first.path().join("missing"),
            second.path().to_path_buf(),
        ]);
        let candidates = discovery.candidates();

        assert_eq!(
            candidates,
            vec![
                first.path().join("kiln-heroku"),
                second.path().join("kiln-slack")
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discovers_from_script() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("kiln-good");
        fs::write(
            &good,
            "#!/bin/sh\necho '[{\"name\":\"hi\",\"use_command\":\"hi\",\"kiln_command\":\"root\"}]'\n",
        )
        .unwrap();
        let bad = dir.path().join("kiln-bad");
        fs::write(&bad, "#!/bin/sh\nexit 3\n").unwrap();
        for path in [&good, &bad] {
            fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
        }

        let descriptors = PathDiscovery::new(vec![dir.path().to_path_buf()])
            .descriptors()
            .await
            .unwrap();

        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "hi");
        assert_eq!(descriptors[0].binary, good);
    }

    #[tokio::test]
    async fn test_vec_source() {
        let list = vec![PluginDescriptor {
            name: "x".into(),
            ..Default::default()
        }];
        assert_eq!(list.descriptors().await.unwrap(), list);
    }
}
