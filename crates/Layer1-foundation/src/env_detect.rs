//! Environment Detection - runtime environment and platform
//!
//! Reads the process variables kiln cares about once, so the rest of the
//! code works with a plain value instead of touching `std::env`.

use std::env;
use std::path::PathBuf;

/// Selects the runtime environment; also set on toolchain subprocesses.
pub const ENV_VAR: &str = "KILN_ENV";
/// Truthy value switches kiln into test mode.
pub const TEST_MODE_VAR: &str = "KILN_TEST_MODE";
/// Log filter override.
pub const LOG_VAR: &str = "KILN_LOG";
/// Extra plugin search directories, separated like `PATH`.
pub const PLUGIN_PATH_VAR: &str = "KILN_PLUGIN_PATH";

pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const TEST_ENVIRONMENT: &str = "test";

/// Operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsType {
    Windows,
    MacOS,
    Linux,
    Unknown,
}

impl OsType {
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOS
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::Unknown
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::MacOS => "macOS",
            Self::Linux => "Linux",
            Self::Unknown => "Unknown",
        }
    }

    /// Suffix node puts on `node_modules/.bin` shims
    pub fn script_suffix(&self) -> &'static str {
        match self {
            Self::Windows => ".cmd",
            _ => "",
        }
    }
}

/// Snapshot of the process environment
#[derive(Debug, Clone)]
pub struct RuntimeEnv {
    /// Value of `KILN_ENV`, if set
    pub environment: Option<String>,
    pub test_mode: bool,
    pub log_filter: Option<String>,
    pub plugin_paths: Vec<PathBuf>,
    pub os: OsType,
    pub current_dir: PathBuf,
}

impl RuntimeEnv {
    /// Read the current process environment
    pub fn detect() -> Self {
        let mut detected = Self::from_lookup(|key| env::var(key).ok());
        if let Some(paths) = env::var_os(PLUGIN_PATH_VAR) {
            detected.plugin_paths = env::split_paths(&paths).collect();
        }
        detected
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let environment = lookup(ENV_VAR).filter(|v| !v.trim().is_empty());
        let test_mode = lookup(TEST_MODE_VAR).is_some_and(|v| is_truthy(&v))
            || environment.as_deref() == Some(TEST_ENVIRONMENT);

        let plugin_paths = lookup(PLUGIN_PATH_VAR)
            .map(|v| env::split_paths(&v).collect())
            .unwrap_or_default();

        Self {
            environment,
            test_mode,
            log_filter: lookup(LOG_VAR).filter(|v| !v.trim().is_empty()),
            plugin_paths,
            os: OsType::detect(),
            current_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// `KILN_ENV`, falling back to `development`
    pub fn environment_or_default(&self) -> &str {
        self.environment.as_deref().unwrap_or(DEFAULT_ENVIRONMENT)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
