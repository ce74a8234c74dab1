//! Error types for kiln
//!
//! Every layer reports failures through this one enum.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// kiln error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Dispatch
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Flag error: {0}")]
    FlagParse(String),

    #[error("Flag collision: --{flag} is declared by both {first} and {second}")]
    FlagCollision {
        flag: String,
        first: String,
        second: String,
    },

    // ========================================================================
    // Pipeline
    // ========================================================================
    #[error("Hook failed: {plugin} - {message}")]
    Hook { plugin: String, message: String },

    #[error("could not parse {path}: {message}")]
    Validation { path: String, message: String },

    #[error("Command failed: {command} - {message}")]
    Subprocess { command: String, message: String },

    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // Plugins & config
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("{key}: {message}")]
    OnceFailed { key: String, message: String },

    // ========================================================================
    // External conversions
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Hook failure attributed to a plugin
    pub fn hook(plugin: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Hook {
            plugin: plugin.into(),
            message: message.to_string(),
        }
    }

    /// Template parse failure for a file
    pub fn validation(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Validation {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Subprocess failure carrying the full command line
    pub fn subprocess(command: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Subprocess {
            command: command.into(),
            message: message.to_string(),
        }
    }

    /// Errors caused by the user's input rather than the environment
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::FlagParse(_)
                | Error::FlagCollision { .. }
                | Error::Validation { .. }
                | Error::Cancelled
        )
    }
}

// ============================================================================
// From conversions
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
