//! Plugin traits - the plugin contract and its optional capabilities
//!
//! Every plugin has a name. Everything else is opt-in: a plugin advertises a
//! capability by overriding the matching `as_*` accessor to return itself.
//!
//! ```ignore
//! impl Plugin for Greeter {
//!     fn name(&self) -> &str { "greet" }
//!     fn as_command(&self) -> Option<&dyn Command> { Some(self) }
//!     fn as_describer(&self) -> Option<&dyn Describer> { Some(self) }
//! }
//! ```

use super::registry::PluginSet;
use crate::context::RunContext;
use crate::flags::FlagSpec;
use crate::io::{SharedReader, SharedWriter};
use async_trait::async_trait;
use kiln_foundation::Result;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Plugin Trait
// ============================================================================

pub trait Plugin: Send + Sync {
    /// Stable, non-empty name used for display and lookup
    fn name(&self) -> &str;

    fn as_command(&self) -> Option<&dyn Command> {
        None
    }

    fn as_before_builder(&self) -> Option<&dyn BeforeBuilder> {
        None
    }

    fn as_after_builder(&self) -> Option<&dyn AfterBuilder> {
        None
    }

    fn as_build_flagger(&self) -> Option<&dyn BuildFlagger> {
        None
    }

    fn as_build_pflagger(&self) -> Option<&dyn BuildPflagger> {
        None
    }

    fn as_stdin_setter(&self) -> Option<&dyn StdinSetter> {
        None
    }

    fn as_stdout_setter(&self) -> Option<&dyn StdoutSetter> {
        None
    }

    fn as_stderr_setter(&self) -> Option<&dyn StderrSetter> {
        None
    }

    fn as_sub_commander(&self) -> Option<&dyn SubCommander> {
        None
    }

    fn as_describer(&self) -> Option<&dyn Describer> {
        None
    }

    fn as_flag_printer(&self) -> Option<&dyn FlagPrinter> {
        None
    }

    fn as_template_validator(&self) -> Option<&dyn TemplateValidator> {
        None
    }

    fn as_fixer(&self) -> Option<&dyn Fixer> {
        None
    }
}

// ============================================================================
// Commands
// ============================================================================

/// A top-level command, `kiln <name> [args...]`
#[async_trait]
pub trait Command: Send + Sync {
    async fn main(&self, ctx: &RunContext, args: &[String]) -> Result<()>;

    /// Alternate tokens that also resolve to this command, in order
    fn aliases(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Exposes nested plugins as sub-commands in listings
pub trait SubCommander: Send + Sync {
    fn sub_commands(&self, plugins: &PluginSet) -> Vec<Arc<dyn Plugin>>;
}

pub trait Describer: Send + Sync {
    fn description(&self) -> String;
}

/// Writes flag defaults for help output
pub trait FlagPrinter: Send + Sync {
    fn print_flags(&self, plugins: &PluginSet, w: &mut dyn Write) -> Result<()>;
}

// ============================================================================
// Build lifecycle
// ============================================================================

/// Runs before the build step; an error aborts the build.
#[async_trait]
pub trait BeforeBuilder: Send + Sync {
    async fn before_build(&self, ctx: &RunContext, args: &[String]) -> Result<()>;
}

/// Runs after a successful build step.
#[async_trait]
pub trait AfterBuilder: Send + Sync {
    async fn after_build(&self, ctx: &RunContext, args: &[String]) -> Result<()>;
}

/// Contributes long-only flags to the build command.
///
/// Any shorthand on the returned specs is ignored.
pub trait BuildFlagger: Send + Sync {
    fn build_flags(&self) -> Vec<FlagSpec>;
}

/// Contributes POSIX flags (with optional shorthand) to the build command.
pub trait BuildPflagger: Send + Sync {
    fn build_pflags(&self) -> Vec<FlagSpec>;
}

pub trait TemplateValidator: Send + Sync {
    /// Parse every template under `root`, failing on the first bad file
    fn validate_templates(&self, root: &Path) -> Result<()>;
}

// ============================================================================
// Fix
// ============================================================================

#[async_trait]
pub trait Fixer: Send + Sync {
    async fn fix(&self, ctx: &RunContext, args: &[String]) -> Result<()>;
}

// ============================================================================
// Streams
// ============================================================================

pub trait StdinSetter: Send + Sync {
    fn set_stdin(&self, r: SharedReader);
}

pub trait StdoutSetter: Send + Sync {
    fn set_stdout(&self, w: SharedWriter);
}

pub trait StderrSetter: Send + Sync {
    fn set_stderr(&self, w: SharedWriter);
}
