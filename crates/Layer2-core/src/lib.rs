//! kiln-core: plugin runtime for kiln
//!
//! Layer2 - plugins, command dispatch, build pipeline
//!
//! # Modules
//!
//! - `plugin`: plugin trait, capabilities, plugin set, external discovery
//! - `flags`: flag specs, composition and parsing
//! - `command`: command lookup by name and alias
//! - `app`: the dispatcher behind `kiln <command>`
//! - `build`: the `build` command and its pipeline
//! - `fix`: the `fix` command
//! - `assets`, `templates`: built-in build hooks and validators
//! - `events`: forwarding bus events to external plugins
//!
//! # Example
//!
//! ```ignore
//! use kiln_core::{default_plugins, App, RunContext};
//!
//! let plugins = default_plugins(&config, &descriptors);
//! let app = App::new(plugins, RunContext::new(std::env::current_dir()?));
//! app.main(&args).await?;
//! ```

pub mod app;
pub mod assets;
pub mod build;
pub mod command;
pub mod context;
pub mod defaults;
pub mod events;
pub mod fix;
pub mod flags;
pub mod help;
pub mod io;
pub mod plugin;
pub mod process;
pub mod templates;

// Re-exports: dispatch
pub use app::App;
pub use command::{CommandHandle, Commands};
pub use context::RunContext;
pub use defaults::{builtin_plugins, default_plugins};
pub use io::{CaptureBuffer, IoStreams, SharedReader, SharedWriter};

// Re-exports: plugins
pub use plugin::{
    AfterBuilder, BeforeBuilder, BuildFlagger, BuildPflagger, Capability, Command, DescriptorSource,
    Describer, ExternalPlugin, FlagPrinter, Fixer, PathDiscovery, Plugin, PluginDescriptor,
    PluginSet, StderrSetter, StdinSetter, StdoutSetter, SubCommander, TemplateValidator,
};

// Re-exports: flags
pub use flags::{FlagComposer, FlagSet, FlagSpec, FlagValue, ParsedFlags};

// Re-exports: built-in plugins
pub use assets::AssetsBuilder;
pub use build::{BuildCommand, BuildOptions, BuildPlan, BuildStep};
pub use fix::FixCommand;
pub use templates::{GoTemplates, HandlebarsTemplates};

// Re-exports: events
pub use events::{load_plugins, EventBridge};

// Layer1 re-exports
pub use kiln_foundation::{Error, Result};

/// Layer2 version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
