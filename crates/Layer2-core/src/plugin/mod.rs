//! # Plugin System
//!
//! A plugin is any value with a name. What it can do is discovered by
//! probing its capabilities once, when the [`PluginSet`] is built.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        PluginSet                          │
//! │  declaration order + capability table                     │
//! │  ┌────────────┬────────────┬────────────┬──────────────┐ │
//! │  │ build      │ fix        │ assets     │ kiln-heroku  │ │
//! │  │ Command    │ Command    │ Before     │ Command      │ │
//! │  │ FlagPrinter│ SubCommand │ Pflagger   │ (external)   │ │
//! │  └────────────┴────────────┴────────────┴──────────────┘ │
//! └──────────────────────────────────────────────────────────┘
//!            ▲
//!            │ descriptors from `kiln-* available`
//!     PathDiscovery
//! ```
//!
//! ## Plugin kinds
//!
//! 1. **Built-in**: Rust values compiled into kiln
//! 2. **External**: `kiln-*` binaries on the search path, run as subprocesses

mod discovery;
mod external;
mod listing;
mod registry;
mod traits;

pub use discovery::{
    category, parse_descriptors, DescriptorSource, PathDiscovery, PluginDescriptor, BINARY_PREFIX,
};
pub use external::ExternalPlugin;
pub use listing::PluginsCommand;
pub use registry::{Capability, PluginSet};
pub use traits::{
    AfterBuilder, BeforeBuilder, BuildFlagger, BuildPflagger, Command, Describer, FlagPrinter,
    Fixer, Plugin, StderrSetter, StdinSetter, StdoutSetter, SubCommander, TemplateValidator,
};
