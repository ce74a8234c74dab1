//! Command Registry - resolves a token to one command
//!
//! Resolution order:
//! 1. first plugin, in declaration order, whose name equals the token
//! 2. otherwise the first plugin listing the token as an alias
//! 3. otherwise `NotFound(token)`
//!
//! The index is built once from a snapshot of the plugin set; duplicate
//! names and shadowing aliases are only warned about.

use crate::context::RunContext;
use crate::plugin::{Capability, Plugin, PluginSet};
use kiln_foundation::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// CommandHandle
// ============================================================================

/// A resolved command
#[derive(Clone)]
pub struct CommandHandle {
    plugin: Arc<dyn Plugin>,
    aliases: Vec<String>,
}

impl CommandHandle {
    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    pub async fn main(&self, ctx: &RunContext, args: &[String]) -> Result<()> {
        match self.plugin.as_command() {
            Some(command) => command.main(ctx, args).await,
            None => Err(Error::Internal(format!(
                "{} no longer provides a command",
                self.plugin.name()
            ))),
        }
    }
}

impl std::fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandle")
            .field("name", &self.name())
            .field("aliases", &self.aliases)
            .finish()
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Command-capable plugins indexed by name and alias
#[derive(Clone, Default)]
pub struct Commands {
    entries: Vec<CommandHandle>,
    by_name: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
}

impl Commands {
    pub fn new(plugins: &PluginSet) -> Self {
        let entries: Vec<CommandHandle> = plugins
            .with(Capability::Command)
            .filter_map(|plugin| {
                let command = plugin.as_command()?;
                Some(CommandHandle {
                    plugin: Arc::clone(plugin),
                    aliases: command.aliases(),
                })
            })
            .collect();

        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            if let Some(&first) = by_name.get(entry.name()) {
                let first: &CommandHandle = &entries[first];
                warn!(
                    command = entry.name(),
                    position = index,
                    "Duplicate command name; the first declaration ({}) wins",
                    first.name()
                );
                continue;
            }
            by_name.insert(entry.name().to_string(), index);
        }

        let mut by_alias: HashMap<String, usize> = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            for alias in &entry.aliases {
                if let Some(&owner) = by_name.get(alias.as_str()) {
                    warn!(
                        alias = %alias,
                        command = entry.name(),
                        "Alias is shadowed by command {}",
                        entries[owner].name()
                    );
                }
                if let Some(&earlier) = by_alias.get(alias.as_str()) {
                    if earlier != index {
                        warn!(
                            alias = %alias,
                            command = entry.name(),
                            "Alias already claimed by {}",
                            entries[earlier].name()
                        );
                    }
                    continue;
                }
                by_alias.insert(alias.clone(), index);
            }
        }

        debug!(
            commands = entries.len(),
            aliases = by_alias.len(),
            "Built command index"
        );

        Self {
            entries,
            by_name,
            by_alias,
        }
    }

    pub fn find(&self, token: &str) -> Result<CommandHandle> {
        self.by_name
            .get(token)
            .or_else(|| self.by_alias.get(token))
            .map(|&index| self.entries[index].clone())
            .ok_or_else(|| Error::NotFound(token.to_string()))
    }

    /// Commands in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &CommandHandle> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
