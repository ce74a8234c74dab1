//! Plugin Set - ordered plugins plus their capability table
//!
//! Capabilities are probed once, when the set is built. Lookups afterwards
//! read the table instead of asking each plugin again.

use super::traits::Plugin;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// Capability
// ============================================================================

/// Optional behaviors a plugin may provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Command,
    BeforeBuilder,
    AfterBuilder,
    BuildFlagger,
    BuildPflagger,
    StdinSetter,
    StdoutSetter,
    StderrSetter,
    SubCommander,
    Describer,
    FlagPrinter,
    TemplateValidator,
    Fixer,
}

impl Capability {
    pub const ALL: [Capability; 13] = [
        Capability::Command,
        Capability::BeforeBuilder,
        Capability::AfterBuilder,
        Capability::BuildFlagger,
        Capability::BuildPflagger,
        Capability::StdinSetter,
        Capability::StdoutSetter,
        Capability::StderrSetter,
        Capability::SubCommander,
        Capability::Describer,
        Capability::FlagPrinter,
        Capability::TemplateValidator,
        Capability::Fixer,
    ];

    /// Ask `plugin` whether it implements this capability
    pub fn probe(self, plugin: &dyn Plugin) -> bool {
        match self {
            Capability::Command => plugin.as_command().is_some(),
            Capability::BeforeBuilder => plugin.as_before_builder().is_some(),
            Capability::AfterBuilder => plugin.as_after_builder().is_some(),
            Capability::BuildFlagger => plugin.as_build_flagger().is_some(),
            Capability::BuildPflagger => plugin.as_build_pflagger().is_some(),
            Capability::StdinSetter => plugin.as_stdin_setter().is_some(),
            Capability::StdoutSetter => plugin.as_stdout_setter().is_some(),
            Capability::StderrSetter => plugin.as_stderr_setter().is_some(),
            Capability::SubCommander => plugin.as_sub_commander().is_some(),
            Capability::Describer => plugin.as_describer().is_some(),
            Capability::FlagPrinter => plugin.as_flag_printer().is_some(),
            Capability::TemplateValidator => plugin.as_template_validator().is_some(),
            Capability::Fixer => plugin.as_fixer().is_some(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Capability::Command => "command",
            Capability::BeforeBuilder => "before-builder",
            Capability::AfterBuilder => "after-builder",
            Capability::BuildFlagger => "build-flagger",
            Capability::BuildPflagger => "build-pflagger",
            Capability::StdinSetter => "stdin-setter",
            Capability::StdoutSetter => "stdout-setter",
            Capability::StderrSetter => "stderr-setter",
            Capability::SubCommander => "sub-commander",
            Capability::Describer => "describer",
            Capability::FlagPrinter => "flag-printer",
            Capability::TemplateValidator => "template-validator",
            Capability::Fixer => "fixer",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// PluginSet
// ============================================================================

struct PluginEntry {
    plugin: Arc<dyn Plugin>,
    capabilities: HashSet<Capability>,
}

/// Immutable, ordered plugin collection. Cheap to clone.
#[derive(Clone, Default)]
pub struct PluginSet {
    entries: Arc<Vec<PluginEntry>>,
}

impl PluginSet {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        let entries = plugins
            .into_iter()
            .filter_map(|plugin| {
                if plugin.name().is_empty() {
                    warn!("Ignoring plugin with an empty name");
                    return None;
                }
                let capabilities: HashSet<Capability> = Capability::ALL
                    .into_iter()
                    .filter(|cap| cap.probe(plugin.as_ref()))
                    .collect();
                debug!(
                    plugin = plugin.name(),
                    capabilities = capabilities.len(),
                    "Probed plugin capabilities"
                );
                Some(PluginEntry {
                    plugin,
                    capabilities,
                })
            })
            .collect();

        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plugins in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.entries.iter().map(|entry| &entry.plugin)
    }

    /// Plugins supporting `capability`, in declaration order
    pub fn with(&self, capability: Capability) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.entries
            .iter()
            .filter(move |entry| entry.capabilities.contains(&capability))
            .map(|entry| &entry.plugin)
    }

    /// First plugin named `name`
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.iter().find(|plugin| plugin.name() == name)
    }

    /// Whether the first plugin named `name` supports `capability`
    pub fn has(&self, name: &str, capability: Capability) -> bool {
        self.entries
            .iter()
            .find(|entry| entry.plugin.name() == name)
            .is_some_and(|entry| entry.capabilities.contains(&capability))
    }

    /// Capabilities of the first plugin named `name`, in canonical order
    pub fn capabilities_of(&self, name: &str) -> Vec<Capability> {
        match self.entries.iter().find(|entry| entry.plugin.name() == name) {
            Some(entry) => Capability::ALL
                .into_iter()
                .filter(|cap| entry.capabilities.contains(cap))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Copy of the set without plugins whose name is in `names`
    pub fn without(&self, names: &[String]) -> Self {
        if names.is_empty() {
            return self.clone();
        }
        let kept = self
            .iter()
            .filter(|plugin| {
                let disabled = names.iter().any(|name| name == plugin.name());
                if disabled {
                    debug!(plugin = plugin.name(), "Plugin disabled by configuration");
                }
                !disabled
            })
            .cloned()
            .collect();
        Self::new(kept)
    }
}

impl fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|plugin| plugin.name()))
            .finish()
    }
}
