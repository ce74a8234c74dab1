//! Flags - composed flag sets for commands
//!
//! A command starts from its own (intrinsic) flags and merges in what other
//! plugins contribute. The merged set keeps declaration order and refuses
//! duplicate long names or shorthands.
//!
//! ```text
//!  intrinsic ──┐
//!  BuildFlagger (long only) ──┼──► FlagSet ──parse(args)──► ParsedFlags
//!  BuildPflagger (POSIX) ─────┘
//! ```

use crate::plugin::{Capability, PluginSet};
use clap::{parser::ValueSource, Arg, ArgAction};
use kiln_foundation::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use tracing::debug;

/// Positional id used internally by clap
const ARGS_ID: &str = "__args";

// ============================================================================
// FlagSpec
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Bool(bool),
    String(String),
}

impl FlagValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FlagValue::Bool(_) => "bool",
            FlagValue::String(_) => "string",
        }
    }
}

/// One flag definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    pub name: String,
    pub short: Option<char>,
    pub default: FlagValue,
    pub help: String,
}

impl FlagSpec {
    pub fn bool(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short: None,
            default: FlagValue::Bool(false),
            help: help.into(),
        }
    }

    pub fn string(
        name: impl Into<String>,
        default: impl Into<String>,
        help: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            short: None,
            default: FlagValue::String(default.into()),
            help: help.into(),
        }
    }

    /// Bool flag that starts out on; `--name=false` turns it off
    pub fn default_on(mut self) -> Self {
        self.default = FlagValue::Bool(true);
        self
    }

    pub fn with_short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.default, FlagValue::Bool(_))
    }

    fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.name.clone())
            .long(self.name.clone())
            .help(self.help.clone());
        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        match &self.default {
            FlagValue::Bool(true) => arg
                .action(ArgAction::Set)
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
            FlagValue::Bool(false) => arg.action(ArgAction::SetTrue),
            FlagValue::String(default) => arg
                .action(ArgAction::Set)
                .num_args(1)
                .allow_hyphen_values(true)
                .default_value(default.clone()),
        }
    }
}

// ============================================================================
// FlagSet
// ============================================================================

#[derive(Debug, Clone)]
struct OwnedFlag {
    spec: FlagSpec,
    owner: String,
}

/// Ordered, collision-free set of flags for one command
#[derive(Debug, Clone)]
pub struct FlagSet {
    name: String,
    flags: Vec<OwnedFlag>,
}

impl FlagSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a flag owned by `owner`.
    ///
    /// Fails with `FlagCollision` when the long name or shorthand is taken.
    pub fn add(&mut self, owner: &str, spec: FlagSpec) -> Result<()> {
        for existing in &self.flags {
            if existing.spec.name == spec.name {
                return Err(Error::FlagCollision {
                    flag: spec.name,
                    first: existing.owner.clone(),
                    second: owner.to_string(),
                });
            }
            if let (Some(a), Some(b)) = (existing.spec.short, spec.short) {
                if a == b {
                    return Err(Error::FlagCollision {
                        flag: format!("{} (-{})", spec.name, b),
                        first: existing.owner.clone(),
                        second: owner.to_string(),
                    });
                }
            }
        }

        self.flags.push(OwnedFlag {
            spec,
            owner: owner.to_string(),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Flags in declaration order
    pub fn specs(&self) -> impl Iterator<Item = &FlagSpec> {
        self.flags.iter().map(|f| &f.spec)
    }

    /// Name of the plugin that declared `flag`
    pub fn owner_of(&self, flag: &str) -> Option<&str> {
        self.flags
            .iter()
            .find(|f| f.spec.name == flag)
            .map(|f| f.owner.as_str())
    }

    /// Parse `args`; flags may be interleaved with positional arguments and
    /// `--` ends flag parsing.
    pub fn parse(&self, args: &[String]) -> Result<ParsedFlags> {
        let mut command = clap::Command::new(self.name.clone())
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true);

        for flag in &self.flags {
            command = command.arg(flag.spec.to_arg());
        }
        command = command.arg(
            Arg::new(ARGS_ID)
                .num_args(0..)
                .action(ArgAction::Append)
                .value_parser(clap::value_parser!(String)),
        );

        let matches = command
            .try_get_matches_from(args)
            .map_err(|e| Error::FlagParse(first_line(&e.to_string())))?;

        let mut values = BTreeMap::new();
        let mut explicit = HashSet::new();

        for flag in &self.flags {
            let name = flag.spec.name.as_str();
            let value = if flag.spec.is_bool() {
                let set = matches
                    .try_get_one::<bool>(name)
                    .ok()
                    .flatten()
                    .copied()
                    .unwrap_or(false);
                FlagValue::Bool(set)
            } else {
                let value = matches
                    .try_get_one::<String>(name)
                    .ok()
                    .flatten()
                    .cloned()
                    .unwrap_or_default();
                FlagValue::String(value)
            };
            if matches.value_source(name) == Some(ValueSource::CommandLine) {
                explicit.insert(name.to_string());
            }
            values.insert(name.to_string(), value);
        }

        let positional: Vec<String> = matches
            .try_get_many::<String>(ARGS_ID)
            .ok()
            .flatten()
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default();

        debug!(flag_set = %self.name, explicit = explicit.len(), "Parsed flags");

        Ok(ParsedFlags {
            values,
            explicit,
            args: positional,
        })
    }

    /// Write flag defaults, one flag per line
    pub fn print_defaults(&self, w: &mut dyn Write) -> Result<()> {
        let lefts: Vec<String> = self
            .flags
            .iter()
            .map(|flag| {
                let spec = &flag.spec;
                let mut left = match spec.short {
                    Some(short) => format!("  -{}, --{}", short, spec.name),
                    None => format!("      --{}", spec.name),
                };
                if !spec.is_bool() {
                    left.push(' ');
                    left.push_str(spec.default.type_name());
                }
                left
            })
            .collect();

        let width = lefts.iter().map(|l| l.len()).max().unwrap_or(0);

        for (flag, left) in self.flags.iter().zip(lefts) {
            let mut line = format!("{:width$}   {}", left, flag.spec.help, width = width);
            match &flag.spec.default {
                FlagValue::String(default) if !default.is_empty() => {
                    line.push_str(&format!(" (default {:?})", default));
                }
                FlagValue::Bool(true) => line.push_str(" (default true)"),
                _ => {}
            }
            writeln!(w, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

fn first_line(message: &str) -> String {
    message
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or(message)
        .trim_start_matches("error: ")
        .to_string()
}

// ============================================================================
// FlagComposer
// ============================================================================

/// Builds a command's flag set from its own flags plus plugin contributions.
pub struct FlagComposer {
    owner: String,
    intrinsic: Vec<FlagSpec>,
}

impl FlagComposer {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            intrinsic: Vec::new(),
        }
    }

    pub fn with_flags(mut self, flags: impl IntoIterator<Item = FlagSpec>) -> Self {
        self.intrinsic.extend(flags);
        self
    }

    /// Intrinsic flags only
    pub fn intrinsic(&self) -> Result<FlagSet> {
        let mut set = FlagSet::new(self.owner.clone());
        for spec in &self.intrinsic {
            set.add(&self.owner, spec.clone())?;
        }
        Ok(set)
    }

    /// Intrinsic flags, then every `BuildFlagger`, then every `BuildPflagger`,
    /// each group in plugin declaration order.
    pub fn compose(&self, plugins: &PluginSet) -> Result<FlagSet> {
        let mut set = self.intrinsic()?;

        for plugin in plugins.with(Capability::BuildFlagger) {
            if let Some(flagger) = plugin.as_build_flagger() {
                for mut spec in flagger.build_flags() {
                    spec.short = None;
                    set.add(plugin.name(), spec)?;
                }
            }
        }

        for plugin in plugins.with(Capability::BuildPflagger) {
            if let Some(flagger) = plugin.as_build_pflagger() {
                for spec in flagger.build_pflags() {
                    set.add(plugin.name(), spec)?;
                }
            }
        }

        Ok(set)
    }
}

// ============================================================================
// ParsedFlags
// ============================================================================

/// Flag values after parsing, defaults filled in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFlags {
    values: BTreeMap<String, FlagValue>,
    explicit: HashSet<String>,
    args: Vec<String>,
}

impl ParsedFlags {
    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.values.get(name)
    }

    /// Bool flag value; unknown or non-bool flags read as `false`
    pub fn get_bool(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(FlagValue::Bool(true)))
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(FlagValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Whether `name` was given on the command line
    pub fn is_set(&self, name: &str) -> bool {
        self.explicit.contains(name)
    }

    /// Positional arguments
    pub fn args(&self) -> &[String] {
        &self.args
    }
}
