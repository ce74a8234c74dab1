//! External plugins - discovered binaries exposed as commands and fixers
//!
//! A `root` descriptor becomes a top-level command and a `fix` descriptor a
//! fixer. Both run `<binary> <use_command> [args...]` with the terminal
//! attached; fixers also get `--yes` when `kiln fix -y` was given. `events`
//! descriptors are handled by the event bridge instead.

use super::discovery::{category, PluginDescriptor};
use super::traits::{Command, Describer, Fixer, Plugin};
use crate::context::RunContext;
use crate::process::run_inherited;
use async_trait::async_trait;
use kiln_foundation::{Error, Result};
use std::sync::Arc;
use tracing::debug;

pub struct ExternalPlugin {
    descriptor: PluginDescriptor,
}

impl ExternalPlugin {
    pub fn new(descriptor: PluginDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    /// Plugins for every `root` and `fix` descriptor, in discovery order
    pub fn from_descriptors(descriptors: &[PluginDescriptor]) -> Vec<Arc<dyn Plugin>> {
        descriptors
            .iter()
            .filter(|d| d.is(category::ROOT) || d.is(category::FIX))
            .map(|d| Arc::new(Self::new(d.clone())) as Arc<dyn Plugin>)
            .collect()
    }

    async fn invoke(&self, ctx: &RunContext, args: &[String]) -> Result<()> {
        let line = self.descriptor.command_line(args);
        let mut command = self.descriptor.to_command(args);
        command.current_dir(ctx.working_dir());

        debug!(plugin = %self.descriptor.name, command = %line, "Running external plugin");
        let status = run_inherited(command, &line, ctx.cancellation()).await?;
        if !status.success() {
            return Err(Error::subprocess(line, status));
        }
        Ok(())
    }
}

#[async_trait]
impl Command for ExternalPlugin {
    async fn main(&self, ctx: &RunContext, args: &[String]) -> Result<()> {
        self.invoke(ctx, args).await
    }

    fn aliases(&self) -> Vec<String> {
        self.descriptor.aliases.clone()
    }
}

/// Arguments for an external fixer: `--yes` first when the user already
/// confirmed with `kiln fix -y`
fn fixer_args(ctx: &RunContext, args: &[String]) -> Vec<String> {
    let yes = ctx.flags().is_some_and(|flags| flags.get_bool("yes"));
    let mut forwarded = Vec::with_capacity(args.len() + 1);
    if yes {
        forwarded.push("--yes".to_string());
    }
    forwarded.extend(args.iter().cloned());
    forwarded
}

#[async_trait]
impl Fixer for ExternalPlugin {
    async fn fix(&self, ctx: &RunContext, args: &[String]) -> Result<()> {
        self.invoke(ctx, &fixer_args(ctx, args)).await
    }
}

impl Describer for ExternalPlugin {
    fn description(&self) -> String {
        self.descriptor.description.clone()
    }
}

impl Plugin for ExternalPlugin {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn as_command(&self) -> Option<&dyn Command> {
        self.descriptor.is(category::ROOT).then_some(self as &dyn Command)
    }

    fn as_fixer(&self) -> Option<&dyn Fixer> {
        self.descriptor.is(category::FIX).then_some(self as &dyn Fixer)
    }

    fn as_describer(&self) -> Option<&dyn Describer> {
        (!self.descriptor.description.is_empty()).then_some(self as &dyn Describer)
    }
}
