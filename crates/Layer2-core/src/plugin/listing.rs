//! `kiln plugins` - list discovered external plugins

use super::discovery::PluginDescriptor;
use super::traits::{Command, Describer, Plugin, StdoutSetter};
use crate::context::RunContext;
use crate::flags::{FlagComposer, FlagSpec};
use crate::io::{SharedWriter, StreamSlots};
use async_trait::async_trait;
use kiln_foundation::Result;
use std::io::Write;

pub const NAME: &str = "plugins";

#[derive(Default)]
pub struct PluginsCommand {
    descriptors: Vec<PluginDescriptor>,
    streams: StreamSlots,
}

impl PluginsCommand {
    pub fn new(descriptors: Vec<PluginDescriptor>) -> Self {
        Self {
            descriptors,
            streams: StreamSlots::new(),
        }
    }

    fn print(&self, json: bool, w: &mut dyn Write) -> Result<()> {
        if json {
            serde_json::to_writer_pretty(&mut *w, &self.descriptors)?;
            writeln!(w)?;
            return Ok(());
        }

        if self.descriptors.is_empty() {
            writeln!(w, "No external plugins found")?;
            return Ok(());
        }

        let width = self
            .descriptors
            .iter()
            .map(|d| d.name.len())
            .max()
            .unwrap_or_default();
        for d in &self.descriptors {
            writeln!(
                w,
                "{:<width$}  {:<6}  {}  {}",
                d.name,
                d.kiln_command,
                d.binary.display(),
                d.description
            )?;
        }
        Ok(())
    }
}

#[async_trait]
impl Command for PluginsCommand {
    async fn main(&self, _ctx: &RunContext, args: &[String]) -> Result<()> {
        let flags = FlagComposer::new(NAME)
            .with_flags([
                FlagSpec::bool("json", "print descriptors as JSON"),
                FlagSpec::bool("help", "print this help").with_short('h'),
            ])
            .intrinsic()?;
        let parsed = flags.parse(args)?;

        let out = self.streams.stdout();
        let mut out = out.lock();
        if parsed.get_bool("help") {
            writeln!(out, "Usage: kiln {} [--json]", NAME)?;
            writeln!(out)?;
            writeln!(out, "{}", self.description())?;
            writeln!(out)?;
            writeln!(out, "Flags:")?;
            return flags.print_defaults(&mut *out);
        }
        self.print(parsed.get_bool("json"), &mut *out)
    }
}

impl Describer for PluginsCommand {
    fn description(&self) -> String {
        "List external plugins found on the search path".to_string()
    }
}

impl StdoutSetter for PluginsCommand {
    fn set_stdout(&self, w: SharedWriter) {
        self.streams.set_stdout(w);
    }
}

impl Plugin for PluginsCommand {
    fn name(&self) -> &str {
        NAME
    }

    fn as_command(&self) -> Option<&dyn Command> {
        Some(self)
    }

    fn as_describer(&self) -> Option<&dyn Describer> {
        Some(self)
    }

    fn as_stdout_setter(&self) -> Option<&dyn StdoutSetter> {
        Some(self)
    }
}
