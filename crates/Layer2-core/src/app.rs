//! App - top-level dispatcher
//!
//! ```text
//!  kiln [-h|--help] <command> [command-flags] [args...]
//!        │                │
//!        │                └─► Commands::find ─► wire_io ─► Command::main
//!        └─► (no command) ─► help listing
//! ```

use crate::command::Commands;
use crate::context::RunContext;
use crate::help;
use crate::io::{wire_io, IoStreams};
use crate::plugin::PluginSet;
use clap::{Arg, ArgAction};
use kiln_foundation::{Error, Result};
use std::io::Write;
use tracing::debug;

const REST_ID: &str = "rest";

pub struct App {
    plugins: PluginSet,
    commands: Commands,
    streams: IoStreams,
    context: RunContext,
}

impl App {
    pub fn new(plugins: PluginSet, context: RunContext) -> Self {
        let commands = Commands::new(&plugins);
        let context = context.with_plugins(plugins.clone());
        Self {
            plugins,
            commands,
            streams: IoStreams::std(),
            context,
        }
    }

    pub fn with_streams(mut self, streams: IoStreams) -> Self {
        self.streams = streams;
        self
    }

    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Dispatch `args` (without the program name)
    pub async fn main(&self, args: &[String]) -> Result<()> {
        let (help, rest) = parse_global(args)?;

        let Some((token, command_args)) = rest.split_first() else {
            debug!(help, "No command given, printing listing");
            return self.print_listing();
        };

        let command = self.commands.find(token)?;
        wire_io(command.plugin().as_ref(), &self.streams);

        let mut forwarded = Vec::with_capacity(command_args.len() + 1);
        if help {
            forwarded.push("--help".to_string());
        }
        forwarded.extend(command_args.iter().cloned());

        debug!(command = command.name(), args = ?forwarded, "Dispatching command");
        command.main(&self.context, &forwarded).await
    }

    fn print_listing(&self) -> Result<()> {
        let mut out = self.streams.stdout.lock();
        help::print_listing(&mut *out, &self.commands, &self.plugins)?;
        out.flush()?;
        Ok(())
    }
}

/// Split off the global `-h/--help` flag; everything from the first
/// non-flag argument on is returned untouched.
fn parse_global(args: &[String]) -> Result<(bool, Vec<String>)> {
    let matches = clap::Command::new("kiln")
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("help")
                .short('h')
                .long("help")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(REST_ID)
                .num_args(0..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        )
        .try_get_matches_from(args)
        .map_err(|e| Error::FlagParse(e.to_string().trim().to_string()))?;

    let help = matches.get_flag("help");
    let rest = matches
        .get_many::<String>(REST_ID)
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default();
    Ok((help, rest))
}
