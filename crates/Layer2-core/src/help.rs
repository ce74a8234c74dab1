//! Help listing for the top-level command
//!
//! Every command gets its name (and aliases), then whatever its optional
//! capabilities can add: a description, sub-commands, flag defaults.

use crate::command::Commands;
use crate::plugin::{Plugin, PluginSet};
use kiln_foundation::Result;
use std::io::Write;

pub const USAGE: &str = "Usage: kiln [-h|--help] <command> [command-flags] [args...]";

/// Description text, falling back to the plugin name
pub fn describe(plugin: &dyn Plugin) -> String {
    match plugin.as_describer() {
        Some(describer) => {
            let description = describer.description();
            if description.trim().is_empty() {
                plugin.name().to_string()
            } else {
                description
            }
        }
        None => plugin.name().to_string(),
    }
}

/// Render the command listing
pub fn print_listing(w: &mut dyn Write, commands: &Commands, plugins: &PluginSet) -> Result<()> {
    writeln!(w, "{}", USAGE)?;
    writeln!(w)?;
    writeln!(w, "Available Commands:")?;

    let titles: Vec<String> = commands
        .iter()
        .map(|command| {
            if command.aliases().is_empty() {
                command.name().to_string()
            } else {
                format!("{} ({})", command.name(), command.aliases().join(", "))
            }
        })
        .collect();
    let width = titles.iter().map(|t| t.len()).max().unwrap_or(0);

    for (command, title) in commands.iter().zip(&titles) {
        let plugin = command.plugin().as_ref();
        let description = describe(plugin);

        if description == command.name() {
            writeln!(w, "  {}", title)?;
        } else {
            writeln!(w, "  {:width$}   {}", title, description, width = width)?;
        }

        if let Some(sub) = plugin.as_sub_commander() {
            let subs = sub.sub_commands(plugins);
            if !subs.is_empty() {
                writeln!(w, "      Sub-commands:")?;
                for sub in subs {
                    let text = describe(sub.as_ref());
                    if text == sub.name() {
                        writeln!(w, "        {}", sub.name())?;
                    } else {
                        writeln!(w, "        {}   {}", sub.name(), text)?;
                    }
                }
            }
        }

        if let Some(printer) = plugin.as_flag_printer() {
            let mut flags: Vec<u8> = Vec::new();
            printer.print_flags(plugins, &mut flags)?;
            if !flags.is_empty() {
                writeln!(w, "      Flags:")?;
                for line in String::from_utf8_lossy(&flags).lines() {
                    writeln!(w, "      {}", line)?;
                }
            }
        }
    }

    Ok(())
}
