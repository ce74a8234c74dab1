//! `kiln fix` - run fixers
//!
//! ```text
//!  kiln fix             every fixer, in plugin order
//!  kiln fix plush pop   the named fixers, in argument order
//!  kiln fix -h          help
//! ```

use crate::context::RunContext;
use crate::flags::{FlagComposer, FlagSet, FlagSpec};
use crate::help::describe;
use crate::io::{SharedWriter, StreamSlots};
use crate::plugin::{
    Capability, Command, Describer, FlagPrinter, Plugin, PluginSet, StdoutSetter, SubCommander,
};
use async_trait::async_trait;
use kiln_foundation::{Error, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};

pub const NAME: &str = "fix";

#[derive(Default)]
pub struct FixCommand {
    streams: StreamSlots,
}

impl FixCommand {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag_set() -> Result<FlagSet> {
        FlagComposer::new(NAME)
            .with_flags([
                FlagSpec::bool("yes", "update all without asking for confirmation").with_short('y'),
                FlagSpec::bool("help", "print this help").with_short('h'),
            ])
            .intrinsic()
    }

    fn fixers(plugins: &PluginSet) -> Vec<Arc<dyn Plugin>> {
        plugins.with(Capability::Fixer).cloned().collect()
    }

    fn print_help(&self, plugins: &PluginSet, flags: &FlagSet) -> Result<()> {
        let out = self.streams.stdout();
        let mut out = out.lock();
        writeln!(out, "Usage: kiln {} [flags] [fixer...]", NAME)?;
        writeln!(out)?;
        writeln!(out, "{}", self.description())?;

        let fixers = Self::fixers(plugins);
        if !fixers.is_empty() {
            writeln!(out)?;
            writeln!(out, "Fixers:")?;
            for fixer in fixers {
                writeln!(out, "  {}   {}", fixer.name(), describe(fixer.as_ref()))?;
            }
        }

        writeln!(out)?;
        writeln!(out, "Flags:")?;
        flags.print_defaults(&mut *out)
    }
}

async fn run_fixer(plugin: &Arc<dyn Plugin>, ctx: &RunContext, args: &[String]) -> Result<()> {
    ctx.check_cancelled()?;
    match plugin.as_fixer() {
        Some(fixer) => {
            info!(fixer = plugin.name(), "Running fixer");
            fixer.fix(ctx, args).await
        }
        None => Ok(()),
    }
}

#[async_trait]
impl Command for FixCommand {
    async fn main(&self, ctx: &RunContext, args: &[String]) -> Result<()> {
        let flags = Self::flag_set()?;
        let parsed = flags.parse(args)?;

        if parsed.get_bool("help") {
            return self.print_help(ctx.plugins(), &flags);
        }

        let names = parsed.args().to_vec();
        let fixers = Self::fixers(ctx.plugins());
        let ctx = ctx.clone().with_flags(parsed);

        if names.is_empty() {
            debug!(count = fixers.len(), "Running every fixer");
            for fixer in &fixers {
                run_fixer(fixer, &ctx, &[]).await?;
            }
            return Ok(());
        }

        for name in &names {
            let fixer = fixers
                .iter()
                .find(|f| f.name() == name)
                .ok_or_else(|| Error::NotFound(format!("unknown fixer {name}")))?;
            run_fixer(fixer, &ctx, &[]).await?;
        }
        Ok(())
    }
}

impl Describer for FixCommand {
    fn description(&self) -> String {
        "Attempt to fix an application's API to match the current version".to_string()
    }
}

impl SubCommander for FixCommand {
    fn sub_commands(&self, plugins: &PluginSet) -> Vec<Arc<dyn Plugin>> {
        Self::fixers(plugins)
    }
}

impl FlagPrinter for FixCommand {
    fn print_flags(&self, _plugins: &PluginSet, w: &mut dyn Write) -> Result<()> {
        Self::flag_set()?.print_defaults(w)
    }
}

impl StdoutSetter for FixCommand {
    fn set_stdout(&self, w: SharedWriter) {
        self.streams.set_stdout(w);
    }
}

impl Plugin for FixCommand {
    fn name(&self) -> &str {
        NAME
    }

    fn as_command(&self) -> Option<&dyn Command> {
        Some(self)
    }

    fn as_describer(&self) -> Option<&dyn Describer> {
        Some(self)
    }

    fn as_sub_commander(&self) -> Option<&dyn SubCommander> {
        Some(self)
    }

    fn as_flag_printer(&self) -> Option<&dyn FlagPrinter> {
        Some(self)
    }

    fn as_stdout_setter(&self) -> Option<&dyn StdoutSetter> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CaptureBuffer;
    use crate::plugin::Fixer;
    use parking_lot::Mutex;

    struct Recording {
        name: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Fixer for Recording {
        async fn fix(&self, ctx: &RunContext, _args: &[String]) -> Result<()> {
            let yes = ctx.flags().is_some_and(|f| f.get_bool("yes"));
            self.journal.lock().push(format!("{}:{}", self.name, yes));
            Ok(())
        }
    }

    impl Plugin for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn as_fixer(&self) -> Option<&dyn Fixer> {
            Some(self)
        }
    }

    fn setup() -> (FixCommand, RunContext, Arc<Mutex<Vec<String>>>) {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let plugins: Vec<Arc<dyn Plugin>> = vec![
            Arc::new(Recording {
                name: "plush",
                journal: Arc::clone(&journal),
            }),
            Arc::new(Recording {
                name: "pop",
                journal: Arc::clone(&journal),
            }),
        ];
        let ctx = RunContext::new(".").with_plugins(PluginSet::new(plugins));
        (FixCommand::new(), ctx, journal)
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_runs_every_fixer_in_order() {
        let (fix, ctx, journal) = setup();
        fix.main(&ctx, &args(&["-y"])).await.unwrap();
        assert_eq!(*journal.lock(), vec!["plush:true", "pop:true"]);
    }

    #[tokio::test]
    async fn test_runs_named_fixers_in_argument_order() {
        let (fix, ctx, journal) = setup();
        fix.main(&ctx, &args(&["pop", "plush"])).await.unwrap();
        assert_eq!(*journal.lock(), vec!["pop:false", "plush:false"]);
    }

    #[tokio::test]
    async fn test_unknown_fixer() {
        let (fix, ctx, journal) = setup();
        let err = fix.main(&ctx, &args(&["pop", "nope"])).await.unwrap_err();
        match err {
            Error::NotFound(message) => assert_eq!(message, "unknown fixer nope"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(*journal.lock(), vec!["pop:false"]);
    }

    #[tokio::test]
    async fn test_help_lists_fixers() {
        let (fix, ctx, journal) = setup();
        let out = CaptureBuffer::new();
        fix.set_stdout(out.writer());

        fix.main(&ctx, &args(&["--help"])).await.unwrap();

        let printed = out.contents();
        assert!(printed.contains("Fixers:"));
        assert!(printed.contains("plush"));
        assert!(printed.contains("-y, --yes"));
        assert!(journal.lock().is_empty());
    }

    #[test]
    fn test_sub_commands_are_fixers() {
        let (fix, ctx, _journal) = setup();
        let names: Vec<_> = fix
            .sub_commands(ctx.plugins())
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["plush", "pop"]);
    }
}
