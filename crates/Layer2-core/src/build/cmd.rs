//! `kiln build` - before hooks, build step, after hooks
//!
//! ```text
//!  parse flags ─► before hooks ─► runner (dry | wet) ─► after hooks
//!                     │                 │                   │
//!                     └────── error ────┴───────────────────┴─► cleanup
//! ```
//!
//! Cleanup is armed as soon as the flags parse and runs on every path.

use super::cleanup::{exit_on_fatal, CleanupGuard, FatalHandler};
use super::options::BuildOptions;
use super::plan::BuildPlan;
use super::runner::{RunMode, Runner, StepExecutor, SystemExecutor};
use super::vcs;
use crate::context::RunContext;
use crate::flags::{FlagComposer, FlagSet, FlagSpec};
use crate::io::{SharedReader, SharedWriter, StreamSlots};
use crate::plugin::{
    Capability, Command, Describer, FlagPrinter, Plugin, PluginSet, StderrSetter, StdinSetter,
    StdoutSetter,
};
use async_trait::async_trait;
use kiln_foundation::event::build as build_events;
use kiln_foundation::{logging, Error, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const NAME: &str = "build";

pub struct BuildCommand {
    streams: StreamSlots,
    executor: Arc<dyn StepExecutor>,
    fatal: FatalHandler,
}

impl Default for BuildCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildCommand {
    pub fn new() -> Self {
        Self {
            streams: StreamSlots::new(),
            executor: Arc::new(SystemExecutor),
            fatal: exit_on_fatal(),
        }
    }

    /// Replace what performs each build step
    pub fn with_executor(mut self, executor: Arc<dyn StepExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Replace what happens when cleanup fails
    pub fn with_fatal_handler(mut self, fatal: FatalHandler) -> Self {
        self.fatal = fatal;
        self
    }

    fn composer(default_environment: &str) -> FlagComposer {
        FlagComposer::new(NAME).with_flags([
            FlagSpec::bool("dry-run", "runs the build 'dry'"),
            FlagSpec::bool("skip-template-validation", "skip validating templates"),
            FlagSpec::bool("help", "print this help").with_short('h'),
            FlagSpec::bool("verbose", "print debugging information").with_short('v'),
            FlagSpec::bool(
                "static",
                "build a static binary using --ldflags '-linkmode external -extldflags \"-static\"'",
            )
            .with_short('s'),
            FlagSpec::string("ldflags", "", "set any ldflags to be passed to the go build"),
            FlagSpec::string("mod", "", "-mod flag for go build"),
            FlagSpec::string("output", "", "set the name of the binary").with_short('o'),
            FlagSpec::string(
                "environment",
                default_environment,
                "set the environment for the binary",
            ),
            FlagSpec::string("tags", "", "compile with specific build tags").with_short('t'),
        ])
    }

    /// Intrinsic flags merged with every plugin contribution
    pub fn flag_set(plugins: &PluginSet, default_environment: &str) -> Result<FlagSet> {
        Self::composer(default_environment).compose(plugins)
    }

    fn print_help(&self, flags: &FlagSet) -> Result<()> {
        let out = self.streams.stdout();
        let mut out = out.lock();
        writeln!(out, "Usage: kiln {} [flags] [args...]", NAME)?;
        writeln!(out)?;
        writeln!(out, "{}", self.description())?;
        writeln!(out)?;
        writeln!(out, "Flags:")?;
        flags.print_defaults(&mut *out)?;
        Ok(())
    }

    async fn pipeline(&self, ctx: &RunContext, args: &[String], opts: &mut BuildOptions) -> Result<()> {
        let plugins = ctx.plugins();

        for plugin in plugins.with(Capability::BeforeBuilder) {
            ctx.check_cancelled()?;
            if let Some(hook) = plugin.as_before_builder() {
                debug!(plugin = plugin.name(), "Running before-build hook");
                hook.before_build(ctx, args)
                    .await
                    .map_err(|e| hook_error(plugin.name(), e))?;
            }
        }
        ctx.check_cancelled()?;

        let mode = if opts.dry_run { RunMode::Dry } else { RunMode::Wet };
        let runner = Runner::new(mode, Arc::clone(&self.executor), self.streams.stdout());

        if opts.verbose {
            opts.build_flags.push("-v".to_string());
            if let Err(e) = logging::set_level("debug") {
                warn!("Could not raise log level: {}", e);
            }
        }

        if !opts.skip_template_validation {
            opts.template_validators = plugins
                .with(Capability::TemplateValidator)
                .cloned()
                .collect();
        }

        opts.build_version =
            vcs::build_version(&opts.app_root, opts.build_time, ctx.cancellation()).await;

        let plan = BuildPlan::new(opts)?;
        info!(
            bin = %opts.bin.display(),
            environment = %opts.environment,
            dry_run = opts.dry_run,
            "Building"
        );
        runner.run(ctx, &plan).await?;

        for plugin in plugins.with(Capability::AfterBuilder) {
            ctx.check_cancelled()?;
            if let Some(hook) = plugin.as_after_builder() {
                debug!(plugin = plugin.name(), "Running after-build hook");
                hook.after_build(ctx, args)
                    .await
                    .map_err(|e| hook_error(plugin.name(), e))?;
            }
        }

        Ok(())
    }
}

fn hook_error(plugin: &str, e: Error) -> Error {
    match e {
        Error::Cancelled | Error::Hook { .. } => e,
        other => Error::hook(plugin, other),
    }
}

#[async_trait]
impl Command for BuildCommand {
    async fn main(&self, ctx: &RunContext, args: &[String]) -> Result<()> {
        let flags = Self::flag_set(ctx.plugins(), ctx.environment())?;
        let parsed = flags.parse(args)?;

        if parsed.get_bool("help") {
            return self.print_help(&flags);
        }

        let mut opts = BuildOptions::from_flags(ctx.working_dir(), &parsed);
        let mut cleanup = CleanupGuard::new(opts.generated.clone(), Arc::clone(&self.fatal));

        let bin = opts.bin.to_string_lossy().into_owned();
        ctx.bus()
            .publish(build_events::started(&bin, &opts.environment))
            .await;

        let hook_ctx = ctx.clone().with_flags(parsed);
        let result = self.pipeline(&hook_ctx, args, &mut opts).await;

        cleanup.run();

        match &result {
            Ok(()) => {
                ctx.bus()
                    .publish(build_events::finished(&bin, opts.dry_run))
                    .await
            }
            Err(e) => {
                warn!(error = %e, "Build failed");
                ctx.bus().publish(build_events::failed(&bin, e)).await
            }
        }

        result
    }

    fn aliases(&self) -> Vec<String> {
        vec!["b".to_string(), "install".to_string()]
    }
}

impl Describer for BuildCommand {
    fn description(&self) -> String {
        "Build the application binary, including bundling of assets".to_string()
    }
}

impl FlagPrinter for BuildCommand {
    fn print_flags(&self, plugins: &PluginSet, w: &mut dyn Write) -> Result<()> {
        let flags = Self::flag_set(plugins, kiln_foundation::env_detect::DEFAULT_ENVIRONMENT)?;
        flags.print_defaults(w)
    }
}

impl StdinSetter for BuildCommand {
    fn set_stdin(&self, r: SharedReader) {
        self.streams.set_stdin(r);
    }
}

impl StdoutSetter for BuildCommand {
    fn set_stdout(&self, w: SharedWriter) {
        self.streams.set_stdout(w);
    }
}

impl StderrSetter for BuildCommand {
    fn set_stderr(&self, w: SharedWriter) {
        self.streams.set_stderr(w);
    }
}

impl Plugin for BuildCommand {
    fn name(&self) -> &str {
        NAME
    }

    fn as_command(&self) -> Option<&dyn Command> {
        Some(self)
    }

    fn as_describer(&self) -> Option<&dyn Describer> {
        Some(self)
    }

    fn as_flag_printer(&self) -> Option<&dyn FlagPrinter> {
        Some(self)
    }

    fn as_stdin_setter(&self) -> Option<&dyn StdinSetter> {
        Some(self)
    }

    fn as_stdout_setter(&self) -> Option<&dyn StdoutSetter> {
        Some(self)
    }

    fn as_stderr_setter(&self) -> Option<&dyn StderrSetter> {
        Some(self)
    }
}
