//! Run Context - what a command invocation can see
//!
//! Carries the working directory, the default environment, the plugin set,
//! the event bus, and a cancellation token. The build command hands hooks a
//! child context that also holds its parsed flags.

use crate::flags::ParsedFlags;
use crate::plugin::PluginSet;
use kiln_foundation::env_detect::DEFAULT_ENVIRONMENT;
use kiln_foundation::{global_event_bus, Error, EventBus, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct RunContext {
    working_dir: PathBuf,
    environment: String,
    plugins: PluginSet,
    bus: Arc<EventBus>,
    cancel: CancellationToken,
    flags: Option<Arc<ParsedFlags>>,
}

impl RunContext {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            plugins: PluginSet::default(),
            bus: global_event_bus(),
            cancel: CancellationToken::new(),
            flags: None,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_plugins(mut self, plugins: PluginSet) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_flags(mut self, flags: ParsedFlags) -> Self {
        self.flags = Some(Arc::new(flags));
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Configured default environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Flags parsed by the invoking command, if any
    pub fn flags(&self) -> Option<&ParsedFlags> {
        self.flags.as_deref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `Err(Cancelled)` once the token has fired
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("working_dir", &self.working_dir)
            .field("environment", &self.environment)
            .field("plugins", &self.plugins)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = RunContext::new("/tmp/app");
        assert_eq!(ctx.environment(), "development");
        assert!(ctx.flags().is_none());
        assert!(ctx.plugins().is_empty());
        assert!(ctx.check_cancelled().is_ok());
    }

    #[test]
    fn test_cancel_is_shared_by_clones() {
        let ctx = RunContext::new(".");
        let child = ctx.clone().with_flags(ParsedFlags::default());

        ctx.cancellation().cancel();
        assert!(child.is_cancelled());
        assert!(matches!(child.check_cancelled(), Err(Error::Cancelled)));
    }
}
