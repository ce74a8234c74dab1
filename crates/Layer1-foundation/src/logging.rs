//! Logging - tracing subscriber setup
//!
//! Log lines go to stderr so command output on stdout stays clean. The
//! filter sits behind a reload layer; commands such as `build -v` raise the
//! level after startup through [`set_level`].

use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

pub const DEFAULT_LEVEL: &str = "info";

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Install the global subscriber with `directive` as the initial filter.
pub fn init(directive: &str) -> Result<()> {
    let filter = parse_filter(directive)?;
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| Error::Internal(format!("logging already initialized: {e}")))?;

    let _ = FILTER_HANDLE.set(handle);
    Ok(())
}

/// Replace the active filter. No-op when [`init`] was never called.
pub fn set_level(directive: &str) -> Result<()> {
    let filter = parse_filter(directive)?;
    match FILTER_HANDLE.get() {
        Some(handle) => handle
            .reload(filter)
            .map_err(|e| Error::Internal(format!("failed to reload log filter: {e}"))),
        None => Ok(()),
    }
}

pub fn is_initialized() -> bool {
    FILTER_HANDLE.get().is_some()
}

fn parse_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| Error::Config(format!("invalid log filter '{directive}': {e}")))
}
