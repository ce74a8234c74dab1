//! kiln - Main entry point
//!
//! ```text
//!  env + settings ─► logging ─► discovery ─► event plugins ─► App::main
//! ```

use anyhow::Context;
use kiln_core::plugin::PathDiscovery;
use kiln_core::{default_plugins, load_plugins, App, DescriptorSource, RunContext};
use kiln_foundation::{global_event_bus, logging, ConfigLoader, RuntimeEnv};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = RuntimeEnv::detect();
    let config = ConfigLoader::new(&env.current_dir)
        .load_all()
        .context("loading settings")?
        .apply_env(&env);

    logging::init(
        config
            .log_level
            .as_deref()
            .unwrap_or(logging::DEFAULT_LEVEL),
    )?;
    debug!(
        environment = %config.environment,
        test_mode = env.test_mode,
        os = env.os.name(),
        "Starting kiln"
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    let discovery = PathDiscovery::from_config(&config).with_cancellation(cancel.clone());
    let descriptors = discovery
        .descriptors()
        .await
        .context("discovering plugins")?;

    let bus = global_event_bus();
    load_plugins(&descriptors, Arc::clone(&bus), &env, cancel.clone())
        .await
        .context("loading event plugins")?;

    let context = RunContext::new(&env.current_dir)
        .with_environment(config.environment.clone())
        .with_bus(Arc::clone(&bus))
        .with_cancellation(cancel);

    let app = App::new(default_plugins(&config, &descriptors), context);
    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = app.main(&args).await;

    bus.flush().await;
    result?;
    Ok(())
}
