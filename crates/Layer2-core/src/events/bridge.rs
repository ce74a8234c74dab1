//! Event bridge
//!
//! ```text
//!  EventBus ──► "[PLUGIN] kiln-slack notify" ──► kiln-slack notify '<event json>'
//!           └─► "[PLUGIN] kiln-audit log"    ──► kiln-audit log '<event json>'
//! ```
//!
//! Registration happens once per process behind the `events.load_plugins`
//! gate and is skipped in test mode. Deliveries never fail the publisher: a
//! plugin that cannot be run is logged and forgotten. Cancelling the
//! bridge's token kills plugins still running.

use crate::plugin::{category, DescriptorSource, PluginDescriptor};
use crate::process::run_inherited;
use async_trait::async_trait;
use kiln_foundation::once::{self, OnceGate};
use kiln_foundation::{
    Error, EventBus, EventFilter, EventListener, KilnEvent, Result, RuntimeEnv,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const LOAD_PLUGINS_KEY: &str = "events.load_plugins";

// ============================================================================
// ForwardingListener
// ============================================================================

/// Sends every delivered event to an external plugin as JSON
pub struct ForwardingListener {
    descriptor: PluginDescriptor,
    cancel: CancellationToken,
}

impl ForwardingListener {
    pub fn new(descriptor: PluginDescriptor, cancel: CancellationToken) -> Self {
        Self { descriptor, cancel }
    }

    /// Listener name on the bus
    pub fn listener_name(descriptor: &PluginDescriptor) -> String {
        format!(
            "[PLUGIN] {} {}",
            descriptor.binary.display(),
            descriptor.name
        )
    }
}

#[async_trait]
impl EventListener for ForwardingListener {
    async fn on_event(&self, event: &KilnEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                warn!(kind = %event.kind, error = %e, "Could not marshal event");
                return;
            }
        };

        let args = [json];
        let line = self.descriptor.command_line(&args);
        let command = self.descriptor.to_command(&args);

        match run_inherited(command, &line, &self.cancel).await {
            Ok(status) if status.success() => {
                debug!(plugin = %self.descriptor.name, kind = %event.kind, "Event sent to plugin");
            }
            Ok(status) => warn!(command = %line, %status, "Error trying to send event"),
            Err(Error::Cancelled) => debug!(command = %line, "Event delivery cancelled"),
            Err(e) => warn!(command = %line, error = %e, "Error trying to send event"),
        }
    }
}

// ============================================================================
// EventBridge
// ============================================================================

pub struct EventBridge {
    gate: Arc<OnceGate>,
    bus: Arc<EventBus>,
    test_mode: bool,
    cancel: CancellationToken,
}

impl EventBridge {
    /// A bridge with its own gate
    pub fn new(bus: Arc<EventBus>, test_mode: bool) -> Self {
        Self {
            gate: Arc::new(OnceGate::new(LOAD_PLUGINS_KEY)),
            bus,
            test_mode,
            cancel: CancellationToken::new(),
        }
    }

    /// A bridge sharing the process-wide `events.load_plugins` gate
    pub fn global(bus: Arc<EventBus>, test_mode: bool) -> Self {
        Self {
            gate: once::gate(LOAD_PLUGINS_KEY),
            bus,
            test_mode,
            cancel: CancellationToken::new(),
        }
    }

    /// Plugins started by this bridge are killed when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.gate.is_done()
    }

    /// Register a listener for every `events` descriptor from `source`.
    ///
    /// Only the first call does any work; later calls return its outcome.
    pub async fn load_plugins(&self, source: &dyn DescriptorSource) -> Result<()> {
        self.gate
            .run(move || async move {
                if self.test_mode {
                    debug!("Test mode, not loading event plugins");
                    return Ok(());
                }
                let descriptors = source.descriptors().await?;
                let count = register_listeners(&self.bus, &descriptors, &self.cancel).await?;
                info!(count, "Loaded event plugins");
                Ok(())
            })
            .await
    }
}

/// Register forwarding listeners for the `events` descriptors; returns how
/// many were registered.
pub async fn register_listeners(
    bus: &EventBus,
    descriptors: &[PluginDescriptor],
    cancel: &CancellationToken,
) -> Result<usize> {
    let mut count = 0;
    for descriptor in descriptors.iter().filter(|d| d.is(category::EVENTS)) {
        let name = ForwardingListener::listener_name(descriptor);
        let filter = EventFilter::pattern(&descriptor.listen_for)?;
        bus.listen_named(
            name,
            filter,
            Arc::new(ForwardingListener::new(descriptor.clone(), cancel.clone())),
        )
        .await?;
        count += 1;
    }
    Ok(count)
}

/// Process-wide entry point: load event plugins into `bus` once.
pub async fn load_plugins(
    source: &dyn DescriptorSource,
    bus: Arc<EventBus>,
    env: &RuntimeEnv,
    cancel: CancellationToken,
) -> Result<()> {
    EventBridge::global(bus, env.test_mode)
        .with_cancellation(cancel)
        .load_plugins(source)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_foundation::event::build;
    use std::path::PathBuf;
    use std::time::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn events_descriptor(
        name: &str,
        binary: &str,
        use_command: &str,
        pattern: &str,
    ) -> PluginDescriptor {
        PluginDescriptor {
            name: name.into(),
            use_command: use_command.into(),
            kiln_command: category::EVENTS.into(),
            listen_for: pattern.into(),
            binary: PathBuf::from(binary),
            ..Default::default()
        }
    }

    struct CountingSource {
        descriptors: Vec<PluginDescriptor>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DescriptorSource for CountingSource {
        async fn descriptors(&self) -> Result<Vec<PluginDescriptor>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.descriptors.clone())
        }
    }

    #[tokio::test]
    async fn test_registers_named_listeners_once() {
        let bus = Arc::new(EventBus::new());
        let bridge = EventBridge::new(Arc::clone(&bus), false);
        let source = CountingSource {
            descriptors: vec![
                events_descriptor("notify", "kiln-slack", "notify", "kiln:build:.*"),
                PluginDescriptor {
                    name: "deploy".into(),
                    kiln_command: category::ROOT.into(),
                    ..Default::default()
                },
            ],
            calls: AtomicUsize::new(0),
        };

        bridge.load_plugins(&source).await.unwrap();
        bridge.load_plugins(&source).await.unwrap();

        assert!(bridge.is_loaded());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            bus.listener_names().await,
            vec!["[PLUGIN] kiln-slack notify".to_string()]
        );
    }

    #[tokio::test]
    async fn test_test_mode_skips_registration() {
        let bus = Arc::new(EventBus::new());
        let bridge = EventBridge::new(Arc::clone(&bus), true);
        let descriptors = vec![events_descriptor("notify", "kiln-slack", "notify", "")];

        bridge.load_plugins(&descriptors).await.unwrap();
        assert!(bridge.is_loaded());
        assert_eq!(bus.listener_count().await, 0);
    }

    #[tokio::test]
    async fn test_registration_failure_is_returned_every_time() {
        let bus = Arc::new(EventBus::new());
        let bridge = EventBridge::new(Arc::clone(&bus), false);
        // the same binary and name twice collide on the listener name
        let descriptors = vec![
            events_descriptor("notify", "kiln-slack", "a", ""),
            events_descriptor("notify", "kiln-slack", "b", ""),
        ];

        let first = bridge.load_plugins(&descriptors).await.unwrap_err();
        let second = bridge.load_plugins(&descriptors).await.unwrap_err();
        assert!(matches!(first, Error::OnceFailed { .. }));
        assert_eq!(first.to_string(), second.to_string());
    }

    #[tokio::test]
    async fn test_unrunnable_plugin_does_not_fail_delivery() {
        let bus = Arc::new(EventBus::new());
        let descriptors = vec![events_descriptor(
            "notify",
            "/nonexistent/kiln-missing",
            "notify",
            "",
        )];
        register_listeners(&bus, &descriptors, &CancellationToken::new())
            .await
            .unwrap();

        bus.publish(build::started("bin/app", "development")).await;
        bus.flush().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_forwards_matching_events_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("listener.sh");
        let received = dir.path().join("received");
        std::fs::write(
            &script,
            format!("printf '%s\\n' \"$1\" >> '{}'\n", received.display()),
        )
        .unwrap();

        let bus = Arc::new(EventBus::new());
        let descriptors = vec![events_descriptor(
            "notify",
            "sh",
            &script.to_string_lossy(),
            "kiln:build:.*",
        )];
        let registered = register_listeners(&bus, &descriptors, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(registered, 1);

        bus.publish(KilnEvent::new("app:other")).await;
        bus.publish(build::started("bin/app", "production")).await;
        bus.flush().await;

        let contents = std::fs::read_to_string(&received).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let event: KilnEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(event.kind, build::STARTED);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_running_plugins() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow.sh");
        std::fs::write(&script, "sleep 30\n").unwrap();

        let bus = Arc::new(EventBus::new());
        let cancel = CancellationToken::new();
        let bridge = EventBridge::new(Arc::clone(&bus), false).with_cancellation(cancel.clone());
        let descriptors = vec![events_descriptor(
            "notify",
            "sh",
            &script.to_string_lossy(),
            "",
        )];
        bridge.load_plugins(&descriptors).await.unwrap();

        bus.publish(build::started("bin/app", "development")).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), bus.flush())
            .await
            .expect("cancelled delivery must finish promptly");
    }
}
