//! Event Bus - publish/subscribe for internal events
//!
//! Listeners are registered under a unique name together with a filter.
//! Every matching delivery runs on its own task, so a slow listener never
//! holds up the publisher or its siblings.

use super::types::KilnEvent;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

// ============================================================================
// EventListener Trait
// ============================================================================

/// Listener ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Receives events delivered by the bus.
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(&self, event: &KilnEvent);
}

// ============================================================================
// EventFilter
// ============================================================================

/// Selects events by kind.
///
/// An empty pattern or `*` accepts everything; anything else is a regular
/// expression searched for in the event kind.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pattern: Option<Regex>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self { pattern: None }
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern == "*" {
            return Ok(Self::all());
        }
        let regex = Regex::new(pattern)
            .map_err(|e| Error::Config(format!("invalid event pattern {pattern:?}: {e}")))?;
        Ok(Self {
            pattern: Some(regex),
        })
    }

    pub fn matches(&self, event: &KilnEvent) -> bool {
        match &self.pattern {
            Some(regex) => regex.is_match(&event.kind),
            None => true,
        }
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// Event bus settings
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Number of events kept in history
    pub history_size: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            history_size: 100,
        }
    }
}

struct RegisteredListener {
    id: ListenerId,
    listener: Arc<dyn EventListener>,
    filter: EventFilter,
}

/// Process event bus
///
/// ```ignore
/// let bus = EventBus::new();
/// bus.listen_named("audit", EventFilter::all(), Arc::new(MyListener)).await?;
/// bus.publish(KilnEvent::new("kiln:build:started")).await;
/// bus.flush().await;
/// ```
pub struct EventBus {
    config: EventBusConfig,

    listeners: RwLock<HashMap<String, RegisteredListener>>,

    listener_counter: AtomicU64,

    history: RwLock<Vec<KilnEvent>>,

    event_count: AtomicU64,

    /// Deliveries still running
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            config,
            listeners: RwLock::new(HashMap::new()),
            listener_counter: AtomicU64::new(0),
            history: RwLock::new(Vec::new()),
            event_count: AtomicU64::new(0),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Register a listener under a unique name.
    ///
    /// Fails if the name is already taken.
    pub async fn listen_named(
        &self,
        name: impl Into<String>,
        filter: EventFilter,
        listener: Arc<dyn EventListener>,
    ) -> Result<ListenerId> {
        let name = name.into();
        let mut listeners = self.listeners.write().await;

        if listeners.contains_key(&name) {
            return Err(Error::Plugin(format!(
                "listener {name:?} is already registered"
            )));
        }

        let id = ListenerId(self.listener_counter.fetch_add(1, Ordering::SeqCst));
        debug!(listener_name = %name, listener_id = %id, "Registering event listener");

        listeners.insert(
            name,
            RegisteredListener {
                id,
                listener,
                filter,
            },
        );

        Ok(id)
    }

    /// Publish an event.
    ///
    /// Returns once every matching delivery has been scheduled, not once
    /// they have finished. Use [`EventBus::flush`] to wait for them.
    pub async fn publish(&self, event: KilnEvent) {
        let count = self.event_count.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(event_id = %event.id, kind = %event.kind, "Publishing event #{}", count);

        {
            let mut history = self.history.write().await;
            history.push(event.clone());
            if history.len() > self.config.history_size {
                history.remove(0);
            }
        }

        let listeners = self.listeners.read().await;
        let mut spawned = Vec::new();
        for (name, registered) in listeners.iter() {
            if !registered.filter.matches(&event) {
                continue;
            }

            trace!(listener_name = %name, listener_id = %registered.id, kind = %event.kind, "Delivering event to listener");

            let listener = Arc::clone(&registered.listener);
            let event = event.clone();
            spawned.push(tokio::spawn(async move {
                listener.on_event(&event).await;
            }));
        }
        drop(listeners);

        let mut pending = self.pending.lock();
        pending.retain(|handle| !handle.is_finished());
        pending.extend(spawned);
    }

    /// Wait for every delivery scheduled so far to finish.
    pub async fn flush(&self) {
        let handles: Vec<_> = std::mem::take(&mut *self.pending.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("event listener task failed: {}", e);
            }
        }
    }

    /// Most recent events, newest first
    pub async fn history(&self, limit: Option<usize>) -> Vec<KilnEvent> {
        let history = self.history.read().await;
        let limit = limit.unwrap_or(history.len());
        history.iter().rev().take(limit).cloned().collect()
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }

    pub async fn listener_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.listeners.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Global EventBus
// ============================================================================

static GLOBAL_EVENT_BUS: OnceLock<Arc<EventBus>> = OnceLock::new();

/// Process-wide event bus
pub fn global_event_bus() -> Arc<EventBus> {
    GLOBAL_EVENT_BUS
        .get_or_init(|| Arc::new(EventBus::new()))
        .clone()
}
