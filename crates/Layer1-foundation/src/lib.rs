//! # kiln-foundation
//!
//! Foundation layer for kiln:
//! - Error: shared error type
//! - Event: named-listener event bus and build events
//! - Once: one-time initialization gates
//! - Config: layered `settings.json`
//! - Env: runtime environment detection
//! - Logging: tracing subscriber with a reloadable filter

pub mod config;
pub mod env_detect;
pub mod error;
pub mod event;
pub mod logging;
pub mod once;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Event
// ============================================================================
pub use event::{
    global_event_bus, EventBus, EventBusConfig, EventFilter, EventListener, KilnEvent,
    ListenerId,
};

// ============================================================================
// Config & Env
// ============================================================================
pub use config::{ConfigLoader, KilnConfig};
pub use env_detect::{OsType, RuntimeEnv};

// ============================================================================
// Once
// ============================================================================
pub use once::OnceGate;
