//! Event Types - events published on the kiln event bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Event ID
// ============================================================================

/// Unique event identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// KilnEvent
// ============================================================================

/// An internal lifecycle event.
///
/// `kind` is the routing key listeners filter on (for example
/// `kiln:build:started`). The whole value is what external plugins receive
/// as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KilnEvent {
    pub id: EventId,

    pub kind: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub payload: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl KilnEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            kind: kind.into(),
            message: String::new(),
            payload: Map::new(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    pub fn with_error(mut self, error: impl std::fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

// ============================================================================
// Predefined events
// ============================================================================

/// Build lifecycle events
pub mod build {
    use super::*;

    pub const STARTED: &str = "kiln:build:started";
    pub const FINISHED: &str = "kiln:build:finished";
    pub const FAILED: &str = "kiln:build:err";

    pub fn started(bin: &str, environment: &str) -> KilnEvent {
        KilnEvent::new(STARTED)
            .with_payload("bin", Value::from(bin))
            .with_payload("environment", Value::from(environment))
    }

    pub fn finished(bin: &str, dry_run: bool) -> KilnEvent {
        KilnEvent::new(FINISHED)
            .with_payload("bin", Value::from(bin))
            .with_payload("dry_run", Value::from(dry_run))
    }

    pub fn failed(bin: &str, error: &crate::Error) -> KilnEvent {
        KilnEvent::new(FAILED)
            .with_payload("bin", Value::from(bin))
            .with_error(error)
    }
}
