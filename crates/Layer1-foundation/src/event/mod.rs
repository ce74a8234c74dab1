//! Event System - internal publish/subscribe
//!
//! ```text
//!  publish(event) ──► EventBus ──┬──► listener "audit"         (own task)
//!                                └──► listener "[PLUGIN] ..."  (own task)
//! ```

pub mod bus;
pub mod types;

pub use bus::{
    global_event_bus, EventBus, EventBusConfig, EventFilter, EventListener, ListenerId,
};
pub use types::{build, EventId, KilnEvent};
