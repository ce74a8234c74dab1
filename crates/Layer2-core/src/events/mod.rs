//! Events - forwarding internal events to external plugins
//!
//! - `bridge.rs` - registers one bus listener per `events` plugin descriptor

pub mod bridge;

pub use bridge::{
    load_plugins, register_listeners, EventBridge, ForwardingListener, LOAD_PLUGINS_KEY,
};
