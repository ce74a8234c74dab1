//! One-time initialization gates
//!
//! A [`OnceGate`] runs its body at most once; concurrent first callers wait
//! for the same run and every caller sees its outcome. [`gate`] hands out
//! process-wide gates keyed by a fixed identifier.

use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::debug;

pub struct OnceGate {
    key: String,
    outcome: OnceCell<std::result::Result<(), String>>,
}

impl OnceGate {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            outcome: OnceCell::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the body already ran (successfully or not)
    pub fn is_done(&self) -> bool {
        self.outcome.initialized()
    }

    /// Run `body` if no caller has run it yet and return the shared outcome.
    pub async fn run<F, Fut>(&self, body: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let outcome = self
            .outcome
            .get_or_init(|| async {
                debug!(gate = %self.key, "Running one-time body");
                body().await.map_err(|e| e.to_string())
            })
            .await;

        outcome.clone().map_err(|message| Error::OnceFailed {
            key: self.key.clone(),
            message,
        })
    }
}

static GATES: OnceLock<Mutex<HashMap<String, Arc<OnceGate>>>> = OnceLock::new();

/// Process-wide gate for `key`, created on first request.
pub fn gate(key: &str) -> Arc<OnceGate> {
    let gates = GATES.get_or_init(|| Mutex::new(HashMap::new()));
    let mut gates = gates.lock();
    Arc::clone(
        gates
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceGate::new(key))),
    )
}
