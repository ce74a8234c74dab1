//! Build cleanup
//!
//! Once the build options are known, a [`CleanupGuard`] owns the removal of
//! generated files. It runs exactly once: explicitly at the end of the
//! pipeline, or on drop if the pipeline unwinds or is abandoned. A failed
//! cleanup is fatal and goes to the [`FatalHandler`].

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};

/// Called with a message when cleanup fails
pub type FatalHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Logs the failure and exits the process with status 1
pub fn exit_on_fatal() -> FatalHandler {
    Arc::new(|message: &str| {
        error!("{}", message);
        std::process::exit(1);
    })
}

pub struct CleanupGuard {
    files: Vec<PathBuf>,
    fatal: FatalHandler,
    done: bool,
}

impl CleanupGuard {
    pub fn new(files: Vec<PathBuf>, fatal: FatalHandler) -> Self {
        Self {
            files,
            fatal,
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Remove generated files; later calls do nothing
    pub fn run(&mut self) {
        if self.done {
            return;
        }
        self.done = true;

        for file in &self.files {
            match std::fs::remove_file(file) {
                Ok(()) => debug!(path = %file.display(), "Removed generated file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    (self.fatal)(&format!("build:clean: {}: {}", file.display(), e));
                    return;
                }
            }
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.run();
    }
}
