//! Build version from version control

use crate::process::run_captured;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vcs {
    Git,
    Bzr,
}

impl Vcs {
    /// VCS whose metadata directory exists under `root`
    pub fn detect(root: &Path) -> Option<Self> {
        if root.join(".git").exists() {
            Some(Vcs::Git)
        } else if root.join(".bzr").exists() {
            Some(Vcs::Bzr)
        } else {
            None
        }
    }

    pub fn binary(&self) -> &'static str {
        match self {
            Vcs::Git => "git",
            Vcs::Bzr => "bzr",
        }
    }

    fn args(&self) -> &'static [&'static str] {
        match self {
            Vcs::Git => &["rev-parse", "--short", "HEAD"],
            Vcs::Bzr => &["revno"],
        }
    }
}

/// Short revision of `root`, or the RFC3339 build time when there is no
/// usable VCS.
pub async fn build_version(
    root: &Path,
    build_time: DateTime<Utc>,
    cancel: &CancellationToken,
) -> String {
    let fallback = build_time.to_rfc3339_opts(SecondsFormat::Secs, true);

    let Some(vcs) = Vcs::detect(root) else {
        return fallback;
    };
    if which::which(vcs.binary()).is_err() {
        debug!(vcs = vcs.binary(), "VCS binary not on PATH");
        return fallback;
    }

    let mut command = Command::new(vcs.binary());
    command.args(vcs.args()).current_dir(root);
    let line = crate::process::command_line(vcs.binary(), vcs.args().iter().copied());

    match run_captured(command, &line, cancel).await {
        Ok(output) if output.success() && !output.stdout.trim().is_empty() => {
            output.stdout.trim().to_string()
        }
        Ok(_) => fallback,
        Err(e) => {
            debug!(error = %e, "Could not read VCS revision");
            fallback
        }
    }
}
