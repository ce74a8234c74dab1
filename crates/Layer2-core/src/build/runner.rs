//! Runner - executes a build plan for real or describes it
//!
//! A dry runner prints what it would do and only runs read-only steps
//! (template validation). A wet runner hands every step to its executor.

use super::plan::{BuildPlan, BuildStep};
use crate::context::RunContext;
use crate::io::SharedWriter;
use crate::process::run_captured;
use async_trait::async_trait;
use kiln_foundation::{Error, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Dry,
    Wet,
}

// ============================================================================
// StepExecutor
// ============================================================================

/// Performs one build step
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, ctx: &RunContext, step: &BuildStep) -> Result<()>;
}

/// Real filesystem and processes
#[derive(Debug, Default)]
pub struct SystemExecutor;

#[async_trait]
impl StepExecutor for SystemExecutor {
    async fn execute(&self, ctx: &RunContext, step: &BuildStep) -> Result<()> {
        match step {
            BuildStep::ValidateTemplates { validator, root } => {
                let validator = Arc::clone(validator);
                let root = root.clone();
                tokio::task::spawn_blocking(move || match validator.as_template_validator() {
                    Some(v) => v.validate_templates(&root),
                    None => Ok(()),
                })
                .await
                .map_err(|e| Error::Internal(format!("template validation panicked: {e}")))?
            }
            BuildStep::WriteFile { path, contents } => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(path, contents).await?;
                Ok(())
            }
            BuildStep::Exec(spec) => {
                let line = spec.command_line();
                let output = run_captured(spec.to_command(), &line, ctx.cancellation()).await?;
                if !output.stdout.trim().is_empty() {
                    debug!(command = %line, "{}", output.stdout.trim());
                }
                if output.success() {
                    Ok(())
                } else {
                    let detail = output.stderr.trim();
                    let message = if detail.is_empty() {
                        format!("exited with {}", output.status)
                    } else {
                        detail.to_string()
                    };
                    Err(Error::subprocess(line, message))
                }
            }
        }
    }
}

// ============================================================================
// Runner
// ============================================================================

pub struct Runner {
    mode: RunMode,
    executor: Arc<dyn StepExecutor>,
    out: SharedWriter,
}

impl Runner {
    pub fn new(mode: RunMode, executor: Arc<dyn StepExecutor>, out: SharedWriter) -> Self {
        Self {
            mode,
            executor,
            out,
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn is_dry(&self) -> bool {
        self.mode == RunMode::Dry
    }

    /// Run every step in order, stopping at the first failure or on
    /// cancellation.
    pub async fn run(&self, ctx: &RunContext, plan: &BuildPlan) -> Result<()> {
        for step in plan.steps() {
            ctx.check_cancelled()?;

            if self.is_dry() && !step.is_read_only() {
                info!(step = %step, "Dry run, skipping");
                writeln!(self.out.lock(), "--> {}", step)?;
                continue;
            }

            info!(step = %step, "Running build step");
            self.executor.execute(ctx, step).await?;
        }
        Ok(())
    }
}
