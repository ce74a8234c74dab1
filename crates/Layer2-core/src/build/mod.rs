//! Build - the `build` command and its pipeline
//!
//! - `cmd.rs` - command, flag composition, hook ordering
//! - `options.rs` - build options and compiler arguments
//! - `plan.rs` - ordered build steps
//! - `runner.rs` - dry/wet execution of a plan
//! - `cleanup.rs` - run-once cleanup with a fatal handler
//! - `vcs.rs` - build version from git/bzr

pub mod cleanup;
pub mod cmd;
pub mod options;
pub mod plan;
pub mod runner;
pub mod vcs;

pub use cleanup::{exit_on_fatal, CleanupGuard, FatalHandler};
pub use cmd::BuildCommand;
pub use options::BuildOptions;
pub use plan::{BuildPlan, BuildStep, ExecSpec};
pub use runner::{RunMode, Runner, StepExecutor, SystemExecutor};
