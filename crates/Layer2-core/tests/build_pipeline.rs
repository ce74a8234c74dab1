//! Build pipeline integration tests - hooks, cleanup, flag composition
//!
//! `cargo test -p kiln-core --test build_pipeline`

use async_trait::async_trait;
use kiln_core::build::{BuildStep, StepExecutor};
use kiln_core::{
    AfterBuilder, App, BeforeBuilder, BuildCommand, BuildPflagger, Error, FlagSpec, Plugin,
    PluginSet, Result, RunContext,
};
use kiln_foundation::EventBus;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

type Journal = Arc<Mutex<Vec<String>>>;

/// Records steps into the journal and leaves a stamp file behind, the way
/// a real build would.
struct JournalExecutor {
    journal: Journal,
    fail_compile: bool,
}

#[async_trait]
impl StepExecutor for JournalExecutor {
    async fn execute(&self, _ctx: &RunContext, step: &BuildStep) -> Result<()> {
        if let BuildStep::WriteFile { path, contents } = step {
            std::fs::create_dir_all(path.parent().unwrap())?;
            std::fs::write(path, contents)?;
        }
        let kind = match step {
            BuildStep::ValidateTemplates { .. } => "validate",
            BuildStep::WriteFile { .. } => "stamp",
            BuildStep::Exec(_) => "compile",
        };
        self.journal.lock().push(format!("step:{kind}"));
        if self.fail_compile && matches!(step, BuildStep::Exec(_)) {
            return Err(Error::subprocess("go build", "exit status 2"));
        }
        Ok(())
    }
}

struct Hook {
    name: &'static str,
    journal: Journal,
    fail_before: bool,
    fail_after: bool,
    flags: Vec<FlagSpec>,
}

#[async_trait]
impl BeforeBuilder for Hook {
    async fn before_build(&self, _ctx: &RunContext, _args: &[String]) -> Result<()> {
        self.journal.lock().push(format!("{}:before", self.name));
        if self.fail_before {
            return Err(Error::Internal("refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AfterBuilder for Hook {
    async fn after_build(&self, _ctx: &RunContext, _args: &[String]) -> Result<()> {
        self.journal.lock().push(format!("{}:after", self.name));
        if self.fail_after {
            return Err(Error::Internal("after refused".into()));
        }
        Ok(())
    }
}

impl BuildPflagger for Hook {
    fn build_pflags(&self) -> Vec<FlagSpec> {
        self.flags.clone()
    }
}

impl Plugin for Hook {
    fn name(&self) -> &str {
        self.name
    }

    fn as_before_builder(&self) -> Option<&dyn BeforeBuilder> {
        Some(self)
    }

    fn as_after_builder(&self) -> Option<&dyn AfterBuilder> {
        Some(self)
    }

    fn as_build_pflagger(&self) -> Option<&dyn BuildPflagger> {
        Some(self)
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    journal: Journal,
    fatal: Journal,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            journal: Arc::new(Mutex::new(Vec::new())),
            fatal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn hook(&self, name: &'static str, fail_before: bool, flags: Vec<FlagSpec>) -> Arc<dyn Plugin> {
        Arc::new(Hook {
            name,
            journal: Arc::clone(&self.journal),
            fail_before,
            fail_after: false,
            flags,
        })
    }

    fn failing_after(&self, name: &'static str) -> Arc<dyn Plugin> {
        Arc::new(Hook {
            name,
            journal: Arc::clone(&self.journal),
            fail_before: false,
            fail_after: true,
            flags: Vec::new(),
        })
    }

    fn app(&self, hooks: Vec<Arc<dyn Plugin>>) -> App {
        self.app_with(hooks, false)
    }

    fn app_with(&self, hooks: Vec<Arc<dyn Plugin>>, fail_compile: bool) -> App {
        let fatal = Arc::clone(&self.fatal);
        let build = BuildCommand::new()
            .with_executor(Arc::new(JournalExecutor {
                journal: Arc::clone(&self.journal),
                fail_compile,
            }))
            .with_fatal_handler(Arc::new(move |m: &str| fatal.lock().push(m.to_string())));

        let mut plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(build)];
        plugins.extend(hooks);

        let context = RunContext::new(self.dir.path()).with_bus(Arc::new(EventBus::new()));
        App::new(PluginSet::new(plugins), context)
    }

    fn stamp(&self) -> PathBuf {
        self.dir.path().join(".kiln").join("build-info.json")
    }

    fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_hooks_run_in_declaration_order_around_the_build() {
    let fx = Fixture::new();
    let app = fx.app(vec![
        fx.hook("first", false, Vec::new()),
        fx.hook("second", false, Vec::new()),
    ]);

    app.main(&args(&["build", "--skip-template-validation"]))
        .await
        .unwrap();

    assert_eq!(
        fx.journal(),
        vec![
            "first:before",
            "second:before",
            "step:stamp",
            "step:compile",
            "first:after",
            "second:after",
        ]
    );
    assert!(!fx.stamp().exists());
    assert!(fx.fatal.lock().is_empty());
}

#[tokio::test]
async fn test_failing_before_hook_skips_build_and_cleans_up() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.stamp().parent().unwrap()).unwrap();
    std::fs::write(fx.stamp(), "{}").unwrap();

    let app = fx.app(vec![
        fx.hook("first", true, Vec::new()),
        fx.hook("second", false, Vec::new()),
    ]);

    let err = app.main(&args(&["b"])).await.unwrap_err();

    match err {
        Error::Hook { plugin, message } => {
            assert_eq!(plugin, "first");
            assert!(message.contains("refused"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(fx.journal(), vec!["first:before"]);
    assert!(!fx.stamp().exists());
    assert!(fx.fatal.lock().is_empty());
}

#[tokio::test]
async fn test_failing_build_step_skips_after_hooks_and_cleans_up() {
    let fx = Fixture::new();
    let app = fx.app_with(vec![fx.hook("first", false, Vec::new())], true);

    let err = app
        .main(&args(&["build", "--skip-template-validation"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Subprocess { .. }));
    assert_eq!(
        fx.journal(),
        vec!["first:before", "step:stamp", "step:compile"]
    );
    assert!(!fx.stamp().exists());
    assert!(fx.fatal.lock().is_empty());
}

#[tokio::test]
async fn test_failing_after_hook_stops_later_hooks_and_cleans_up() {
    let fx = Fixture::new();
    let app = fx.app(vec![
        fx.failing_after("first"),
        fx.hook("second", false, Vec::new()),
    ]);

    let err = app
        .main(&args(&["build", "--skip-template-validation"]))
        .await
        .unwrap_err();

    match err {
        Error::Hook { plugin, message } => {
            assert_eq!(plugin, "first");
            assert!(message.contains("after refused"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(
        fx.journal(),
        vec![
            "first:before",
            "second:before",
            "step:stamp",
            "step:compile",
            "first:after",
        ]
    );
    assert!(!fx.stamp().exists());
    assert!(fx.fatal.lock().is_empty());
}

#[tokio::test]
async fn test_plugin_flags_reach_the_build() {
    let fx = Fixture::new();
    let app = fx.app(vec![fx.hook(
        "assets",
        false,
        vec![FlagSpec::bool("skip-assets", "skip").with_short('k')],
    )]);

    app.main(&args(&["install", "-k", "--dry-run"]))
        .await
        .unwrap();

    assert_eq!(fx.journal(), vec!["assets:before", "assets:after"]);
}

#[tokio::test]
async fn test_colliding_plugin_flags_are_rejected() {
    let fx = Fixture::new();
    let app = fx.app(vec![
        fx.hook("one", false, vec![FlagSpec::bool("fast", "go fast")]),
        fx.hook("two", false, vec![FlagSpec::bool("fast", "go faster")]),
    ]);

    let err = app.main(&args(&["build"])).await.unwrap_err();

    match err {
        Error::FlagCollision { flag, first, second } => {
            assert_eq!(flag, "fast");
            assert_eq!(first, "one");
            assert_eq!(second, "two");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(fx.journal().is_empty());
}

#[tokio::test]
async fn test_shorthand_colliding_with_intrinsic_flag_is_rejected() {
    let fx = Fixture::new();
    let app = fx.app(vec![fx.hook(
        "verbose-ish",
        false,
        vec![FlagSpec::bool("very", "very").with_short('v')],
    )]);

    let err = app.main(&args(&["build"])).await.unwrap_err();
    assert!(matches!(err, Error::FlagCollision { .. }));
}
