//! Build plan - the ordered steps of one build
//!
//! ```text
//!  ValidateTemplates (one per validator)
//!        │
//!  WriteFile .kiln/build-info.json
//!        │
//!  Exec go build -o <bin> [-tags ..] -ldflags .. [-mod ..] [-v]
//! ```

use super::options::BuildOptions;
use crate::plugin::Plugin;
use crate::process::command_line;
use kiln_foundation::env_detect::ENV_VAR;
use kiln_foundation::Result;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub const COMPILER: &str = "go";

// ============================================================================
// Steps
// ============================================================================

/// One external invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecSpec {
    pub program: String,
    pub args: Vec<String>,
    pub dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl ExecSpec {
    pub fn command_line(&self) -> String {
        command_line(&self.program, self.args.iter().map(String::as_str))
    }

    pub fn to_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.dir)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        command
    }
}

#[derive(Clone)]
pub enum BuildStep {
    ValidateTemplates {
        validator: Arc<dyn Plugin>,
        root: PathBuf,
    },
    WriteFile {
        path: PathBuf,
        contents: String,
    },
    Exec(ExecSpec),
}

impl BuildStep {
    /// Validation only reads files, so it also runs during a dry run
    pub fn is_read_only(&self) -> bool {
        matches!(self, BuildStep::ValidateTemplates { .. })
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStep::ValidateTemplates { validator, root } => write!(
                f,
                "validate templates with {} in {}",
                validator.name(),
                root.display()
            ),
            BuildStep::WriteFile { path, .. } => write!(f, "write {}", path.display()),
            BuildStep::Exec(spec) => f.write_str(&spec.command_line()),
        }
    }
}

impl fmt::Debug for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuildStep({})", self)
    }
}

// ============================================================================
// BuildPlan
// ============================================================================

#[derive(Serialize)]
struct BuildInfo<'a> {
    version: &'a str,
    time: String,
    environment: &'a str,
    bin: String,
}

#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    steps: Vec<BuildStep>,
}

impl BuildPlan {
    pub fn new(opts: &BuildOptions) -> Result<Self> {
        let mut steps = Vec::new();

        if !opts.skip_template_validation {
            for validator in &opts.template_validators {
                steps.push(BuildStep::ValidateTemplates {
                    validator: Arc::clone(validator),
                    root: opts.app_root.clone(),
                });
            }
        }

        let info = BuildInfo {
            version: &opts.build_version,
            time: opts.build_time.to_rfc3339(),
            environment: &opts.environment,
            bin: opts.bin.to_string_lossy().into_owned(),
        };
        steps.push(BuildStep::WriteFile {
            path: opts.stamp_path(),
            contents: serde_json::to_string_pretty(&info)?,
        });

        steps.push(BuildStep::Exec(ExecSpec {
            program: COMPILER.to_string(),
            args: opts.compiler_args(),
            dir: opts.app_root.clone(),
            env: vec![(ENV_VAR.to_string(), opts.environment.clone())],
        }));

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Validator;

    impl Plugin for Validator {
        fn name(&self) -> &str {
            "tmpl"
        }
    }

    #[test]
    fn test_plan_order() {
        let mut opts = BuildOptions::new("/work/coke");
        opts.environment = "production".into();
        opts.template_validators = vec![Arc::new(Validator) as Arc<dyn Plugin>];

        let plan = BuildPlan::new(&opts).unwrap();
        let steps = plan.steps();
        assert_eq!(steps.len(), 3);
        assert!(steps[0].is_read_only());
        assert!(matches!(&steps[1], BuildStep::WriteFile { path, .. } if path.ends_with(".kiln/build-info.json")));

        match &steps[2] {
            BuildStep::Exec(spec) => {
                assert_eq!(spec.program, "go");
                assert_eq!(spec.args[0], "build");
                assert!(spec
                    .env
                    .contains(&("KILN_ENV".to_string(), "production".to_string())));
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_skip_validation() {
        let mut opts = BuildOptions::new("/work/coke");
        opts.template_validators = vec![Arc::new(Validator) as Arc<dyn Plugin>];
        opts.skip_template_validation = true;

        let plan = BuildPlan::new(&opts).unwrap();
        assert!(plan.steps().iter().all(|s| !s.is_read_only()));
    }

    #[test]
    fn test_stamp_contents() {
        let mut opts = BuildOptions::new("/work/coke");
        opts.build_version = "deadbeef".into();
        let plan = BuildPlan::new(&opts).unwrap();

        let BuildStep::WriteFile { contents, .. } = &plan.steps()[0] else {
            panic!("expected stamp first");
        };
        let info: serde_json::Value = serde_json::from_str(contents).unwrap();
        assert_eq!(info["version"], "deadbeef");
        assert_eq!(info["environment"], "development");
    }
}
