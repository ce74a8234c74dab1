//! Build options - everything the build step needs to know

use crate::flags::ParsedFlags;
use crate::plugin::Plugin;
use chrono::{DateTime, SecondsFormat, Utc};
use kiln_foundation::config::CONFIG_DIR_NAME;
use kiln_foundation::env_detect::DEFAULT_ENVIRONMENT;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Build stamp written before compiling
pub const STAMP_FILE: &str = "build-info.json";

/// ldflags fragment that forces a static binary
pub const STATIC_LDFLAGS: &str = "-linkmode external -extldflags \"-static\"";

#[derive(Clone)]
pub struct BuildOptions {
    /// Application root; the compiler runs here
    pub app_root: PathBuf,
    /// Output binary, relative to `app_root` unless absolute
    pub bin: PathBuf,
    pub environment: String,
    pub ldflags: String,
    /// Value for `go build -mod`
    pub mod_flag: String,
    pub tags: Vec<String>,
    pub static_link: bool,
    /// Extra raw flags appended to the compiler call
    pub build_flags: Vec<String>,
    pub verbose: bool,
    pub dry_run: bool,
    pub skip_template_validation: bool,
    pub template_validators: Vec<Arc<dyn Plugin>>,
    pub build_time: DateTime<Utc>,
    pub build_version: String,
    /// Files the build writes and cleanup removes
    pub generated: Vec<PathBuf>,
}

impl BuildOptions {
    pub fn new(app_root: impl Into<PathBuf>) -> Self {
        let app_root = app_root.into();
        let build_time = Utc::now();
        Self {
            bin: default_bin(&app_root),
            generated: vec![stamp_path(&app_root)],
            app_root,
            environment: DEFAULT_ENVIRONMENT.to_string(),
            ldflags: String::new(),
            mod_flag: String::new(),
            tags: Vec::new(),
            static_link: false,
            build_flags: Vec::new(),
            verbose: false,
            dry_run: false,
            skip_template_validation: false,
            template_validators: Vec::new(),
            build_version: build_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            build_time,
        }
    }

    /// Options for `app_root` with the build command's flags applied
    pub fn from_flags(app_root: impl Into<PathBuf>, flags: &ParsedFlags) -> Self {
        let mut opts = Self::new(app_root);

        if let Some(bin) = flags.get_str("output").filter(|s| !s.is_empty()) {
            opts.bin = PathBuf::from(bin);
        }
        if let Some(env) = flags.get_str("environment").filter(|s| !s.is_empty()) {
            opts.environment = env.to_string();
        }
        if let Some(ldflags) = flags.get_str("ldflags") {
            opts.ldflags = ldflags.to_string();
        }
        if let Some(mod_flag) = flags.get_str("mod") {
            opts.mod_flag = mod_flag.to_string();
        }
        if let Some(tags) = flags.get_str("tags").filter(|s| !s.is_empty()) {
            opts.tags.push(tags.to_string());
        }

        opts.static_link = flags.get_bool("static");
        opts.verbose = flags.get_bool("verbose");
        opts.dry_run = flags.get_bool("dry-run");
        opts.skip_template_validation = flags.get_bool("skip-template-validation");
        opts
    }

    pub fn stamp_path(&self) -> PathBuf {
        stamp_path(&self.app_root)
    }

    /// Final ldflags: static linking, user flags, then version stamping
    pub fn full_ldflags(&self) -> String {
        let mut parts = Vec::new();
        if self.static_link {
            parts.push(STATIC_LDFLAGS.to_string());
        }
        if !self.ldflags.trim().is_empty() {
            parts.push(self.ldflags.trim().to_string());
        }
        parts.push(format!("-X main.BuildVersion={}", self.build_version));
        parts.push(format!(
            "-X main.BuildTime={}",
            self.build_time.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        parts.join(" ")
    }

    /// Arguments for `go`
    pub fn compiler_args(&self) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "-o".to_string(),
            self.bin.to_string_lossy().into_owned(),
        ];
        if !self.tags.is_empty() {
            args.push("-tags".to_string());
            args.push(self.tags.join(" "));
        }
        args.push("-ldflags".to_string());
        args.push(self.full_ldflags());
        if !self.mod_flag.is_empty() {
            args.push("-mod".to_string());
            args.push(self.mod_flag.clone());
        }
        args.extend(self.build_flags.iter().cloned());
        args
    }
}

impl std::fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOptions")
            .field("app_root", &self.app_root)
            .field("bin", &self.bin)
            .field("environment", &self.environment)
            .field("tags", &self.tags)
            .field("static_link", &self.static_link)
            .field("dry_run", &self.dry_run)
            .field("build_version", &self.build_version)
            .field(
                "template_validators",
                &self
                    .template_validators
                    .iter()
                    .map(|v| v.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// `bin/<app dir name>`, with `.exe` on Windows
pub fn default_bin(app_root: &Path) -> PathBuf {
    let name = app_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "app".to_string());
    let name = if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name
    };
    PathBuf::from("bin").join(name)
}

fn stamp_path(app_root: &Path) -> PathBuf {
    app_root.join(CONFIG_DIR_NAME).join(STAMP_FILE)
}
