//! Assets - bundles front-end assets before the binary is built
//!
//! ```text
//!  --skip-assets        print "skipping assets", nothing else
//!  --clean-assets       remove public/assets first
//!  bundle               yarnpkg|npm run build, or node_modules/.bin/webpack
//!  --extract-assets     zip public/assets into bin/assets.zip
//! ```

use crate::build::ExecSpec;
use crate::context::RunContext;
use crate::flags::{FlagComposer, FlagSpec};
use crate::io::{SharedReader, SharedWriter, StreamSlots};
use crate::plugin::{
    BeforeBuilder, BuildPflagger, Describer, FlagPrinter, Plugin, PluginSet, StderrSetter,
    StdinSetter, StdoutSetter,
};
use crate::process::run_captured;
use async_trait::async_trait;
use ignore::WalkBuilder;
use kiln_foundation::{Error, OsType, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const NAME: &str = "assets";

const ASSETS_DIR: &str = "public/assets";
const ARCHIVE: &str = "bin/assets.zip";

#[derive(Default)]
pub struct AssetsBuilder {
    streams: StreamSlots,
}

impl AssetsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn say(&self, line: &str) -> Result<()> {
        let out = self.streams.stdout();
        let mut out = out.lock();
        writeln!(out, "{}", line)?;
        Ok(())
    }
}

// ============================================================================
// Bundler selection
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    #[serde(default)]
    scripts: HashMap<String, String>,
}

/// Local webpack binary, `.cmd` on Windows
pub fn webpack_bin(root: &Path, os: OsType) -> PathBuf {
    root.join("node_modules")
        .join(".bin")
        .join(format!("webpack{}", os.script_suffix()))
}

/// The command that bundles the assets of `root`, if the app has any.
///
/// A `build` script in package.json wins; it runs with yarnpkg when a
/// yarn.lock exists and npm otherwise. Without one the local webpack binary
/// is used.
pub fn bundler_command(root: &Path, environment: &str, os: OsType) -> Result<Option<ExecSpec>> {
    let env = vec![("NODE_ENV".to_string(), environment.to_string())];

    let package = root.join("package.json");
    if package.exists() {
        let package: PackageJson = serde_json::from_str(&std::fs::read_to_string(&package)?)?;
        if package.scripts.contains_key("build") {
            let tool = if root.join("yarn.lock").exists() {
                "yarnpkg"
            } else {
                "npm"
            };
            return Ok(Some(ExecSpec {
                program: tool.to_string(),
                args: vec!["run".to_string(), "build".to_string()],
                dir: root.to_path_buf(),
                env,
            }));
        }
    }

    let webpack = webpack_bin(root, os);
    if !webpack.exists() {
        return Ok(None);
    }
    Ok(Some(ExecSpec {
        program: webpack.to_string_lossy().to_string(),
        args: Vec::new(),
        dir: root.to_path_buf(),
        env,
    }))
}

// ============================================================================
// Archive
// ============================================================================

/// Zip the contents of `source` into `target`; returns the number of files
pub fn archive(source: &Path, target: &Path) -> Result<usize> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let zip_error = |e: zip::result::ZipError| Error::Internal(format!("{}: {}", target.display(), e));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(File::create(target)?);
    let mut count = 0;

    for entry in WalkBuilder::new(source).standard_filters(false).build() {
        let entry = entry.map_err(|e| Error::Internal(format!("walk {}: {}", source.display(), e)))?;
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(source) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_some_and(|t| t.is_dir()) {
            zip.add_directory(name, options).map_err(zip_error)?;
            continue;
        }

        zip.start_file(name, options).map_err(zip_error)?;
        let mut file = File::open(path)?;
        std::io::copy(&mut file, &mut zip)?;
        count += 1;
    }

    zip.finish().map_err(zip_error)?;
    Ok(count)
}

fn remove_dir(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Plugin
// ============================================================================

#[async_trait]
impl BeforeBuilder for AssetsBuilder {
    async fn before_build(&self, ctx: &RunContext, _args: &[String]) -> Result<()> {
        let flags = ctx.flags();
        let flag = |name: &str| flags.is_some_and(|f| f.get_bool(name));

        if flag("skip-assets") {
            return self.say("skipping assets");
        }

        let root = ctx.working_dir().to_path_buf();
        let environment = flags
            .and_then(|f| f.get_str("environment"))
            .unwrap_or_else(|| ctx.environment())
            .to_string();
        let dry_run = flag("dry-run");
        let assets_dir = root.join(ASSETS_DIR);

        let Some(bundler) = bundler_command(&root, &environment, OsType::detect())? else {
            debug!(root = %root.display(), "No asset pipeline found");
            return Ok(());
        };

        if dry_run {
            if flag("clean-assets") {
                self.say(&format!("--> remove {}", assets_dir.display()))?;
            }
            self.say(&format!("--> {}", bundler.command_line()))?;
            if flag("extract-assets") {
                self.say(&format!("--> archive {} into {}", ASSETS_DIR, ARCHIVE))?;
            }
            return Ok(());
        }

        if flag("clean-assets") {
            debug!(path = %assets_dir.display(), "Cleaning assets");
            remove_dir(&assets_dir)?;
        }

        let line = bundler.command_line();
        info!(command = %line, environment = %environment, "Bundling assets");
        let output = run_captured(bundler.to_command(), &line, ctx.cancellation()).await?;
        if !output.success() {
            return Err(Error::subprocess(line, output.combined()));
        }
        debug!(output = %output.combined(), "Bundler finished");

        if flag("extract-assets") {
            let target = root.join(ARCHIVE);
            let count = tokio::task::spawn_blocking(move || archive(&assets_dir, &target))
                .await
                .map_err(|e| Error::Internal(e.to_string()))??;
            info!(files = count, archive = ARCHIVE, "Archived assets");
        }
        Ok(())
    }
}

impl BuildPflagger for AssetsBuilder {
    fn build_pflags(&self) -> Vec<FlagSpec> {
        vec![
            FlagSpec::bool("clean-assets", "will delete public/assets before calling webpack"),
            FlagSpec::bool(
                "extract-assets",
                "extract the assets and put them in a distinct archive",
            )
            .with_short('e'),
            FlagSpec::bool("skip-assets", "skip running webpack and building assets")
                .with_short('k'),
        ]
    }
}

impl FlagPrinter for AssetsBuilder {
    fn print_flags(&self, _plugins: &PluginSet, w: &mut dyn Write) -> Result<()> {
        FlagComposer::new(NAME)
            .with_flags(self.build_pflags())
            .intrinsic()?
            .print_defaults(w)
    }
}

impl Describer for AssetsBuilder {
    fn description(&self) -> String {
        "Bundles front-end assets before building".to_string()
    }
}

impl StdinSetter for AssetsBuilder {
    fn set_stdin(&self, r: SharedReader) {
        self.streams.set_stdin(r);
    }
}

impl StdoutSetter for AssetsBuilder {
    fn set_stdout(&self, w: SharedWriter) {
        self.streams.set_stdout(w);
    }
}

impl StderrSetter for AssetsBuilder {
    fn set_stderr(&self, w: SharedWriter) {
        self.streams.set_stderr(w);
    }
}

impl Plugin for AssetsBuilder {
    fn name(&self) -> &str {
        NAME
    }

    fn as_before_builder(&self) -> Option<&dyn BeforeBuilder> {
        Some(self)
    }

    fn as_build_pflagger(&self) -> Option<&dyn BuildPflagger> {
        Some(self)
    }

    fn as_flag_printer(&self) -> Option<&dyn FlagPrinter> {
        Some(self)
    }

    fn as_describer(&self) -> Option<&dyn Describer> {
        Some(self)
    }

    fn as_stdin_setter(&self) -> Option<&dyn StdinSetter> {
        Some(self)
    }

    fn as_stdout_setter(&self) -> Option<&dyn StdoutSetter> {
        Some(self)
    }

    fn as_stderr_setter(&self) -> Option<&dyn StderrSetter> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CaptureBuffer;
    use std::fs;

    fn ctx_with(root: &Path, args: &[&str]) -> RunContext {
        let assets = AssetsBuilder::new();
        let flags = FlagComposer::new("build")
            .with_flags([
                FlagSpec::bool("dry-run", "dry run"),
                FlagSpec::string("environment", "development", "environment"),
            ])
            .with_flags(assets.build_pflags())
            .intrinsic()
            .unwrap();
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        RunContext::new(root).with_flags(flags.parse(&args).unwrap())
    }

    #[test]
    fn test_bundler_prefers_build_script() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"scripts": {"build": "webpack"}}"#,
        )
        .unwrap();

        let spec = bundler_command(dir.path(), "production", OsType::Linux)
            .unwrap()
            .unwrap();
        assert_eq!(spec.program, "npm");
        assert_eq!(spec.args, vec!["run", "build"]);
        assert_eq!(
            spec.env,
            vec![("NODE_ENV".to_string(), "production".to_string())]
        );

        fs::write(dir.path().join("yarn.lock"), "").unwrap();
        let spec = bundler_command(dir.path(), "production", OsType::Linux)
            .unwrap()
            .unwrap();
        assert_eq!(spec.program, "yarnpkg");
    }

    #[test]
    fn test_bundler_falls_back_to_webpack() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"name": "app"}"#).unwrap();
        assert!(bundler_command(dir.path(), "development", OsType::Linux)
            .unwrap()
            .is_none());

        let bin = dir.path().join("node_modules/.bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("webpack"), "").unwrap();

        let spec = bundler_command(dir.path(), "development", OsType::Linux)
            .unwrap()
            .unwrap();
        assert_eq!(PathBuf::from(spec.program), bin.join("webpack"));
        assert!(spec.args.is_empty());
    }

    #[test]
    fn test_webpack_bin_on_windows() {
        let bin = webpack_bin(Path::new("app"), OsType::Windows);
        assert!(bin.ends_with("webpack.cmd"));
    }

    #[test]
    fn test_archive() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join(ASSETS_DIR);
        fs::create_dir_all(source.join("css")).unwrap();
        fs::write(source.join("app.js"), "console.log(1)").unwrap();
        fs::write(source.join("css/app.css"), "body {}").unwrap();

        let target = dir.path().join(ARCHIVE);
        assert_eq!(archive(&source, &target).unwrap(), 2);

        let mut zip = zip::ZipArchive::new(File::open(&target).unwrap()).unwrap();
        assert!(zip.by_name("app.js").is_ok());
        assert!(zip.by_name("css/app.css").is_ok());
    }

    #[tokio::test]
    async fn test_skip_assets() {
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetsBuilder::new();
        let out = CaptureBuffer::new();
        assets.set_stdout(out.writer());

        let ctx = ctx_with(dir.path(), &["-k"]);
        assets.before_build(&ctx, &[]).await.unwrap();
        assert_eq!(out.contents(), "skipping assets\n");
    }

    #[tokio::test]
    async fn test_dry_run_describes_without_touching_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"scripts": {"build": "webpack"}}"#,
        )
        .unwrap();
        let kept = dir.path().join(ASSETS_DIR).join("app.js");
        fs::create_dir_all(kept.parent().unwrap()).unwrap();
        fs::write(&kept, "").unwrap();

        let assets = AssetsBuilder::new();
        let out = CaptureBuffer::new();
        assets.set_stdout(out.writer());

        let ctx = ctx_with(dir.path(), &["--dry-run", "--clean-assets", "-e"]);
        assets.before_build(&ctx, &[]).await.unwrap();

        let printed = out.contents();
        assert!(printed.contains("--> npm run build"));
        assert!(printed.contains("--> archive public/assets into bin/assets.zip"));
        assert!(kept.exists());
    }

    #[tokio::test]
    async fn test_no_pipeline_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetsBuilder::new();
        let ctx = ctx_with(dir.path(), &[]);
        assert!(assets.before_build(&ctx, &[]).await.is_ok());
    }
}
