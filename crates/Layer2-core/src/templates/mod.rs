//! Template validators
//!
//! Each dialect walks the application root and parses every file whose name
//! contains its marker. Hidden and ignored files are walked too; a template
//! does not stop being shipped because git ignores it.
//!
//! - `golang.rs` - `{{ }}` action templates (`.tmpl`)
//! - `handlebars.rs` - handlebars templates (`.hbs`)

pub mod golang;
pub mod handlebars;

pub use self::golang::GoTemplates;
pub use self::handlebars::HandlebarsTemplates;

use ignore::WalkBuilder;
use kiln_foundation::{Error, Result};
use std::fmt::Display;
use std::path::Path;
use tracing::debug;

/// Walk `root` and run `parse` on the contents of every file whose base
/// name contains `marker`. Returns the number of files parsed.
pub fn walk_and_validate<F, E>(root: &Path, marker: &str, mut parse: F) -> Result<usize>
where
    F: FnMut(&Path, &str) -> std::result::Result<(), E>,
    E: Display,
{
    let mut parsed = 0;

    for entry in WalkBuilder::new(root).standard_filters(false).build() {
        let entry = entry.map_err(|e| Error::Internal(format!("walk {}: {}", root.display(), e)))?;

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains(marker));
        if !matches {
            continue;
        }

        let source = std::fs::read_to_string(path)?;
        parse(path, &source).map_err(|e| Error::validation(path.display().to_string(), e))?;
        parsed += 1;
    }

    debug!(root = %root.display(), marker, parsed, "Validated templates");
    Ok(parsed)
}
