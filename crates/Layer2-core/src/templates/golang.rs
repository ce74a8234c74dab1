//! `{{ }}` action templates
//!
//! A structural check: every action is closed, no action is empty, and the
//! block keywords (`if`, `range`, `with`, `define`, `block`) balance with
//! `end`. Expression grammar is left to the toolchain.

use super::walk_and_validate;
use crate::plugin::{Describer, Plugin, TemplateValidator};
use kiln_foundation::Result;
use std::path::Path;

pub const NAME: &str = "templates";
pub const MARKER: &str = ".tmpl";

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const BLOCKS: [&str; 5] = ["if", "range", "with", "define", "block"];

#[derive(Debug, Default)]
pub struct GoTemplates;

impl GoTemplates {
    pub fn new() -> Self {
        Self
    }
}

/// Check one template source
pub fn parse(source: &str) -> std::result::Result<(), String> {
    let mut open_blocks: Vec<(&str, usize)> = Vec::new();
    let mut rest = source;
    let mut offset = 0;

    while let Some(start) = rest.find(OPEN) {
        let line = line_at(source, offset + start);
        let after = &rest[start + OPEN.len()..];
        let end = after
            .find(CLOSE)
            .ok_or_else(|| format!("{line}: unclosed action"))?;

        let action = trim_markers(&after[..end]);
        let consumed = start + OPEN.len() + end + CLOSE.len();
        offset += consumed;
        rest = &rest[consumed..];

        if action.starts_with("/*") {
            if !action.ends_with("*/") {
                return Err(format!("{line}: unclosed comment"));
            }
            continue;
        }

        let keyword = action.split_whitespace().next().unwrap_or_default();
        match keyword {
            "" => return Err(format!("{line}: missing value for command")),
            "end" => {
                if open_blocks.pop().is_none() {
                    return Err(format!("{line}: unexpected {{{{end}}}}"));
                }
            }
            "else" => {
                if open_blocks.is_empty() {
                    return Err(format!("{line}: unexpected {{{{else}}}}"));
                }
            }
            k if BLOCKS.contains(&k) => open_blocks.push((k, line)),
            _ => {}
        }
    }

    match open_blocks.last() {
        Some((keyword, line)) => Err(format!("{line}: unexpected EOF in {keyword} block")),
        None => Ok(()),
    }
}

fn trim_markers(action: &str) -> &str {
    let action = action.strip_prefix('-').unwrap_or(action);
    let action = action.strip_suffix('-').unwrap_or(action);
    action.trim()
}

fn line_at(source: &str, index: usize) -> usize {
    source[..index].matches('\n').count() + 1
}

impl TemplateValidator for GoTemplates {
    fn validate_templates(&self, root: &Path) -> Result<()> {
        walk_and_validate(root, MARKER, |_, source| parse(source)).map(|_| ())
    }
}

impl Describer for GoTemplates {
    fn description(&self) -> String {
        format!("Validates {} templates", MARKER)
    }
}

impl Plugin for GoTemplates {
    fn name(&self) -> &str {
        NAME
    }

    fn as_template_validator(&self) -> Option<&dyn TemplateValidator> {
        Some(self)
    }

    fn as_describer(&self) -> Option<&dyn Describer> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_foundation::Error;

    #[test]
    fn test_valid_templates() {
        assert!(parse("plain text").is_ok());
        assert!(parse("<h1>{{ .Title }}</h1>").is_ok());
        assert!(parse("{{- if .Admin -}}admin{{ else }}user{{ end }}").is_ok());
        assert!(parse("{{ range .Items }}{{ with .Name }}{{ . }}{{ end }}{{ end }}").is_ok());
        assert!(parse("{{/* a comment */}}").is_ok());
    }

    #[test]
    fn test_unclosed_action() {
        let err = parse("line one\n<p>{{ .Name </p>").unwrap_err();
        assert_eq!(err, "2: unclosed action");
    }

    #[test]
    fn test_unbalanced_blocks() {
        assert_eq!(parse("{{ end }}").unwrap_err(), "1: unexpected {{end}}");
        assert_eq!(parse("{{ else }}").unwrap_err(), "1: unexpected {{else}}");
        assert_eq!(
            parse("{{ range .Items }}\n{{ if . }}x{{ end }}").unwrap_err(),
            "1: unexpected EOF in range block"
        );
    }

    #[test]
    fn test_empty_action() {
        assert_eq!(parse("{{ }}").unwrap_err(), "1: missing value for command");
    }

    #[test]
    fn test_validator_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.html.tmpl"), "{{ .X }}").unwrap();
        std::fs::write(dir.path().join("other.hbs"), "{{").unwrap();
        assert!(GoTemplates::new().validate_templates(dir.path()).is_ok());

        let bad = dir.path().join("bad.tmpl");
        std::fs::write(&bad, "{{ if .X }}").unwrap();
        match GoTemplates::new().validate_templates(dir.path()).unwrap_err() {
            Error::Validation { path, .. } => assert_eq!(path, bad.display().to_string()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
