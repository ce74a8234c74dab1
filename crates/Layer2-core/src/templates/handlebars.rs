//! Handlebars templates, parsed with the `handlebars` crate

use super::walk_and_validate;
use crate::plugin::{Describer, Plugin, TemplateValidator};
use ::handlebars::Template;
use kiln_foundation::Result;
use std::path::Path;

pub const NAME: &str = "handlebars";
pub const MARKER: &str = ".hbs";

#[derive(Debug, Default)]
pub struct HandlebarsTemplates;

impl HandlebarsTemplates {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateValidator for HandlebarsTemplates {
    fn validate_templates(&self, root: &Path) -> Result<()> {
        walk_and_validate(root, MARKER, |_, source| Template::compile(source).map(|_| ()))
            .map(|_| ())
    }
}

impl Describer for HandlebarsTemplates {
    fn description(&self) -> String {
        format!("Validates {} templates", MARKER)
    }
}

impl Plugin for HandlebarsTemplates {
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
    fn test_valid_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("index.hbs"),
            "{{#if user}}<p>{{user.name}}</p>{{/if}}",
        )
        .unwrap();
        std::fs::write(dir.path().join("plain.tmpl"), "{{#if").unwrap();

        assert!(HandlebarsTemplates::new().validate_templates(dir.path()).is_ok());
    }

    #[test]
    fn test_mismatched_block() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("show.hbs");
        std::fs::write(&bad, "{{#if user}}<p>{{/each}}").unwrap();

        match HandlebarsTemplates::new().validate_templates(dir.path()).unwrap_err() {
            Error::Validation { path, .. } => assert_eq!(path, bad.display().to_string()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
