//! The plugin set kiln starts with

use crate::assets::AssetsBuilder;
use crate::build::BuildCommand;
use crate::fix::FixCommand;
use crate::plugin::{ExternalPlugin, Plugin, PluginDescriptor, PluginSet, PluginsCommand};
use crate::templates::{GoTemplates, HandlebarsTemplates};
use kiln_foundation::KilnConfig;
use std::sync::Arc;

/// Built-in plugins in declaration order
pub fn builtin_plugins(descriptors: &[PluginDescriptor]) -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(BuildCommand::new()) as Arc<dyn Plugin>,
        Arc::new(FixCommand::new()),
        Arc::new(AssetsBuilder::new()),
        Arc::new(GoTemplates::new()),
        Arc::new(HandlebarsTemplates::new()),
        Arc::new(PluginsCommand::new(descriptors.to_vec())),
    ]
}

/// Built-ins followed by external plugins, minus anything the
/// configuration disables.
pub fn default_plugins(config: &KilnConfig, descriptors: &[PluginDescriptor]) -> PluginSet {
    let mut plugins = builtin_plugins(descriptors);
    plugins.extend(ExternalPlugin::from_descriptors(descriptors));
    PluginSet::new(plugins).without(&config.disabled_plugins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{category, Capability};

    fn names(set: &PluginSet) -> Vec<String> {
        set.iter().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn test_builtins_in_order() {
        let set = default_plugins(&KilnConfig::default(), &[]);
        assert_eq!(
            names(&set),
            vec!["build", "fix", "assets", "templates", "handlebars", "plugins"]
        );
        assert!(set.has("build", Capability::Command));
        assert!(set.has("assets", Capability::BeforeBuilder));
        assert!(set.has("assets", Capability::BuildPflagger));
        assert!(set.has("templates", Capability::TemplateValidator));
    }

    #[test]
    fn test_external_plugins_follow_builtins() {
        let descriptors = vec![PluginDescriptor {
            name: "deploy".into(),
            kiln_command: category::ROOT.into(),
            ..Default::default()
        }];
        let set = default_plugins(&KilnConfig::default(), &descriptors);
        assert_eq!(names(&set).last().map(String::as_str), Some("deploy"));
        assert!(set.has("deploy", Capability::Command));
    }

    #[test]
    fn test_disabled_plugins_are_dropped() {
        let config = KilnConfig {
            disabled_plugins: vec!["assets".into(), "handlebars".into()],
            ..Default::default()
        };
        let set = default_plugins(&config, &[]);
        assert_eq!(names(&set), vec!["build", "fix", "templates", "plugins"]);
    }
}
