//! Plugin capabilities and the registry that resolves them by name.
//!
//! There is one trait per capability rather than a single plugin base:
//! [`ReleasePlugin`] covers reference discovery and release side effects,
//! [`IncrementRule`] covers named version increments. Built-ins are
//! registered by default; callers may register their own implementations
//! under new identifiers before running a release.

pub mod changelog;
pub mod rules;
pub mod source_code;

use std::collections::HashMap;

use camino::Utf8PathBuf;
use semver::Version;
use thiserror::Error;

use crate::project::Project;
use crate::refs::{RefError, VersionRef};

/// Errors raised by plugin implementations.
#[derive(Error, Debug)]
pub enum PluginError {
    /// An I/O operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Reference matching failed.
    #[error(transparent)]
    Ref(#[from] RefError),

    /// Anything else a plugin wants to report.
    #[error("{0}")]
    Other(String),
}

/// Result alias for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// A release plugin: contributes version references during collection and/or
/// performs side effects (extra file changes) when a release is created.
///
/// Both methods have no-op defaults so an implementation may supply only the
/// side it cares about.
pub trait ReleasePlugin {
    /// The identifier this plugin is registered under.
    fn name(&self) -> &'static str;

    /// Report additional version references for `project`.
    fn version_refs(&self, project: &Project) -> PluginResult<Vec<VersionRef>> {
        let _ = project;
        Ok(Vec::new())
    }

    /// Perform release side effects for `project` at `version`, returning
    /// the files that were (or, in dry-run mode, would have been) changed.
    fn create_release(
        &self,
        project: &Project,
        version: &Version,
        dry_run: bool,
    ) -> PluginResult<Vec<Utf8PathBuf>> {
        let _ = (project, version, dry_run);
        Ok(Vec::new())
    }
}

/// A named version increment rule (e.g. "minor"): computes the successor of
/// a current version.
pub trait IncrementRule {
    /// Compute the next version from `current`.
    fn increment(&self, current: &Version) -> Version;
}

/// Resolves string identifiers to plugin instances.
pub struct PluginRegistry {
    release: HashMap<String, Box<dyn ReleasePlugin>>,
    rules: HashMap<String, Box<dyn IncrementRule>>,
}

impl PluginRegistry {
    /// An empty registry with no plugins at all.
    pub fn empty() -> Self {
        Self {
            release: HashMap::new(),
            rules: HashMap::new(),
        }
    }

    /// A registry with the built-in plugins and increment rules registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_release_plugin(Box::new(source_code::SourceCodeVersionPlugin));
        registry.register_release_plugin(Box::new(changelog::ChangelogReleasePlugin));
        for &(name, rule) in rules::BUILTIN_RULES {
            registry.register_increment_rule(name, Box::new(rule));
        }
        registry
    }

    /// Register a release plugin under its own name.
    pub fn register_release_plugin(&mut self, plugin: Box<dyn ReleasePlugin>) {
        self.release.insert(plugin.name().to_string(), plugin);
    }

    /// Register an increment rule under `name`.
    pub fn register_increment_rule(
        &mut self,
        name: impl Into<String>,
        rule: Box<dyn IncrementRule>,
    ) {
        self.rules.insert(name.into(), rule);
    }

    /// Look up a release plugin by identifier.
    pub fn release_plugin(&self, name: &str) -> Option<&dyn ReleasePlugin> {
        self.release.get(name).map(Box::as_ref)
    }

    /// Look up an increment rule by identifier.
    pub fn increment_rule(&self, name: &str) -> Option<&dyn IncrementRule> {
        self.rules.get(name).map(Box::as_ref)
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("release", &self.release.keys().collect::<Vec<_>>())
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = PluginRegistry::with_builtins();
        assert!(registry.release_plugin("source_code_version").is_some());
        assert!(registry.release_plugin("changelog_release").is_some());
        for rule in [
            "major",
            "premajor",
            "minor",
            "preminor",
            "patch",
            "prepatch",
            "prerelease",
        ] {
            assert!(registry.increment_rule(rule).is_some(), "missing {rule}");
        }
    }

    #[test]
    fn unknown_names_resolve_to_none() {
        let registry = PluginRegistry::with_builtins();
        assert!(registry.release_plugin("nope").is_none());
        assert!(registry.increment_rule("git").is_none());
    }

    #[test]
    fn custom_plugin_can_be_registered() {
        struct Noop;
        impl ReleasePlugin for Noop {
            fn name(&self) -> &'static str {
                "noop"
            }
        }

        let mut registry = PluginRegistry::empty();
        registry.register_release_plugin(Box::new(Noop));
        assert!(registry.release_plugin("noop").is_some());
    }
}
