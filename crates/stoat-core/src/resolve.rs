//! Target version resolution.
//!
//! The release command's `version` argument is either an explicit version
//! literal or the name of an increment rule. Literals are taken as-is;
//! rules are applied to the current version derived from build descriptor
//! references.

use semver::Version;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::plugins::PluginRegistry;
use crate::refs::VersionRef;
use crate::validate::{self, CurrentVersionError};

/// Errors from target version resolution.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The argument is neither a version nor a registered rule name.
    #[error("\"{0}\" is not a valid version incrementing rule")]
    UnknownRule(String),

    /// The current version could not be determined from the manifests.
    #[error(transparent)]
    CurrentVersion(#[from] CurrentVersionError),
}

/// Result alias for resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Resolve `rule_or_version` to a concrete target version.
///
/// A valid semver literal is returned directly, without consulting `refs`.
/// Anything else is treated as a rule name looked up in the registry and
/// applied to the current manifest version.
#[instrument(skip(refs, registry))]
pub fn resolve_target(
    refs: &[VersionRef],
    rule_or_version: &str,
    registry: &PluginRegistry,
) -> ResolveResult<Version> {
    if let Ok(version) = Version::parse(rule_or_version) {
        debug!(%version, "explicit target version");
        return Ok(version);
    }

    let rule = registry
        .increment_rule(rule_or_version)
        .ok_or_else(|| ResolveError::UnknownRule(rule_or_version.to_string()))?;
    let current = validate::manifest_version(refs)?;
    let next = rule.increment(&current);
    debug!(%current, %next, rule = rule_or_version, "applied increment rule");
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn manifest_ref(value: &str) -> VersionRef {
        VersionRef {
            file: Utf8PathBuf::from("Cargo.toml"),
            start: 0,
            end: value.len(),
            value: value.to_string(),
            content: format!("version = \"{value}\""),
        }
    }

    #[test]
    fn literal_version_ignores_refs() {
        let registry = PluginRegistry::with_builtins();
        // Even with refs that disagree wildly, a literal passes through.
        let refs = vec![manifest_ref("1.0.0"), manifest_ref("9.9.9")];
        let resolved = resolve_target(&refs, "2.5.0", &registry).unwrap();
        assert_eq!(resolved, Version::new(2, 5, 0));

        let resolved = resolve_target(&[], "2.5.0", &registry).unwrap();
        assert_eq!(resolved, Version::new(2, 5, 0));
    }

    #[test]
    fn rule_applies_to_manifest_version() {
        let registry = PluginRegistry::with_builtins();
        let refs = vec![manifest_ref("1.2.3")];
        let resolved = resolve_target(&refs, "minor", &registry).unwrap();
        assert_eq!(resolved, Version::new(1, 3, 0));
    }

    #[test]
    fn unknown_rule_is_a_user_facing_error() {
        let registry = PluginRegistry::with_builtins();
        let refs = vec![manifest_ref("1.2.3")];
        let err = resolve_target(&refs, "gigantic", &registry).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownRule(name) if name == "gigantic"));
    }

    #[test]
    fn rule_without_determinable_current_version_fails() {
        let registry = PluginRegistry::with_builtins();
        let err = resolve_target(&[], "patch", &registry).unwrap_err();
        assert!(matches!(err, ResolveError::CurrentVersion(_)));
    }
}
