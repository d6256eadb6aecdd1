//! Consistency checks over collected version references.
//!
//! Two deliberately separate queries live here: [`validate_refs`] judges the
//! whole reference set, while [`manifest_version`] derives the current
//! version from build-descriptor references only. Conflating them would let
//! an inconsistent non-manifest reference pass as authoritative.

use semver::Version;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::project::MANIFEST_FILE;
use crate::refs::VersionRef;

/// Outcome of validating a reference set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Validation {
    /// All references agree (and match the expected version, if one was given).
    Ok {
        /// The agreed version value.
        version: String,
    },
    /// There were no references at all — reported distinctly from success.
    Empty,
    /// References disagree with each other.
    Inconsistent {
        /// The distinct values found, sorted.
        values: Vec<String>,
    },
    /// References agree with each other but not with the expected version.
    Mismatch {
        /// The version that was expected.
        expected: String,
        /// The version the references actually hold.
        actual: String,
    },
}

/// Validate that all references agree on one version value, optionally
/// matching `expected`. The result does not depend on the order of `refs`.
#[instrument(skip(refs), fields(count = refs.len()))]
pub fn validate_refs(refs: &[VersionRef], expected: Option<&str>) -> Validation {
    let values = distinct_values(refs);

    if values.is_empty() {
        return Validation::Empty;
    }
    if values.len() > 1 {
        return Validation::Inconsistent { values };
    }

    let actual = values.into_iter().next().unwrap_or_default();
    if let Some(expected) = expected
        && expected != actual
    {
        return Validation::Mismatch {
            expected: expected.to_string(),
            actual,
        };
    }

    debug!(version = %actual, "references consistent");
    Validation::Ok { version: actual }
}

/// Errors deriving the current version from manifest references.
#[derive(Error, Debug)]
pub enum CurrentVersionError {
    /// Zero or multiple distinct versions among the manifest references.
    #[error("could not determine current version number")]
    Ambiguous,

    /// The manifest version is not valid semver.
    #[error("current version {0:?} is not valid semver: {1}")]
    Invalid(String, semver::Error),
}

/// Derive the current version from the references found in build descriptor
/// files only. Exactly one distinct value must exist among those references.
#[instrument(skip(refs))]
pub fn manifest_version(refs: &[VersionRef]) -> Result<Version, CurrentVersionError> {
    let manifest_refs: Vec<VersionRef> = refs
        .iter()
        .filter(|r| r.file.file_name() == Some(MANIFEST_FILE))
        .cloned()
        .collect();
    let values = distinct_values(&manifest_refs);

    if values.len() != 1 {
        return Err(CurrentVersionError::Ambiguous);
    }
    let value = values.into_iter().next().unwrap_or_default();
    Version::parse(&value).map_err(|e| CurrentVersionError::Invalid(value, e))
}

/// The sorted, distinct version values among `refs`.
fn distinct_values(refs: &[VersionRef]) -> Vec<String> {
    let mut values: Vec<String> = refs.iter().map(|r| r.value.clone()).collect();
    values.sort();
    values.dedup();
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn make_ref(file: &str, value: &str) -> VersionRef {
        VersionRef {
            file: Utf8PathBuf::from(file),
            start: 0,
            end: value.len(),
            value: value.to_string(),
            content: format!("version = \"{value}\""),
        }
    }

    #[test]
    fn agreeing_refs_are_ok() {
        let refs = vec![make_ref("a.txt", "1.2.0"), make_ref("b.txt", "1.2.0")];
        assert_eq!(
            validate_refs(&refs, None),
            Validation::Ok {
                version: "1.2.0".into()
            }
        );
    }

    #[test]
    fn agreeing_refs_mismatch_expected() {
        let refs = vec![make_ref("a.txt", "1.2.0"), make_ref("b.txt", "1.2.0")];
        assert_eq!(
            validate_refs(&refs, Some("1.3.0")),
            Validation::Mismatch {
                expected: "1.3.0".into(),
                actual: "1.2.0".into()
            }
        );
    }

    #[test]
    fn disagreeing_refs_are_inconsistent() {
        let refs = vec![make_ref("a.txt", "1.0.0"), make_ref("b.txt", "1.0.1")];
        assert_eq!(
            validate_refs(&refs, None),
            Validation::Inconsistent {
                values: vec!["1.0.0".into(), "1.0.1".into()]
            }
        );
    }

    #[test]
    fn empty_refs_are_reported_distinctly() {
        assert_eq!(validate_refs(&[], None), Validation::Empty);
        assert_eq!(validate_refs(&[], Some("1.0.0")), Validation::Empty);
    }

    #[test]
    fn result_is_order_independent() {
        let mut refs = vec![
            make_ref("a.txt", "1.0.0"),
            make_ref("b.txt", "1.0.1"),
            make_ref("c.txt", "1.0.0"),
        ];
        let forward = validate_refs(&refs, None);
        refs.reverse();
        assert_eq!(forward, validate_refs(&refs, None));
    }

    #[test]
    fn manifest_version_uses_descriptor_refs_only() {
        let refs = vec![
            make_ref("Cargo.toml", "1.2.3"),
            make_ref("README.md", "9.9.9"),
        ];
        assert_eq!(manifest_version(&refs).unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn manifest_version_requires_exactly_one_value() {
        let refs = vec![
            make_ref("Cargo.toml", "1.0.0"),
            make_ref("sub/Cargo.toml", "2.0.0"),
        ];
        assert!(matches!(
            manifest_version(&refs),
            Err(CurrentVersionError::Ambiguous)
        ));

        assert!(matches!(
            manifest_version(&[]),
            Err(CurrentVersionError::Ambiguous)
        ));
    }

    #[test]
    fn manifest_version_rejects_non_semver() {
        let refs = vec![make_ref("Cargo.toml", "not-a-version")];
        assert!(matches!(
            manifest_version(&refs),
            Err(CurrentVersionError::Invalid(..))
        ));
    }

    #[test]
    fn validation_serializes_with_status_tag() {
        let json = serde_json::to_string(&Validation::Ok {
            version: "1.0.0".into(),
        })
        .unwrap();
        assert!(json.contains("\"status\":\"ok\""));
    }
}
