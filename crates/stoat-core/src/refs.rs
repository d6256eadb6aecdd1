//! Version references: located occurrences of a version string in a file.
//!
//! A [`VersionRef`] pins a version value to an exact byte range so that the
//! rewriter can replace it without touching surrounding content. References
//! are produced fresh on every collection pass and never cached across
//! invocations.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// The placeholder that reference patterns must contain. It is expanded to a
/// non-greedy capture group before matching.
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Errors from reference matching.
#[derive(Error, Debug)]
pub enum RefError {
    /// The pattern template does not contain the `{version}` placeholder.
    #[error("pattern {0:?} does not contain the {{version}} placeholder")]
    MissingPlaceholder(String),

    /// The expanded pattern is not a valid regular expression.
    #[error("invalid reference pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The pattern template as configured.
        pattern: String,
        /// The underlying regex error.
        source: regex::Error,
    },

    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file that failed to read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for reference matching.
pub type RefResult<T> = Result<T, RefError>;

/// A located occurrence of a version string inside a file.
///
/// `start..end` is a half-open byte range over the file's content at the time
/// of collection, covering exactly the version substring (never the whole
/// matched line). `content` keeps the full matched span for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRef {
    /// The file containing the reference.
    pub file: Utf8PathBuf,
    /// Start of the version substring (byte offset, inclusive).
    pub start: usize,
    /// End of the version substring (byte offset, exclusive).
    pub end: usize,
    /// The version text currently at `start..end`.
    pub value: String,
    /// The full matched span, for human-readable display only.
    pub content: String,
}

/// Search `file` for a reference described by `pattern_template`.
///
/// The `{version}` placeholder is replaced with a non-greedy capture group
/// and the result is compiled as a regular expression — the literal portion
/// of a template is regex, not escaped plain text, which lets configuration
/// and plugin authors anchor or multi-line their patterns at the cost of
/// having to escape metacharacters themselves.
///
/// A missing file or a pattern that matches nothing yields `Ok(None)`: "no
/// reference here" is not a failure. Only the first match is taken.
#[instrument(level = "debug", skip(pattern_template))]
pub fn match_version_ref(file: &Utf8Path, pattern_template: &str) -> RefResult<Option<VersionRef>> {
    if !pattern_template.contains(VERSION_PLACEHOLDER) {
        return Err(RefError::MissingPlaceholder(pattern_template.to_string()));
    }

    let pattern = pattern_template.replace(VERSION_PLACEHOLDER, "(.*?)");
    let re = regex::Regex::new(&pattern).map_err(|source| RefError::InvalidPattern {
        pattern: pattern_template.to_string(),
        source,
    })?;

    let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(%file, "file not found, no reference");
            return Ok(None);
        }
        Err(source) => {
            return Err(RefError::Read {
                path: file.to_path_buf(),
                source,
            });
        }
    };

    let Some(captures) = re.captures(&content) else {
        debug!(%file, "pattern did not match");
        return Ok(None);
    };

    // The template is guaranteed to contain the placeholder, so group 1 exists.
    let Some(group) = captures.get(1) else {
        return Ok(None);
    };
    let whole = captures.get(0).map_or("", |m| m.as_str());

    let version_ref = VersionRef {
        file: file.to_path_buf(),
        start: group.start(),
        end: group.end(),
        value: group.as_str().to_string(),
        content: whole.to_string(),
    };
    debug!(%file, value = %version_ref.value, start = version_ref.start, "matched version reference");
    Ok(Some(version_ref))
}
