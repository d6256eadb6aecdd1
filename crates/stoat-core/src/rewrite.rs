//! Atomic multi-file rewriting of version references.
//!
//! All replacements within one file are computed against a single snapshot
//! of the original byte offsets. Applying edits sequentially would shift
//! later ranges as soon as a replacement changes length, so the substitution
//! is a single combined pass per file.

use camino::Utf8PathBuf;
use semver::Version;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::plugins::{PluginError, PluginRegistry};
use crate::project::Project;
use crate::refs::VersionRef;

/// Errors from range substitution.
#[derive(Error, Debug)]
pub enum SubstituteError {
    /// A range starts before the previous one ends.
    #[error("range {start}..{end} overlaps the preceding range ending at {prev_end}")]
    Overlap {
        /// Start of the offending range.
        start: usize,
        /// End of the offending range.
        end: usize,
        /// End of the range before it.
        prev_end: usize,
    },

    /// A range ends past the end of the content.
    #[error("range end {end} is past the end of the content ({len} bytes)")]
    OutOfBounds {
        /// End of the offending range.
        end: usize,
        /// Content length in bytes.
        len: usize,
    },

    /// A range with `start > end`.
    #[error("range {start}..{end} is inverted")]
    Inverted {
        /// Start of the offending range.
        start: usize,
        /// End of the offending range.
        end: usize,
    },
}

/// Errors from the rewrite pass.
#[derive(Error, Debug)]
pub enum RewriteError {
    /// Failed to read a referenced file.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to write a rewritten file.
    #[error("failed to write {path}: {source}")]
    Write {
        /// The file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The reference ranges for a file violate the substitution invariants.
    #[error("bad version reference ranges in {file}: {source}")]
    Ranges {
        /// The file.
        file: Utf8PathBuf,
        /// What was wrong with the ranges.
        source: SubstituteError,
    },

    /// A configured plugin identifier is not in the registry.
    #[error("unknown release plugin \"{0}\"")]
    UnknownPlugin(String),

    /// A release plugin failed mid-rewrite. Files may already have been
    /// written at this point; the failure is surfaced, not undone.
    #[error("release plugin \"{plugin}\" failed: {source}")]
    Plugin {
        /// The plugin's identifier.
        plugin: String,
        /// The plugin's error.
        source: PluginError,
    },
}

/// Result alias for rewrite operations.
pub type RewriteResult<T> = Result<T, RewriteError>;

/// Replace each `(start, end, replacement)` range of `content` in one pass.
///
/// Ranges may be given in any order; they are applied ascending by `start`
/// against the original offsets. Overlapping, inverted, or out-of-bounds
/// ranges are errors.
pub fn substitute_ranges(
    content: &str,
    ranges: impl IntoIterator<Item = (usize, usize, String)>,
) -> Result<String, SubstituteError> {
    let mut ranges: Vec<(usize, usize, String)> = ranges.into_iter().collect();
    ranges.sort_by_key(|&(start, _, _)| start);

    let mut result = String::with_capacity(content.len());
    let mut cursor = 0usize;
    for (start, end, replacement) in ranges {
        if start > end {
            return Err(SubstituteError::Inverted { start, end });
        }
        if end > content.len() {
            return Err(SubstituteError::OutOfBounds {
                end,
                len: content.len(),
            });
        }
        if start < cursor {
            return Err(SubstituteError::Overlap {
                start,
                end,
                prev_end: cursor,
            });
        }
        result.push_str(&content[cursor..start]);
        result.push_str(&replacement);
        cursor = end;
    }
    result.push_str(&content[cursor..]);
    Ok(result)
}

/// Rewrite every reference to `target`, one combined pass per file.
///
/// Each file is read once and written once (unless `dry_run`); the returned
/// list contains each touched file exactly once, in reference order.
#[instrument(skip(refs), fields(count = refs.len(), %target, dry_run))]
pub fn rewrite_refs(
    refs: &[VersionRef],
    target: &Version,
    dry_run: bool,
) -> RewriteResult<Vec<Utf8PathBuf>> {
    // Group by file, preserving the collector's file order.
    let mut files: Vec<(Utf8PathBuf, Vec<&VersionRef>)> = Vec::new();
    for r in refs {
        match files.last_mut() {
            Some((file, group)) if *file == r.file => group.push(r),
            _ => files.push((r.file.clone(), vec![r])),
        }
    }

    let mut changed = Vec::new();
    for (file, group) in files {
        let content = std::fs::read_to_string(&file).map_err(|source| RewriteError::Read {
            path: file.clone(),
            source,
        })?;

        let rewritten = substitute_ranges(
            &content,
            group.iter().map(|r| (r.start, r.end, target.to_string())),
        )
        .map_err(|source| RewriteError::Ranges {
            file: file.clone(),
            source,
        })?;

        if !dry_run {
            std::fs::write(&file, rewritten).map_err(|source| RewriteError::Write {
                path: file.clone(),
                source,
            })?;
        }
        debug!(%file, refs = group.len(), "rewrote version references");
        changed.push(file);
    }

    info!(files = changed.len(), %target, "version references rewritten");
    Ok(changed)
}

/// Invoke every configured release plugin for every project, appending the
/// files each reports as changed.
///
/// A plugin failure here is fatal and carries the plugin's identity —
/// configuration-sourced rewrites have already been written by the time
/// plugins run, so the operator needs to know exactly what failed.
#[instrument(skip(projects, registry), fields(%target, dry_run))]
pub fn run_release_plugins(
    projects: &[Project],
    registry: &PluginRegistry,
    target: &Version,
    dry_run: bool,
) -> RewriteResult<Vec<Utf8PathBuf>> {
    let mut changed = Vec::new();
    for project in projects {
        for name in &project.config.plugins {
            let plugin = registry
                .release_plugin(name)
                .ok_or_else(|| RewriteError::UnknownPlugin(name.clone()))?;
            match plugin.create_release(project, target, dry_run) {
                Ok(files) => changed.extend(files),
                Err(source) => {
                    error!(plugin = %name, %source, "release plugin failed");
                    return Err(RewriteError::Plugin {
                        plugin: name.clone(),
                        source,
                    });
                }
            }
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReleaseConfig;
    use crate::plugins::{PluginResult, ReleasePlugin};
    use std::fs;
    use tempfile::TempDir;

    fn ranges(triples: &[(usize, usize, &str)]) -> Vec<(usize, usize, String)> {
        triples.iter().map(|&(s, e, r)| (s, e, r.to_string())).collect()
    }

    #[test]
    fn substitute_single_range() {
        let out = substitute_ranges("version = \"1.0.0\"  # pin", ranges(&[(12, 17, "1.1.0")]))
            .unwrap();
        assert_eq!(out, "version = \"1.1.0\"  # pin");
    }

    #[test]
    fn substitute_preserves_text_outside_ranges() {
        let content = "a 1.0.0 b 1.0.0 c";
        let out =
            substitute_ranges(content, ranges(&[(2, 7, "2.0.0-rc.1"), (10, 15, "2.0.0-rc.1")]))
                .unwrap();
        assert_eq!(out, "a 2.0.0-rc.1 b 2.0.0-rc.1 c");
    }

    #[test]
    fn substitute_is_order_independent() {
        let content = "x=1.0.0 y=1.0.0 z=1.0.0";
        let forward = substitute_ranges(
            content,
            ranges(&[(2, 7, "10.0.0"), (10, 15, "10.0.0"), (18, 23, "10.0.0")]),
        )
        .unwrap();
        let shuffled = substitute_ranges(
            content,
            ranges(&[(18, 23, "10.0.0"), (2, 7, "10.0.0"), (10, 15, "10.0.0")]),
        )
        .unwrap();
        assert_eq!(forward, shuffled);
        assert_eq!(forward, "x=10.0.0 y=10.0.0 z=10.0.0");
    }

    #[test]
    fn substitute_rejects_overlap() {
        let err = substitute_ranges("abcdef", ranges(&[(0, 3, "x"), (2, 5, "y")])).unwrap_err();
        assert!(matches!(err, SubstituteError::Overlap { .. }));
    }

    #[test]
    fn substitute_rejects_out_of_bounds() {
        let err = substitute_ranges("abc", ranges(&[(1, 9, "x")])).unwrap_err();
        assert!(matches!(err, SubstituteError::OutOfBounds { .. }));
    }

    #[test]
    fn substitute_with_no_ranges_is_identity() {
        assert_eq!(substitute_ranges("abc", ranges(&[])).unwrap(), "abc");
    }

    fn ref_in(file: &Utf8PathBuf, content: &str, value: &str) -> VersionRef {
        let start = content.find(value).unwrap();
        VersionRef {
            file: file.clone(),
            start,
            end: start + value.len(),
            value: value.to_string(),
            content: content.lines().find(|l| l.contains(value)).unwrap().into(),
        }
    }

    #[test]
    fn rewrite_writes_file_and_records_it_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conf.txt");
        let content = "version = \"1.0.0\"  # pin";
        fs::write(&path, content).unwrap();
        let file = Utf8PathBuf::try_from(path.clone()).unwrap();

        let changed =
            rewrite_refs(&[ref_in(&file, content, "1.0.0")], &Version::new(1, 1, 0), false)
                .unwrap();

        assert_eq!(changed, vec![file]);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "version = \"1.1.0\"  # pin"
        );
    }

    #[test]
    fn rewrite_handles_multiple_refs_in_one_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("doc.md");
        let content = "pkg 0.9.0 is out; install with pkg@0.9.0 now";
        fs::write(&path, content).unwrap();
        let file = Utf8PathBuf::try_from(path.clone()).unwrap();

        let first = ref_in(&file, content, "0.9.0");
        let second = VersionRef {
            start: content.rfind("0.9.0").unwrap(),
            end: content.rfind("0.9.0").unwrap() + 5,
            ..first.clone()
        };

        let changed =
            rewrite_refs(&[first, second], &Version::new(0, 10, 0), false).unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "pkg 0.10.0 is out; install with pkg@0.10.0 now"
        );
    }

    #[test]
    fn dry_run_does_not_touch_the_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conf.txt");
        let content = "version = \"1.0.0\"";
        fs::write(&path, content).unwrap();
        let file = Utf8PathBuf::try_from(path.clone()).unwrap();

        let changed =
            rewrite_refs(&[ref_in(&file, content, "1.0.0")], &Version::new(2, 0, 0), true)
                .unwrap();

        assert_eq!(changed.len(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    struct FailingPlugin;
    impl ReleasePlugin for FailingPlugin {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn create_release(
            &self,
            _project: &Project,
            _version: &Version,
            _dry_run: bool,
        ) -> PluginResult<Vec<Utf8PathBuf>> {
            Err(PluginError::Other("boom".into()))
        }
    }

    #[test]
    fn plugin_failure_carries_its_identity() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let config = ReleaseConfig {
            plugins: vec!["failing".into()],
            ..ReleaseConfig::default()
        };
        let projects = vec![Project::new(root, config)];

        let mut registry = PluginRegistry::empty();
        registry.register_release_plugin(Box::new(FailingPlugin));

        let err = run_release_plugins(&projects, &registry, &Version::new(1, 0, 0), false)
            .unwrap_err();
        assert!(matches!(err, RewriteError::Plugin { plugin, .. } if plugin == "failing"));
    }

    #[test]
    fn unknown_plugin_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let projects = vec![Project::new(root, ReleaseConfig::default())];

        let err = run_release_plugins(
            &projects,
            &PluginRegistry::empty(),
            &Version::new(1, 0, 0),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, RewriteError::UnknownPlugin(_)));
    }
}
