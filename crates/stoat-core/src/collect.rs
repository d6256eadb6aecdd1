//! Reference collection across all managed projects.
//!
//! Builds the full, ordered set of version references for an invocation:
//! the implicit build-descriptor rule, the configured references, and
//! whatever the projects' plugins report. The collected set is what every
//! later step (validation, resolution, rewriting) operates on.

use camino::Utf8Path;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::config::VersionRefConfig;
use crate::plugins::{PluginError, PluginRegistry};
use crate::project::{MANIFEST_FILE, MANIFEST_VERSION_PATTERN, Project};
use crate::refs::{self, RefError, VersionRef};

/// Errors from reference collection.
#[derive(Error, Debug)]
pub enum CollectError {
    /// A configured reference pattern failed to match (bad pattern, unreadable file).
    #[error(transparent)]
    Ref(#[from] RefError),

    /// A configured plugin identifier is not in the registry.
    #[error("unknown release plugin \"{0}\"")]
    UnknownPlugin(String),

    /// A plugin failed while supplying references. Collection aborts rather
    /// than proceeding with a partial reference set.
    #[error("release plugin \"{plugin}\" failed while collecting references: {source}")]
    Plugin {
        /// The plugin's identifier.
        plugin: String,
        /// The plugin's error.
        source: PluginError,
    },
}

/// Result alias for collection.
pub type CollectResult<T> = Result<T, CollectError>;

/// Collect every version reference across `projects`.
///
/// For each project, the implicit manifest rule is matched first, then the
/// configured references in order, then each configured plugin is asked for
/// additional references. The result is stably sorted by file path (ties
/// keep discovery order), and absolute paths under `cwd` are rewritten to
/// relative ones.
#[instrument(skip(projects, registry), fields(projects = projects.len()))]
pub fn collect_version_refs(
    projects: &[Project],
    registry: &PluginRegistry,
    cwd: &Utf8Path,
) -> CollectResult<Vec<VersionRef>> {
    let mut version_refs = Vec::new();

    // Configured references, with the build descriptor always first.
    for project in projects {
        let builtin = VersionRefConfig {
            file: MANIFEST_FILE.into(),
            pattern: MANIFEST_VERSION_PATTERN.to_string(),
        };
        let configured = std::iter::once(&builtin).chain(&project.config.references);

        for reference in configured {
            let file = project.root.join(&reference.file);
            if let Some(version_ref) = refs::match_version_ref(&file, &reference.pattern)? {
                version_refs.push(version_ref);
            }
        }
    }

    // Plugin-supplied references.
    for project in projects {
        for name in &project.config.plugins {
            let plugin = registry
                .release_plugin(name)
                .ok_or_else(|| CollectError::UnknownPlugin(name.clone()))?;
            match plugin.version_refs(project) {
                Ok(more) => version_refs.extend(more),
                Err(source) => {
                    error!(plugin = %name, %source, "plugin failed during collection");
                    return Err(CollectError::Plugin {
                        plugin: name.clone(),
                        source,
                    });
                }
            }
        }
    }

    version_refs.sort_by(|a, b| a.file.cmp(&b.file));

    for version_ref in &mut version_refs {
        if version_ref.file.is_absolute()
            && let Ok(relative) = version_ref.file.strip_prefix(cwd)
        {
            version_ref.file = relative.to_path_buf();
        }
    }

    debug!(count = version_refs.len(), "version references collected");
    Ok(version_refs)
}
