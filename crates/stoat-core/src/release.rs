//! The release workflow.
//!
//! Sequences option validation, reference collection, consistency
//! validation, version resolution, file rewriting, tagging, pushing, and
//! host release creation. Every guard runs before any destructive action;
//! once files are written there is no rollback — a later failure is
//! surfaced for the operator to resolve by hand.

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::collect::{self, CollectError};
use crate::git::{self, GitError};
use crate::plugins::PluginRegistry;
use crate::project::Project;
use crate::refs::VersionRef;
use crate::resolve::{self, ResolveError};
use crate::rewrite::{self, RewriteError};
use crate::validate::{self, Validation};

/// Errors from the release workflow.
///
/// Everything up to and including the worktree checks is detected before any
/// file is touched. Rewrite and plugin failures may leave files partially
/// written; the error identifies the failing step so the operator can
/// inspect the state.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// `--dry` combined with `--validate`.
    #[error("--dry cannot be combined with --validate")]
    DryWithValidate,

    /// `--tag` combined with `--validate`.
    #[error("--tag cannot be combined with --validate")]
    TagWithValidate,

    /// `--push` without `--tag`.
    #[error("--push can only be combined with --tag")]
    PushWithoutTag,

    /// `--force` without `--tag`.
    #[error("--force can only be combined with --tag and --push")]
    ForceWithoutTag,

    /// `--remote` without `--push`.
    #[error("--remote can only be combined with --push")]
    RemoteWithoutPush,

    /// `--create-release` without `--tag`.
    #[error("--create-release can only be combined with --tag")]
    CreateReleaseWithoutTag,

    /// `--tag` or `--push` outside a git repository.
    #[error("not in a git repository, cannot use --{0}")]
    NotARepo(&'static str),

    /// The requested push remote does not exist.
    #[error("git remote \"{0}\" does not exist")]
    UnknownRemote(String),

    /// Not on any branch while a branch-checked operation was requested.
    #[error("not currently on a git branch")]
    DetachedHead,

    /// The current branch is not the configured release branch.
    #[error("current branch is \"{current}\" but releases are created from \"{expected}\"")]
    BranchMismatch {
        /// The branch we are on.
        current: String,
        /// The configured release branch.
        expected: String,
    },

    /// Unstaged or untracked changes in the worktree.
    #[error("found untracked changes in worktree")]
    DirtyWorktree,

    /// Files holding version references are not tracked by git.
    #[error(
        "some of the files with version references are not tracked by git: {}",
        .0.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", ")
    )]
    UntrackedFiles(Vec<Utf8PathBuf>),

    /// The operator declined the staged-changes confirmation.
    #[error("release cancelled")]
    Cancelled,

    /// Neither a version argument nor `--validate` was given.
    #[error("no action implied, specify a version argument or the --validate option")]
    NoAction,

    /// The expected version supplied to `--validate` is not valid semver.
    #[error("invalid version \"{version}\": {source}")]
    InvalidVersion {
        /// The offending argument.
        version: String,
        /// The parse error.
        source: semver::Error,
    },

    /// The configured tag format has no `{version}` placeholder.
    #[error("release.tag-format must contain {{version}}")]
    InvalidTagFormat,

    /// Creating the host release failed.
    #[error("host release creation failed: {0}")]
    HostRelease(String),

    /// Reference collection failed.
    #[error(transparent)]
    Collect(#[from] CollectError),

    /// Target version resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// File rewriting failed.
    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    /// A git operation failed.
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Result alias for the release workflow.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Options controlling the release workflow, mirroring the CLI surface.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    /// Target version or increment rule name.
    pub version: Option<String>,
    /// Commit the changed files and create a tag.
    pub tag: bool,
    /// Push the commit and tag to the remote.
    pub push: bool,
    /// Create a release on the repository host.
    pub create_release: bool,
    /// The remote to push to (default `origin`).
    pub remote: Option<String>,
    /// Compute and display changes without writing anything.
    pub dry: bool,
    /// Force tag creation and push.
    pub force: bool,
    /// Validate reference consistency instead of bumping.
    pub validate: bool,
    /// Skip the release-branch check.
    pub no_branch_check: bool,
    /// Skip the worktree state check.
    pub no_worktree_check: bool,
}

/// Progress events emitted while a release executes, for display by the CLI.
#[derive(Debug, Clone)]
pub enum ReleaseEvent {
    /// Dry mode is enabled; nothing will be written.
    DryRun,
    /// References are about to be rewritten to `target`.
    Bumping {
        /// The references being rewritten.
        refs: Vec<VersionRef>,
        /// The target version.
        target: Version,
    },
    /// A tag is being created.
    Tagging {
        /// The tag name.
        tag: String,
    },
    /// The branch and tag are being pushed.
    Pushing {
        /// The branch being pushed.
        branch: String,
        /// The tag being pushed.
        tag: String,
        /// The remote pushed to.
        remote: String,
    },
    /// A release is being created on the repository host.
    CreatingRelease {
        /// The tag the release is created for.
        tag: String,
    },
}

/// Outcome of a completed release invocation.
#[derive(Debug)]
pub enum ReleaseOutcome {
    /// `--validate` mode: the references and their consistency verdict.
    Validated {
        /// All collected references.
        refs: Vec<VersionRef>,
        /// The consistency verdict.
        result: Validation,
    },
    /// A version was bumped (and possibly tagged/pushed).
    Released(ReleaseSummary),
}

/// What a bump actually did.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseSummary {
    /// The version everything was bumped to.
    pub version: Version,
    /// Files changed by the rewrite and by release plugins.
    pub changed_files: Vec<Utf8PathBuf>,
    /// The created tag, when `--tag` was given.
    pub tag: Option<String>,
    /// Whether the commit and tag were pushed.
    pub pushed: bool,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

/// Run the release workflow over `projects`.
///
/// `confirm` is consulted when staged-but-committed-able changes are found
/// during the worktree check; `on_event` receives progress events for
/// display. The first project is the root project; its configuration
/// provides the release branch, commit message, and tag format.
#[instrument(skip_all, fields(validate = opts.validate, tag = opts.tag, push = opts.push, dry = opts.dry))]
pub fn run_release(
    projects: &[Project],
    registry: &PluginRegistry,
    cwd: &Utf8Path,
    opts: &ReleaseOptions,
    mut confirm: impl FnMut(&str) -> bool,
    mut on_event: impl FnMut(ReleaseEvent),
) -> ReleaseResult<ReleaseOutcome> {
    let (in_repo, remote) = validate_options(
        opts,
        || git::toplevel().ok().flatten().is_some(),
        git::remotes,
    )?;

    let refs = collect::collect_version_refs(projects, registry, cwd)?;

    if opts.validate {
        let expected = match &opts.version {
            Some(version) => {
                // The expected version must be a literal, not a rule.
                Version::parse(version).map_err(|source| ReleaseError::InvalidVersion {
                    version: version.clone(),
                    source,
                })?;
                Some(version.clone())
            }
            // Fall back to the manifest version so stray references are
            // caught even without an explicit expectation.
            None => validate::manifest_version(&refs).ok().map(|v| v.to_string()),
        };
        let result = validate::validate_refs(&refs, expected.as_deref());
        return Ok(ReleaseOutcome::Validated { refs, result });
    }

    let Some(version_arg) = &opts.version else {
        return Err(ReleaseError::NoAction);
    };

    let root = projects.first();
    if opts.tag && in_repo && !opts.no_branch_check {
        check_release_branch(root.map_or("develop", |p| p.config.branch.as_str()))?;
    }
    if opts.tag && in_repo && !opts.no_worktree_check {
        check_worktree(&refs, &mut confirm)?;
    }

    if opts.dry {
        on_event(ReleaseEvent::DryRun);
    }

    let target = resolve::resolve_target(&refs, version_arg, registry)?;
    on_event(ReleaseEvent::Bumping {
        refs: refs.clone(),
        target: target.clone(),
    });

    let mut changed_files = rewrite::rewrite_refs(&refs, &target, opts.dry)?;
    changed_files.extend(rewrite::run_release_plugins(
        projects, registry, &target, opts.dry,
    )?);

    let mut tag_name = None;
    let mut pushed = false;

    if opts.tag {
        let name = create_tag(root, &target, &changed_files, opts, &mut on_event)?;

        if opts.push {
            let branch = git::current_branch()?.ok_or(ReleaseError::DetachedHead)?;
            on_event(ReleaseEvent::Pushing {
                branch: branch.clone(),
                tag: name.clone(),
                remote: remote.clone(),
            });
            if !opts.dry {
                git::push(&remote, &branch, &name, opts.force)?;
            }
            pushed = true;
        }

        if opts.create_release {
            on_event(ReleaseEvent::CreatingRelease { tag: name.clone() });
            if !opts.dry {
                create_host_release(&name)?;
            }
        }

        tag_name = Some(name);
    }

    info!(version = %target, files = changed_files.len(), tag = ?tag_name, pushed, "release complete");

    Ok(ReleaseOutcome::Released(ReleaseSummary {
        version: target,
        changed_files,
        tag: tag_name,
        pushed,
        dry_run: opts.dry,
    }))
}

/// Reject option combinations that make no sense, resolve the push remote.
///
/// Flag conflicts are checked before anything touches git; the repository
/// and remote lookups only happen once a git-dependent flag survives those
/// checks, so a rejected invocation never spawns a subprocess.
fn validate_options(
    opts: &ReleaseOptions,
    in_repo: impl FnOnce() -> bool,
    remotes: impl FnOnce() -> Result<Vec<String>, GitError>,
) -> ReleaseResult<(bool, String)> {
    if opts.dry && opts.validate {
        return Err(ReleaseError::DryWithValidate);
    }
    if opts.tag && opts.validate {
        return Err(ReleaseError::TagWithValidate);
    }
    if opts.push && !opts.tag {
        return Err(ReleaseError::PushWithoutTag);
    }
    if opts.force && !opts.tag {
        return Err(ReleaseError::ForceWithoutTag);
    }
    if opts.remote.is_some() && !opts.push {
        return Err(ReleaseError::RemoteWithoutPush);
    }
    if opts.create_release && !opts.tag {
        return Err(ReleaseError::CreateReleaseWithoutTag);
    }

    // The repository state only matters for git-backed operations.
    let in_repo = (opts.tag || opts.push) && in_repo();
    if opts.tag && !in_repo {
        return Err(ReleaseError::NotARepo("tag"));
    }
    if opts.push && !in_repo {
        return Err(ReleaseError::NotARepo("push"));
    }

    let remote = opts.remote.clone().unwrap_or_else(|| "origin".to_string());
    if opts.push && !remotes()?.contains(&remote) {
        return Err(ReleaseError::UnknownRemote(remote));
    }

    Ok((in_repo, remote))
}

/// Check that the current branch is the configured release branch.
fn check_release_branch(expected: &str) -> ReleaseResult<()> {
    let current = git::current_branch()?.ok_or(ReleaseError::DetachedHead)?;
    if current != expected {
        return Err(ReleaseError::BranchMismatch {
            current,
            expected: expected.to_string(),
        });
    }
    debug!(branch = %current, "on release branch");
    Ok(())
}

/// Check that the worktree is clean and every referenced file is tracked.
///
/// Staged-only modifications are allowed after confirmation — they end up in
/// the release commit.
fn check_worktree(
    refs: &[VersionRef],
    confirm: &mut impl FnMut(&str) -> bool,
) -> ReleaseResult<()> {
    let required: std::collections::BTreeSet<Utf8PathBuf> =
        refs.iter().map(|r| canonical(&r.file)).collect();
    let tracked: std::collections::BTreeSet<Utf8PathBuf> = git::tracked_files()?
        .iter()
        .map(|f| canonical(f))
        .collect();

    let untracked: Vec<Utf8PathBuf> = required.difference(&tracked).cloned().collect();
    if !untracked.is_empty() {
        return Err(ReleaseError::UntrackedFiles(untracked));
    }

    let entries = git::status()?;
    if entries.iter().any(|e| e.worktree != ' ') {
        return Err(ReleaseError::DirtyWorktree);
    }
    if entries.iter().any(|e| e.index != ' ' && e.index != '?') {
        warn!("staged changes present, they will be part of the release commit");
        if !confirm(
            "found modified files in the staging area. \
             these files will be committed into the release tag.",
        ) {
            return Err(ReleaseError::Cancelled);
        }
    }

    Ok(())
}

/// Stage the changed files, commit, and create the tag.
fn create_tag(
    root: Option<&Project>,
    target: &Version,
    changed_files: &[Utf8PathBuf],
    opts: &ReleaseOptions,
    on_event: &mut impl FnMut(ReleaseEvent),
) -> ReleaseResult<String> {
    let (tag_format, commit_message) = root.map_or(("{version}", "release {version}"), |p| {
        (p.config.tag_format.as_str(), p.config.commit_message.as_str())
    });

    if !tag_format.contains("{version}") {
        return Err(ReleaseError::InvalidTagFormat);
    }
    let tag_name = tag_format.replace("{version}", &target.to_string());
    on_event(ReleaseEvent::Tagging {
        tag: tag_name.clone(),
    });

    if !opts.dry {
        let message = commit_message.replace("{version}", &target.to_string());
        git::add(changed_files.iter().map(|p| p.as_str()))?;
        // The rewrite may have been a no-op (e.g. re-releasing the same
        // version); the release commit is still wanted.
        git::commit(&message, true)?;
        git::tag(&tag_name, opts.force)?;
    }

    Ok(tag_name)
}

/// Create a release on the repository host for `tag`.
fn create_host_release(tag: &str) -> ReleaseResult<()> {
    let output = std::process::Command::new("gh")
        .args(["release", "create", tag, "--generate-notes"])
        .output()
        .map_err(|e| ReleaseError::HostRelease(format!("failed to execute gh: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(ReleaseError::HostRelease(stderr));
    }
    Ok(())
}

/// Canonicalize for comparison, falling back to the path as given.
fn canonical(path: &Utf8Path) -> Utf8PathBuf {
    path.canonicalize_utf8().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_remotes() -> Result<Vec<String>, GitError> {
        Ok(Vec::new())
    }

    #[test]
    fn dry_conflicts_with_validate() {
        let opts = ReleaseOptions {
            dry: true,
            validate: true,
            ..ReleaseOptions::default()
        };
        assert!(matches!(
            validate_options(&opts, || true, no_remotes),
            Err(ReleaseError::DryWithValidate)
        ));
    }

    #[test]
    fn tag_conflicts_with_validate() {
        let opts = ReleaseOptions {
            tag: true,
            validate: true,
            ..ReleaseOptions::default()
        };
        assert!(matches!(
            validate_options(&opts, || true, no_remotes),
            Err(ReleaseError::TagWithValidate)
        ));
    }

    #[test]
    fn push_requires_tag() {
        let opts = ReleaseOptions {
            push: true,
            ..ReleaseOptions::default()
        };
        assert!(matches!(
            validate_options(&opts, || true, no_remotes),
            Err(ReleaseError::PushWithoutTag)
        ));
    }

    #[test]
    fn force_requires_tag() {
        let opts = ReleaseOptions {
            force: true,
            ..ReleaseOptions::default()
        };
        assert!(matches!(
            validate_options(&opts, || true, no_remotes),
            Err(ReleaseError::ForceWithoutTag)
        ));
    }

    #[test]
    fn remote_requires_push() {
        let opts = ReleaseOptions {
            remote: Some("upstream".into()),
            ..ReleaseOptions::default()
        };
        assert!(matches!(
            validate_options(&opts, || true, no_remotes),
            Err(ReleaseError::RemoteWithoutPush)
        ));
    }

    #[test]
    fn create_release_requires_tag() {
        let opts = ReleaseOptions {
            create_release: true,
            ..ReleaseOptions::default()
        };
        assert!(matches!(
            validate_options(&opts, || true, no_remotes),
            Err(ReleaseError::CreateReleaseWithoutTag)
        ));
    }

    #[test]
    fn tag_outside_repo_is_rejected() {
        let opts = ReleaseOptions {
            tag: true,
            ..ReleaseOptions::default()
        };
        assert!(matches!(
            validate_options(&opts, || false, no_remotes),
            Err(ReleaseError::NotARepo("tag"))
        ));
    }

    #[test]
    fn unknown_remote_is_rejected() {
        let opts = ReleaseOptions {
            tag: true,
            push: true,
            remote: Some("nowhere".into()),
            ..ReleaseOptions::default()
        };
        let result = validate_options(&opts, || true, || Ok(vec!["origin".to_string()]));
        assert!(matches!(result, Err(ReleaseError::UnknownRemote(r)) if r == "nowhere"));
    }

    #[test]
    fn remote_defaults_to_origin() {
        let opts = ReleaseOptions {
            tag: true,
            push: true,
            ..ReleaseOptions::default()
        };
        let (_, remote) =
            validate_options(&opts, || true, || Ok(vec!["origin".to_string()])).unwrap();
        assert_eq!(remote, "origin");
    }

    #[test]
    fn plain_bump_options_validate() {
        let opts = ReleaseOptions {
            version: Some("1.2.3".into()),
            ..ReleaseOptions::default()
        };
        // No git repo needed when neither --tag nor --push is requested.
        assert!(validate_options(&opts, || false, no_remotes).is_ok());
    }

    #[test]
    fn tag_format_without_placeholder_is_fatal() {
        let root = Project::new(
            Utf8PathBuf::from("."),
            crate::config::ReleaseConfig {
                tag_format: "stable".into(),
                ..crate::config::ReleaseConfig::default()
            },
        );
        let opts = ReleaseOptions {
            tag: true,
            dry: true,
            ..ReleaseOptions::default()
        };
        let err = create_tag(
            Some(&root),
            &Version::new(2, 0, 0),
            &[],
            &opts,
            &mut |_| {},
        )
        .unwrap_err();
        assert!(matches!(err, ReleaseError::InvalidTagFormat));
    }

    #[test]
    fn tag_name_interpolates_version() {
        let root = Project::new(
            Utf8PathBuf::from("."),
            crate::config::ReleaseConfig {
                tag_format: "v{version}".into(),
                ..crate::config::ReleaseConfig::default()
            },
        );
        let opts = ReleaseOptions {
            tag: true,
            dry: true, // dry: no git commands are run
            ..ReleaseOptions::default()
        };
        let mut events = Vec::new();
        let tag = create_tag(
            Some(&root),
            &Version::new(2, 0, 0),
            &[],
            &opts,
            &mut |e| events.push(e),
        )
        .unwrap();
        assert_eq!(tag, "v2.0.0");
        assert!(matches!(&events[0], ReleaseEvent::Tagging { tag } if tag == "v2.0.0"));
    }
}
