//! Git operations for release workflows.
//!
//! Shells out to `git` for all operations. This ensures we inherit the user's
//! SSH keys, GPG signing, hooks, and other configuration.

use std::process::Command;

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "status").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Per-file worktree status, from `git status --porcelain`.
///
/// The two characters are git's short-format codes: `index` for the staging
/// area, `worktree` for the working tree (`?` in both for untracked files).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Staging-area status code.
    pub index: char,
    /// Working-tree status code.
    pub worktree: char,
    /// The file the status applies to.
    pub path: String,
}

/// Get the repository's top-level directory.
///
/// Returns `None` when the current directory is not inside a git repository
/// or when git itself is unavailable.
#[instrument]
pub fn toplevel() -> GitResult<Option<Utf8PathBuf>> {
    match git(&["rev-parse", "--show-toplevel"]) {
        Ok(output) => Ok(Some(Utf8PathBuf::from(output.trim()))),
        Err(GitError::NotARepo) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Get the current branch name.
///
/// Returns `None` if in a detached HEAD state.
#[instrument]
pub fn current_branch() -> GitResult<Option<String>> {
    let output = git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
    let branch = output.trim().to_string();
    if branch == "HEAD" {
        debug!("detached HEAD");
        Ok(None)
    } else {
        debug!(%branch, "current branch");
        Ok(Some(branch))
    }
}

/// List the configured remotes.
#[instrument]
pub fn remotes() -> GitResult<Vec<String>> {
    let output = git(&["remote"])?;
    Ok(output.lines().map(str::to_string).collect())
}

/// List the files tracked by git under the current directory.
#[instrument]
pub fn tracked_files() -> GitResult<Vec<Utf8PathBuf>> {
    let output = git(&["ls-files"])?;
    Ok(output.lines().map(Utf8PathBuf::from).collect())
}

/// Get the per-file status of the working tree.
#[instrument]
pub fn status() -> GitResult<Vec<StatusEntry>> {
    let output = git(&["status", "--porcelain"])?;
    let entries = output
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let mut chars = line.chars();
            StatusEntry {
                index: chars.next().unwrap_or(' '),
                worktree: chars.next().unwrap_or(' '),
                path: line[3..].to_string(),
            }
        })
        .collect();
    Ok(entries)
}

/// Stage the given paths.
#[instrument(skip(paths))]
pub fn add<I, S>(paths: I) -> GitResult<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut args = vec!["add".to_string()];
    args.extend(paths.into_iter().map(|p| p.as_ref().to_string()));
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    git(&args)?;
    Ok(())
}

/// Create a commit with the given message.
#[instrument]
pub fn commit(message: &str, allow_empty: bool) -> GitResult<()> {
    let mut args = vec!["commit", "-m", message];
    if allow_empty {
        args.push("--allow-empty");
    }
    git(&args)?;
    Ok(())
}

/// Create a tag named `name` at HEAD.
#[instrument]
pub fn tag(name: &str, force: bool) -> GitResult<()> {
    let mut args = vec!["tag"];
    if force {
        args.push("--force");
    }
    args.push(name);
    git(&args)?;
    Ok(())
}

/// Push `branch` and `tag_name` to `remote`.
#[instrument]
pub fn push(remote: &str, branch: &str, tag_name: &str, force: bool) -> GitResult<()> {
    let mut args = vec!["push"];
    if force {
        args.push("--force");
    }
    args.extend([remote, branch, tag_name]);
    git(&args)?;
    Ok(())
}

/// Run a git command and return its stdout.
fn git(args: &[&str]) -> GitResult<String> {
    let output = Command::new("git").args(args).output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        // Detect "not a git repo" specifically
        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }

        Err(GitError::Command {
            command: args.first().unwrap_or(&"").to_string(),
            stderr,
        })
    }
}
