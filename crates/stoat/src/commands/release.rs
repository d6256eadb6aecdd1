//! Release command — thin CLI layer over `stoat_core::release`.

use anyhow::bail;
use clap::Args;
use inquire::Confirm;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use stoat_core::VersionRef;
use stoat_core::config::Config;
use stoat_core::plugins::PluginRegistry;
use stoat_core::project;
use stoat_core::release::{self, ReleaseEvent, ReleaseOptions, ReleaseOutcome};
use stoat_core::semver::Version;
use stoat_core::validate::Validation;

/// Arguments for the `release` subcommand.
#[derive(Args, Debug, Default)]
pub struct ReleaseArgs {
    /// The target version number or rule to apply to the current version
    /// (major, premajor, minor, preminor, patch, prepatch, prerelease)
    #[arg(value_name = "VERSION")]
    pub version: Option<String>,

    /// Create a git tag after the version numbers were updated
    #[arg(short = 't', long)]
    pub tag: bool,

    /// Push the changes to the git remote repository
    #[arg(short = 'p', long)]
    pub push: bool,

    /// Create a release on the repository host
    #[arg(short = 'R', long)]
    pub create_release: bool,

    /// The git remote to push to (only with --push)
    #[arg(short = 'r', long, value_name = "NAME")]
    pub remote: Option<String>,

    /// Do not commit changes to disk
    #[arg(short = 'd', long)]
    pub dry: bool,

    /// Force tag creation and push
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Instead of bumping the version, validate that all version references
    /// are consistent (and match VERSION, if given)
    #[arg(long)]
    pub validate: bool,

    /// Do not validate the current git branch against the release branch
    #[arg(long)]
    pub no_branch_check: bool,

    /// Do not check the worktree state
    #[arg(long)]
    pub no_worktree_check: bool,
}

/// Execute the release command.
#[instrument(name = "cmd_release", skip_all, fields(json_output = global_json))]
pub fn cmd_release(
    args: ReleaseArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(validate = args.validate, tag = args.tag, "executing release command");

    let projects = project::discover_projects(cwd, config)?;
    let registry = PluginRegistry::with_builtins();

    let opts = ReleaseOptions {
        version: args.version,
        tag: args.tag,
        push: args.push,
        create_release: args.create_release,
        remote: args.remote,
        dry: args.dry,
        force: args.force,
        validate: args.validate,
        no_branch_check: args.no_branch_check,
        no_worktree_check: args.no_worktree_check,
    };

    let outcome = release::run_release(
        &projects,
        &registry,
        cwd,
        &opts,
        confirm_staged,
        |event| {
            if !global_json {
                print_event(&event);
            }
        },
    )?;

    match outcome {
        ReleaseOutcome::Validated { refs, result } => report_validation(&refs, result, global_json),
        ReleaseOutcome::Released(summary) => {
            if global_json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!();
                println!(
                    "  {} Version updated to {}",
                    "✓".green(),
                    summary.version.to_string().green().bold()
                );
                if let Some(ref tag) = summary.tag {
                    println!("  {} Tagged {}", "✓".green(), tag.cyan());
                }
                if summary.pushed {
                    println!("  {} Pushed", "✓".green());
                }
                for file in &summary.changed_files {
                    println!("  {} {}", "→".dimmed(), file.as_str().cyan());
                }
                if summary.dry_run {
                    println!();
                    println!("{}", "Dry run, no changes were made.".yellow());
                }
            }
            Ok(())
        }
    }
}

/// Map the validation verdict to output and exit status.
fn report_validation(
    refs: &[VersionRef],
    result: Validation,
    global_json: bool,
) -> anyhow::Result<()> {
    if global_json {
        let json = serde_json::json!({ "result": &result, "refs": refs });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return match result {
            Validation::Ok { .. } => Ok(()),
            _ => bail!("version references failed validation"),
        };
    }

    match result {
        Validation::Ok { .. } => {
            println!("{}", "versions are ok".green());
            show_version_refs(refs, None);
            Ok(())
        }
        Validation::Empty => bail!("no version numbers detected"),
        Validation::Inconsistent { .. } => {
            show_version_refs(refs, None);
            bail!("versions are inconsistent")
        }
        Validation::Mismatch { expected, actual } => {
            bail!("version mismatch, expected {expected}, got {actual}")
        }
    }
}

/// Print a progress event.
fn print_event(event: &ReleaseEvent) {
    match event {
        ReleaseEvent::DryRun => {
            println!(
                "{}",
                "dry mode enabled, no changes will be committed to disk".yellow()
            );
        }
        ReleaseEvent::Bumping { refs, target } => {
            println!(
                "bumping {} version reference{} to {}",
                refs.len().to_string().bold(),
                if refs.len() == 1 { "" } else { "s" },
                target.to_string().green().bold()
            );
            show_version_refs(refs, Some(target));
        }
        ReleaseEvent::Tagging { tag } => {
            println!();
            println!("tagging {}", tag.cyan());
        }
        ReleaseEvent::Pushing {
            branch,
            tag,
            remote,
        } => {
            println!();
            println!("pushing {}, {} to {}", branch.cyan(), tag.cyan(), remote.bold());
        }
        ReleaseEvent::CreatingRelease { tag } => {
            println!();
            println!("creating host release for {}", tag.cyan());
        }
    }
}

/// Print the version references as an aligned table.
///
/// The file name is shown once per group of references in the same file;
/// the matched line is appended, dimmed, for context.
fn show_version_refs(refs: &[VersionRef], increment_to: Option<&Version>) {
    let file_width = refs
        .iter()
        .map(|r| r.file.as_str().len() + 1)
        .max()
        .unwrap_or(0);
    let value_width = refs.iter().map(|r| r.value.len()).max().unwrap_or(0);

    let mut prev: Option<&VersionRef> = None;
    for r in refs {
        let filename = if prev.is_none_or(|p| p.file != r.file) {
            format!("{}:", r.file)
        } else {
            String::new()
        };
        print!(
            "  {} {}",
            format!("{filename:<file_width$}").cyan(),
            format!("{:<value_width$}", r.value),
        );
        if let Some(target) = increment_to {
            print!(" → {}", target.to_string().bold());
        }
        println!(" {}", format!("# {}", r.content).dimmed());
        prev = Some(r);
    }
}

/// Ask the operator whether to proceed with staged changes present.
fn confirm_staged(message: &str) -> bool {
    println!("{}", message.yellow());
    Confirm::new("continue?")
        .with_default(false)
        .prompt()
        .unwrap_or(false)
}
