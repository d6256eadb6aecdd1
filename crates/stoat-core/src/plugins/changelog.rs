//! Built-in plugin that finalizes the changelog for a release.

use camino::Utf8PathBuf;
use semver::Version;
use tracing::debug;

use super::{PluginResult, ReleasePlugin};
use crate::project::Project;

/// The heading that accumulates unreleased entries.
pub const UNRELEASED_HEADING: &str = "## [Unreleased]";

/// Rewrites the `## [Unreleased]` heading of a project's `CHANGELOG.md` to
/// the released version. Projects without a changelog, or whose changelog
/// has no unreleased section, are left untouched.
pub struct ChangelogReleasePlugin;

impl ReleasePlugin for ChangelogReleasePlugin {
    fn name(&self) -> &'static str {
        "changelog_release"
    }

    fn create_release(
        &self,
        project: &Project,
        version: &Version,
        dry_run: bool,
    ) -> PluginResult<Vec<Utf8PathBuf>> {
        let path = project.root.join("CHANGELOG.md");
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(%path, "no changelog");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if !content.contains(UNRELEASED_HEADING) {
            debug!(%path, "no unreleased section");
            return Ok(Vec::new());
        }

        let released = content.replacen(UNRELEASED_HEADING, &format!("## [{version}]"), 1);
        if !dry_run {
            std::fs::write(&path, released)?;
        }
        debug!(%path, %version, dry_run, "changelog finalized");
        Ok(vec![path])
    }
}
