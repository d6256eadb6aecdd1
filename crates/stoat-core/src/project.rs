//! Managed packages and their release configuration.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, instrument};

use crate::config::{self, Config, ConfigLoader, ReleaseConfig};
use crate::error::ConfigResult;

/// The file name of a package's build descriptor.
pub const MANIFEST_FILE: &str = "Cargo.toml";

/// The fixed pattern locating the version field inside a build descriptor.
///
/// Every project is implicitly scanned with this pattern, ahead of any
/// configured references.
pub const MANIFEST_VERSION_PATTERN: &str = r#"(?m)^version\s*=\s*"{version}""#;

/// One managed package: a directory with a build descriptor and a release
/// configuration.
#[derive(Debug, Clone)]
pub struct Project {
    /// The package's root directory.
    pub root: Utf8PathBuf,
    /// Per-project release configuration.
    pub config: ReleaseConfig,
}

impl Project {
    /// Create a project rooted at `root` with the given release config.
    pub const fn new(root: Utf8PathBuf, config: ReleaseConfig) -> Self {
        Self { root, config }
    }

    /// Path to the project's build descriptor (`Cargo.toml`).
    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.root.join(MANIFEST_FILE)
    }
}

/// Build the list of managed projects for this invocation.
///
/// The root project (at `cwd`) always comes first and carries the loaded
/// release configuration. Directories listed under `projects` in the config
/// are appended; each uses its own `.stoat.*`/`stoat.*` file's release
/// section when one exists in that directory, and inherits the root's
/// release configuration otherwise.
#[instrument(skip(cfg), fields(%cwd))]
pub fn discover_projects(cwd: &Utf8Path, cfg: &Config) -> ConfigResult<Vec<Project>> {
    let root_release = cfg.release.clone();
    let mut projects = vec![Project::new(cwd.to_path_buf(), root_release.clone())];

    for member in &cfg.projects {
        let dir = cwd.join(member);
        let release = match config::config_file_in(&dir) {
            Some(file) => {
                debug!(%dir, %file, "loading member release config");
                ConfigLoader::new()
                    .with_user_config(false)
                    .with_file(&file)
                    .load()?
                    .release
            }
            None => root_release.clone(),
        };
        projects.push(Project::new(dir, release));
    }

    debug!(count = projects.len(), "projects discovered");
    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn root_project_comes_first() {
        let tmp = TempDir::new().unwrap();
        let cwd = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();

        let projects = discover_projects(&cwd, &Config::default()).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].root, cwd);
        assert_eq!(projects[0].manifest_path(), cwd.join("Cargo.toml"));
    }

    #[test]
    fn members_inherit_root_release_config() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("member")).unwrap();
        let cwd = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();

        let cfg = Config {
            projects: vec!["member".into()],
            release: ReleaseConfig {
                branch: "main".into(),
                ..ReleaseConfig::default()
            },
            ..Config::default()
        };

        let projects = discover_projects(&cwd, &cfg).unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[1].root, cwd.join("member"));
        assert_eq!(projects[1].config.branch, "main");
    }

    #[test]
    fn member_config_file_takes_precedence() {
        let tmp = TempDir::new().unwrap();
        let member = tmp.path().join("member");
        fs::create_dir(&member).unwrap();
        fs::write(
            member.join(".stoat.toml"),
            "[release]\nplugins = [\"changelog_release\"]\n",
        )
        .unwrap();
        let cwd = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();

        let cfg = Config {
            projects: vec!["member".into()],
            ..Config::default()
        };

        let projects = discover_projects(&cwd, &cfg).unwrap();
        assert_eq!(projects[1].config.plugins, ["changelog_release"]);
        // Root keeps its defaults
        assert_eq!(projects[0].config.plugins.len(), 2);
    }
}
