//! Built-in plugin that finds version constants in source code.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use super::{PluginResult, ReleasePlugin};
use crate::project::Project;
use crate::refs::{self, VersionRef};

/// Pattern locating a `VERSION` string constant in a Rust source file.
pub const SOURCE_VERSION_PATTERN: &str =
    r#"(?m)^(?:pub\s+)?const\s+VERSION\s*:\s*&str\s*=\s*"{version}"\s*;"#;

/// Scans each project's `src/` tree for `.rs` files that declare a `VERSION`
/// string constant and reports those occurrences as version references, so
/// the constant is bumped together with the manifest.
pub struct SourceCodeVersionPlugin;

impl ReleasePlugin for SourceCodeVersionPlugin {
    fn name(&self) -> &'static str {
        "source_code_version"
    }

    fn version_refs(&self, project: &Project) -> PluginResult<Vec<VersionRef>> {
        let src = project.root.join("src");
        let mut files = Vec::new();
        collect_rs_files(&src, &mut files)?;

        let mut found = Vec::new();
        for file in files {
            if let Some(version_ref) = refs::match_version_ref(&file, SOURCE_VERSION_PATTERN)? {
                found.push(version_ref);
            }
        }
        debug!(project = %project.root, count = found.len(), "source version constants");
        Ok(found)
    }
}

/// Recursively list `.rs` files under `dir`, sorted for deterministic
/// collection order. A missing directory yields an empty list.
fn collect_rs_files(dir: &Utf8Path, out: &mut Vec<Utf8PathBuf>) -> std::io::Result<()> {
    let entries = match dir.read_dir_utf8() {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let mut entries: Vec<_> = entries.collect::<Result<_, _>>()?;
    entries.sort_by_key(|entry| entry.path().to_path_buf());

    for entry in entries {
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_rs_files(path, out)?;
        } else if path.extension() == Some("rs") {
            out.push(path.to_path_buf());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReleaseConfig;
    use std::fs;
    use tempfile::TempDir;

    fn project_in(tmp: &TempDir) -> Project {
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        Project::new(root, ReleaseConfig::default())
    }

    #[test]
    fn finds_version_constant() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("src")).unwrap();
        fs::write(
            tmp.path().join("src/lib.rs"),
            "//! lib\npub const VERSION: &str = \"0.3.0\";\n",
        )
        .unwrap();

        let found = SourceCodeVersionPlugin
            .version_refs(&project_in(&tmp))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "0.3.0");
        assert_eq!(found[0].file.file_name(), Some("lib.rs"));
    }

    #[test]
    fn scans_nested_modules() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src/nested")).unwrap();
        fs::write(tmp.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(
            tmp.path().join("src/nested/version.rs"),
            "const VERSION: &str = \"1.0.0\";\n",
        )
        .unwrap();

        let found = SourceCodeVersionPlugin
            .version_refs(&project_in(&tmp))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "1.0.0");
    }

    #[test]
    fn missing_src_dir_reports_nothing() {
        let tmp = TempDir::new().unwrap();
        let found = SourceCodeVersionPlugin
            .version_refs(&project_in(&tmp))
            .unwrap();
        assert!(found.is_empty());
    }
}
