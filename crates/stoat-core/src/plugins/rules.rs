//! Built-in version increment rules.

use semver::{Prerelease, Version};

use super::IncrementRule;

/// The identifier/rule pairs registered by default.
pub const BUILTIN_RULES: &[(&str, BumpRule)] = &[
    ("major", BumpRule::Major),
    ("premajor", BumpRule::Premajor),
    ("minor", BumpRule::Minor),
    ("preminor", BumpRule::Preminor),
    ("patch", BumpRule::Patch),
    ("prepatch", BumpRule::Prepatch),
    ("prerelease", BumpRule::Prerelease),
];

/// The built-in semver bump rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpRule {
    /// X.0.0
    Major,
    /// X.0.0-rc.1
    Premajor,
    /// x.Y.0
    Minor,
    /// x.Y.0-rc.1
    Preminor,
    /// x.y.Z, or finalize a pre-release without bumping.
    Patch,
    /// x.y.Z-rc.1
    Prepatch,
    /// Bump the trailing pre-release number; acts like `prepatch` on a
    /// release version.
    Prerelease,
}

impl IncrementRule for BumpRule {
    fn increment(&self, current: &Version) -> Version {
        match self {
            Self::Major => Version::new(current.major + 1, 0, 0),
            Self::Premajor => first_pre(current.major + 1, 0, 0),
            Self::Minor => Version::new(current.major, current.minor + 1, 0),
            Self::Preminor => first_pre(current.major, current.minor + 1, 0),
            Self::Patch => {
                if current.pre.is_empty() {
                    Version::new(current.major, current.minor, current.patch + 1)
                } else {
                    // Finalizing a pre-release: 1.2.3-rc.2 → 1.2.3
                    Version::new(current.major, current.minor, current.patch)
                }
            }
            Self::Prepatch => first_pre(current.major, current.minor, current.patch + 1),
            Self::Prerelease => {
                if current.pre.is_empty() {
                    return first_pre(current.major, current.minor, current.patch + 1);
                }
                let mut version =
                    Version::new(current.major, current.minor, current.patch);
                version.pre = next_prerelease(&current.pre);
                version
            }
        }
    }
}

/// Build `major.minor.patch-rc.1`.
fn first_pre(major: u64, minor: u64, patch: u64) -> Version {
    let mut version = Version::new(major, minor, patch);
    version.pre = Prerelease::new("rc.1").unwrap_or_default();
    version
}

/// Increment the trailing numeric identifier of a pre-release, or append
/// `.1` when there is none (`rc.1` → `rc.2`, `beta` → `beta.1`).
fn next_prerelease(pre: &Prerelease) -> Prerelease {
    let mut parts: Vec<String> = pre.as_str().split('.').map(str::to_string).collect();
    match parts.last().and_then(|last| last.parse::<u64>().ok()) {
        Some(n) => {
            let last = parts.len() - 1;
            parts[last] = (n + 1).to_string();
        }
        None => parts.push("1".to_string()),
    }
    Prerelease::new(&parts.join(".")).unwrap_or_default()
}
