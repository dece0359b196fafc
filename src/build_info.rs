//! Version and source-control details of the running build, captured at compile time.

use crate::update::Version;

pub const APP_TITLE: &str = "Virtual Display Driver Control";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildVersionInfo {
    pub version: Version,
    pub short_sha: String,
    /// Number of uncommitted changes in the tree the build was made from
    pub uncommitted_changes: usize,
}

impl BuildVersionInfo {
    pub fn current() -> Self {
        Self {
            version: Version::new(
                parse_or_zero(env!("CARGO_PKG_VERSION_MAJOR")),
                parse_or_zero(env!("CARGO_PKG_VERSION_MINOR")),
                parse_or_zero(env!("CARGO_PKG_VERSION_PATCH")),
            ),
            short_sha: option_env!("VDD_GIT_SHORT_SHA").unwrap_or("unknown").to_string(),
            uncommitted_changes: option_env!("VDD_GIT_UNCOMMITTED")
                .and_then(|n| n.parse().ok())
                .unwrap_or(0),
        }
    }

    /// `0.3.1.dev-abc1234-dirty` for development builds, `0.3.1-abc1234` for release builds.
    pub fn version_string(&self, debug: bool) -> String {
        if debug {
            let dirty = if self.uncommitted_changes > 0 { "-dirty" } else { "" };
            format!("{}.dev-{}{}", self.version, self.short_sha, dirty)
        } else {
            format!("{}-{}", self.version, self.short_sha)
        }
    }

    /// The line shown in the settings page's about section.
    pub fn app_info(&self) -> String {
        format!("{} - v{}", APP_TITLE, self.version_string(cfg!(debug_assertions)))
    }
}

fn parse_or_zero(s: &str) -> u64 {
    s.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(uncommitted_changes: usize) -> BuildVersionInfo {
        BuildVersionInfo {
            version: Version::new(0, 3, 1),
            short_sha: "4f2a9c1".to_string(),
            uncommitted_changes,
        }
    }

    #[test]
    fn release_version_string() {
        assert_eq!(info(0).version_string(false), "0.3.1-4f2a9c1");
        assert_eq!(info(3).version_string(false), "0.3.1-4f2a9c1");
    }

    #[test]
    fn dev_version_string_marks_dirty_trees() {
        assert_eq!(info(0).version_string(true), "0.3.1.dev-4f2a9c1");
        assert_eq!(info(2).version_string(true), "0.3.1.dev-4f2a9c1-dirty");
    }

    #[test]
    fn current_matches_package_version() {
        let current = BuildVersionInfo::current();
        assert_eq!(current.version.to_string(), env!("CARGO_PKG_VERSION"));
        assert!(current.app_info().starts_with("Virtual Display Driver Control - v0.3.1"));
    }
}
