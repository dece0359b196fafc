//! Release versions, tag parsing and the comparison rules used to decide
//! whether a published release counts as an update.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::update::UpdateError;

/// A `major.minor.patch` triple, ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::str::FromStr for Version {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_tolerant(s)
    }
}

impl From<semver::Version> for Version {
    fn from(v: semver::Version) -> Self {
        Self::new(v.major, v.minor, v.patch)
    }
}

/// How a release tag is turned into a [`Version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TagFormat {
    /// Strip a leading `v`, drop pre-release/build suffixes and pad missing components
    #[default]
    Tolerant,
    /// Take the 5 characters after the leading marker (`v0.3.1` -> `0.3.1`)
    FixedSlice,
}

/// How a remote version is compared against the running one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ComparePolicy {
    /// Update when any single component of the remote version is larger.
    ///
    /// This is what released builds of the control app have always done, which
    /// means a remote `1.9.9` counts as newer than a local `2.5.0`.
    #[default]
    Componentwise,
    /// Update only when the remote version is strictly greater as a tuple
    Semantic,
}

impl ComparePolicy {
    pub fn is_update(self, remote: Version, current: Version) -> bool {
        match self {
            ComparePolicy::Componentwise => {
                remote.major > current.major || remote.minor > current.minor || remote.patch > current.patch
            }
            ComparePolicy::Semantic => remote > current,
        }
    }
}

/// A tag that was successfully parsed, along with the text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTag {
    pub version: Version,
    pub display: String,
}

impl TagFormat {
    pub fn parse(self, tag: &str) -> Result<ParsedTag, UpdateError> {
        match self {
            TagFormat::Tolerant => {
                let version = parse_tolerant(tag)?;
                Ok(ParsedTag {
                    version,
                    display: format!("v{version}"),
                })
            }
            TagFormat::FixedSlice => {
                let slice = fixed_slice(tag)?;
                let version = parse_dotted(tag, slice)?;
                Ok(ParsedTag {
                    version,
                    display: format!("v{slice}"),
                })
            }
        }
    }
}

const SLICE_START: usize = 1;
const SLICE_LEN: usize = 5;

/// Returns the characters at positions 1..6 of `tag`.
///
/// Release tags have historically been shaped like `v0.3.1`, so this skips the
/// leading marker and keeps exactly five characters. Shorter tags are an error
/// instead of an out-of-range slice.
pub fn fixed_slice(tag: &str) -> Result<&str, UpdateError> {
    let mut indices = tag.char_indices().map(|(i, _)| i).chain(std::iter::once(tag.len()));

    let start = indices.nth(SLICE_START);
    let end = indices.nth(SLICE_LEN - 1);

    match (start, end) {
        (Some(start), Some(end)) => Ok(&tag[start..end]),
        _ => Err(UpdateError::TagTooShort {
            tag: tag.to_string(),
            needed: SLICE_START + SLICE_LEN,
        }),
    }
}

/// Parses `2` to `4` dot separated numeric components. A missing patch is 0 and
/// a fourth component is accepted but ignored.
fn parse_dotted(tag: &str, text: &str) -> Result<Version, UpdateError> {
    let invalid = |reason: &str| UpdateError::InvalidVersion {
        tag: tag.to_string(),
        reason: reason.to_string(),
    };

    let parts = text.split('.').collect::<Vec<_>>();
    if !(2..=4).contains(&parts.len()) {
        return Err(invalid("expected 2 to 4 components"));
    }

    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(&format!("`{part}` is not a number")));
        }
        *slot = part.parse().map_err(|e: std::num::ParseIntError| invalid(&e.to_string()))?;
    }

    if let Some(extra) = parts.get(3) {
        if extra.is_empty() || !extra.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(&format!("`{extra}` is not a number")));
        }
    }

    Ok(Version::new(numbers[0], numbers[1], numbers[2]))
}

/// Parses a tag such as `v1.2.3`, `1.2`, `V2.0.0-rc.1` or `v1.0.0+build.5`.
pub fn parse_tolerant(tag: &str) -> Result<Version, UpdateError> {
    let trimmed = tag.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    // pre-release and build metadata never affect whether an update exists
    let core = trimmed.split(['-', '+']).next().unwrap_or_default();

    let mut parts = core.split('.').collect::<Vec<_>>();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(UpdateError::InvalidVersion {
            tag: tag.to_string(),
            reason: format!("`{core}` is not a version"),
        });
    }
    parts.resize(3, "0");

    semver::Version::parse(&parts.join("."))
        .map(Version::from)
        .map_err(|e| UpdateError::InvalidVersion {
            tag: tag.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_versions_are_never_updates() {
        for v in [Version::new(0, 0, 0), Version::new(0, 3, 1), Version::new(2, 5, 0)] {
            assert!(!ComparePolicy::Componentwise.is_update(v, v));
            assert!(!ComparePolicy::Semantic.is_update(v, v));
        }
    }

    #[test]
    fn componentwise_major_bump_is_update() {
        let current = Version::new(2, 5, 0);
        assert!(ComparePolicy::Componentwise.is_update(Version::new(3, 0, 0), current));
        assert!(ComparePolicy::Semantic.is_update(Version::new(3, 0, 0), current));
    }

    #[test]
    fn componentwise_treats_older_release_with_larger_components_as_update() {
        let current = Version::new(2, 5, 0);

        // minor and patch both exceed the current ones
        assert!(ComparePolicy::Componentwise.is_update(Version::new(1, 9, 9), current));
        assert!(!ComparePolicy::Semantic.is_update(Version::new(1, 9, 9), current));

        // only the patch exceeds
        assert!(ComparePolicy::Componentwise.is_update(Version::new(2, 4, 9), current));
        assert!(!ComparePolicy::Semantic.is_update(Version::new(2, 4, 9), current));
    }

    #[test]
    fn componentwise_up_to_date_when_no_component_exceeds() {
        let current = Version::new(2, 5, 3);
        assert!(!ComparePolicy::Componentwise.is_update(Version::new(1, 4, 2), current));
        assert!(!ComparePolicy::Componentwise.is_update(Version::new(2, 5, 3), current));
    }

    #[test]
    fn fixed_slice_takes_five_chars_after_marker() {
        assert_eq!(fixed_slice("v0.3.1").unwrap(), "0.3.1");
        assert_eq!(fixed_slice("v1.23.4").unwrap(), "1.23.");
        assert_eq!(fixed_slice("v10.2.13-beta").unwrap(), "10.2.");
    }

    #[test]
    fn fixed_slice_rejects_short_tags() {
        for tag in ["", "v", "v0.3", "v0.31"] {
            assert!(matches!(fixed_slice(tag), Err(UpdateError::TagTooShort { .. })), "{tag}");
        }
    }

    #[test]
    fn fixed_slice_counts_chars_not_bytes() {
        assert_eq!(fixed_slice("ü0.3.1").unwrap(), "0.3.1");
    }

    #[test]
    fn fixed_slice_parse() {
        let parsed = TagFormat::FixedSlice.parse("v0.3.1").unwrap();
        assert_eq!(parsed.version, Version::new(0, 3, 1));
        assert_eq!(parsed.display, "v0.3.1");

        // a trailing separator leaves an empty component
        assert!(matches!(
            TagFormat::FixedSlice.parse("v1.23.4"),
            Err(UpdateError::InvalidVersion { .. })
        ));

        assert_eq!(TagFormat::FixedSlice.parse("v12.34").unwrap().version, Version::new(12, 34, 0));
        assert!(TagFormat::FixedSlice.parse("vab.cd").is_err());
    }

    #[test]
    fn tolerant_parse() {
        assert_eq!(parse_tolerant("v1.23.4").unwrap(), Version::new(1, 23, 4));
        assert_eq!(parse_tolerant("V0.3").unwrap(), Version::new(0, 3, 0));
        assert_eq!(parse_tolerant("2").unwrap(), Version::new(2, 0, 0));
        assert_eq!(parse_tolerant("v2.0.0-rc.1").unwrap(), Version::new(2, 0, 0));
        assert_eq!(parse_tolerant("1.0.0+build.5").unwrap(), Version::new(1, 0, 0));
        assert_eq!(TagFormat::Tolerant.parse("v1.23.4").unwrap().display, "v1.23.4");
    }

    #[test]
    fn tolerant_parse_errors() {
        for tag in ["", "v", "latest", "v1..2", "v1.2.3.4", "v1.x.0", "v01.2.3"] {
            assert!(
                matches!(parse_tolerant(tag), Err(UpdateError::InvalidVersion { .. })),
                "{tag}"
            );
        }
    }
}
