//! On-demand update checking against the project's GitHub releases

pub mod checker;
pub mod release;
pub mod version;

pub use checker::{AvailableUpdate, CheckState, CheckStep, FetchTicket, Fetched, UpdateChecker, UpdateOutcome};
pub use release::{Asset, GithubReleaseSource, ReleaseInfo, ReleaseSource};
pub use version::{ComparePolicy, TagFormat, Version};

pub const REPO_OWNER: &str = "MolotovCherry";
pub const REPO_NAME: &str = "virtual-display-rs";

/// Owner/name pair identifying a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl Default for RepoId {
    fn default() -> Self {
        Self::new(REPO_OWNER, REPO_NAME)
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Everything that can go wrong while checking for an update.
///
/// The settings page shows the same message for all of these, the variants
/// only exist for logging and tests.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("request failed: {0}")]
    Http(#[from] Box<ureq::Error>),
    #[error("no published release found for {0}")]
    NoReleases(RepoId),
    #[error("malformed release response: {0}")]
    Decode(#[from] std::io::Error),
    #[error("release tag `{tag}` is shorter than {needed} characters")]
    TagTooShort { tag: String, needed: usize },
    #[error("release tag `{tag}` is not a valid version: {reason}")]
    InvalidVersion { tag: String, reason: String },
    #[error("release check task failed: {0}")]
    Task(String),
}
