//! The update check workflow behind the settings page's "updates" card.
//!
//! A check is only ever started by the user. Once it succeeds the result sticks
//! for the lifetime of the checker: "no update" turns further activations into
//! no-ops, "update found" turns them into a click-through to the release page.
//! Failures are not sticky, the next activation simply tries again.

use std::future::Future;
use std::sync::{Arc, Weak};

use tracing::{debug, info, warn};

use crate::launcher::Launcher;
use crate::update::version::{ComparePolicy, TagFormat, Version};
use crate::update::{ReleaseInfo, ReleaseSource, RepoId, UpdateError};

/// Where a checker is in its lifecycle.
#[derive(Debug, Clone, Default)]
pub enum CheckState {
    #[default]
    Unchecked,
    /// A fetch is in flight for as long as its [`FetchTicket`] is alive
    Checking(Weak<()>),
    NoUpdate,
    UpdateFound {
        release_url: String,
    },
}

impl CheckState {
    /// State after `outcome` was reported from this state.
    pub fn next(&self, outcome: &UpdateOutcome) -> CheckState {
        match outcome {
            UpdateOutcome::UpToDate { .. } => CheckState::NoUpdate,
            UpdateOutcome::UpdateAvailable(update) => CheckState::UpdateFound {
                release_url: update.release.html_url.clone(),
            },
            UpdateOutcome::CheckFailed(_) => CheckState::Unchecked,
            UpdateOutcome::OpenedRelease(_) | UpdateOutcome::AlreadyChecked => self.clone(),
        }
    }

    pub fn has_checked(&self) -> bool {
        matches!(self, CheckState::NoUpdate | CheckState::UpdateFound { .. })
    }

    pub fn click_to_release(&self) -> bool {
        matches!(self, CheckState::UpdateFound { .. })
    }

    fn in_flight(&self) -> bool {
        matches!(self, CheckState::Checking(ticket) if ticket.strong_count() > 0)
    }
}

impl PartialEq for CheckState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CheckState::Unchecked, CheckState::Unchecked) | (CheckState::NoUpdate, CheckState::NoUpdate) => true,
            (CheckState::Checking(a), CheckState::Checking(b)) => a.ptr_eq(b),
            (CheckState::UpdateFound { release_url: a }, CheckState::UpdateFound { release_url: b }) => a == b,
            _ => false,
        }
    }
}

impl Eq for CheckState {}

/// Proof that a fetch started by [`UpdateChecker::begin`] is still wanted.
///
/// The checker only remembers the ticket weakly. Dropping it, or the future or
/// message carrying it, abandons the check and lets the next activation fetch again.
#[derive(Debug)]
pub struct FetchTicket(Arc<()>);

/// Result of [`UpdateChecker::fetch`], to be handed to [`UpdateChecker::complete`].
#[derive(Debug)]
pub struct Fetched {
    _ticket: FetchTicket,
    pub result: Result<ReleaseInfo, UpdateError>,
}

/// A release that is newer than the running build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableUpdate {
    pub version: Version,
    /// Tag as shown to the user, e.g. `v0.3.1`
    pub display_tag: String,
    pub release: ReleaseInfo,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    UpToDate { latest: Version },
    UpdateAvailable(AvailableUpdate),
    CheckFailed(UpdateError),
    /// A previous check found an update, its release page was opened instead
    OpenedRelease(String),
    /// A previous check found nothing (or one is still running), nothing was done
    AlreadyChecked,
}

impl UpdateOutcome {
    /// Decides what a fetched release means for the running version.
    pub fn evaluate(
        result: Result<ReleaseInfo, UpdateError>,
        current: Version,
        tag_format: TagFormat,
        compare: ComparePolicy,
    ) -> UpdateOutcome {
        let release = match result {
            Ok(release) => release,
            Err(e) => return UpdateOutcome::CheckFailed(e),
        };

        let parsed = match tag_format.parse(&release.tag) {
            Ok(parsed) => parsed,
            Err(e) => return UpdateOutcome::CheckFailed(e),
        };

        if compare.is_update(parsed.version, current) {
            UpdateOutcome::UpdateAvailable(AvailableUpdate {
                version: parsed.version,
                display_tag: parsed.display,
                release,
            })
        } else {
            UpdateOutcome::UpToDate { latest: parsed.version }
        }
    }
}

/// What an activation of the update control should do right now.
#[derive(Debug)]
pub enum CheckStep {
    /// The release page was handed to the launcher
    OpenRelease(String),
    Skip,
    /// The caller should fetch (see [`UpdateChecker::fetch`]) and report back through [`UpdateChecker::complete`]
    Fetch(FetchTicket),
}

pub struct UpdateChecker {
    source: Arc<dyn ReleaseSource>,
    launcher: Arc<dyn Launcher>,
    repo: RepoId,
    current: Version,
    tag_format: TagFormat,
    compare: ComparePolicy,
    state: CheckState,
}

impl UpdateChecker {
    pub fn new(source: Arc<dyn ReleaseSource>, launcher: Arc<dyn Launcher>, current: Version) -> Self {
        Self {
            source,
            launcher,
            repo: RepoId::default(),
            current,
            tag_format: TagFormat::default(),
            compare: ComparePolicy::default(),
            state: CheckState::default(),
        }
    }

    pub fn with_tag_format(self, tag_format: TagFormat) -> Self {
        Self { tag_format, ..self }
    }

    pub fn with_compare(self, compare: ComparePolicy) -> Self {
        Self { compare, ..self }
    }

    pub fn state(&self) -> &CheckState {
        &self.state
    }

    /// First half of an activation. Never touches the network.
    pub fn begin(&mut self) -> CheckStep {
        match &self.state {
            CheckState::UpdateFound { release_url } => {
                self.launcher.open_url(release_url);
                CheckStep::OpenRelease(release_url.clone())
            }
            state if state.in_flight() || *state == CheckState::NoUpdate => {
                debug!(state = ?self.state, "update check already done, ignoring");
                CheckStep::Skip
            }
            state => {
                if matches!(state, CheckState::Checking(_)) {
                    debug!("previous update check was abandoned, starting over");
                }
                let ticket = FetchTicket(Arc::new(()));
                self.state = CheckState::Checking(Arc::downgrade(&ticket.0));
                CheckStep::Fetch(ticket)
            }
        }
    }

    /// A detached future that performs the blocking release lookup on tokio's blocking pool.
    ///
    /// The future holds `ticket`, so the check counts as in flight until it is dropped.
    pub fn fetch(&self, ticket: FetchTicket) -> impl Future<Output = Fetched> + Send + 'static {
        let source = self.source.clone();
        let repo = self.repo.clone();

        async move {
            info!(%repo, "checking for updates");
            let result = tokio::task::spawn_blocking(move || source.latest_release(&repo))
                .await
                .unwrap_or_else(|e| Err(UpdateError::Task(e.to_string())));
            Fetched { _ticket: ticket, result }
        }
    }

    /// Second half of an activation: applies the fetch result.
    pub fn complete(&mut self, fetched: Fetched) -> UpdateOutcome {
        let outcome = UpdateOutcome::evaluate(fetched.result, self.current, self.tag_format, self.compare);

        match &outcome {
            UpdateOutcome::UpdateAvailable(update) => {
                info!("update available: {} -> {}", self.current, update.display_tag)
            }
            UpdateOutcome::UpToDate { latest } => info!(%latest, current = %self.current, "already up-to-date"),
            UpdateOutcome::CheckFailed(e) => warn!("Failed to check for updates: {}", e),
            _ => {}
        }

        self.state = self.state.next(&outcome);
        outcome
    }

    pub async fn check_for_update(&mut self) -> UpdateOutcome {
        match self.begin() {
            CheckStep::OpenRelease(url) => UpdateOutcome::OpenedRelease(url),
            CheckStep::Skip => UpdateOutcome::AlreadyChecked,
            CheckStep::Fetch(ticket) => {
                let fetched = self.fetch(ticket).await;
                self.complete(fetched)
            }
        }
    }
}
