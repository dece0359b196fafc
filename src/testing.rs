//! Fakes for the external collaborators, shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::launcher::Launcher;
use crate::update::{Asset, ReleaseInfo, ReleaseSource, RepoId, UpdateError};

pub fn release(tag: &str, assets: &[(&str, &str)]) -> ReleaseInfo {
    ReleaseInfo {
        tag: tag.to_string(),
        html_url: format!("https://github.com/MolotovCherry/virtual-display-rs/releases/tag/{tag}"),
        assets: assets
            .iter()
            .map(|(name, url)| Asset {
                name: name.to_string(),
                download_url: url.to_string(),
            })
            .collect(),
    }
}

/// Answers with queued results, one per call, and counts the calls.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<ReleaseInfo, UpdateError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(responses: impl IntoIterator<Item = Result<ReleaseInfo, UpdateError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReleaseSource for ScriptedSource {
    fn latest_release(&self, repo: &RepoId) -> Result<ReleaseInfo, UpdateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(UpdateError::NoReleases(repo.clone())))
    }
}

/// Remembers every URL it was asked to open.
#[derive(Default)]
pub struct RecordingLauncher {
    opened: Mutex<Vec<String>>,
}

impl RecordingLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl Launcher for RecordingLauncher {
    fn open_url(&self, url: &str) {
        self.opened.lock().unwrap().push(url.to_string());
    }
}
