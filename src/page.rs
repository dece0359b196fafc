//! View-model of the settings page.
//!
//! The page owns everything the settings view displays: the theme and material
//! selectors, the about line and the update card. A UI layer feeds it
//! [`PageMessage`]s and renders its state; handlers that need to wait on
//! something hand back a [`Task`] that resolves to the next message.

use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, error, info};

use crate::build_info::BuildVersionInfo;
use crate::launcher::Launcher;
use crate::settings::{MaterialMode, SettingsStore, ThemeMode};
use crate::update::{CheckStep, FetchTicket, Fetched, UpdateChecker, UpdateOutcome};

pub const CHECK_FOR_UPDATES: &str = "Check for updates";
pub const NO_UPDATE_AVAILABLE: &str = "No update is available";
pub const CHECK_FAILED: &str = "Failed to retrieve latest version information";

/// Follow-up work produced by a handler. Resolves to `None` when there is nothing left to do.
pub type Task = BoxFuture<'static, Option<PageMessage>>;

/// External pages linked from the settings page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Link {
    Donate,
    Homepage,
    #[value(name = "issues")]
    BugReport,
}

impl Link {
    pub fn url(self) -> &'static str {
        match self {
            Link::Donate => "https://github.com/sponsors/MolotovCherry",
            Link::Homepage => "https://github.com/MolotovCherry/virtual-display-rs/",
            Link::BugReport => "https://github.com/MolotovCherry/virtual-display-rs/issues/new/choose",
        }
    }
}

/// Which window backdrops the host can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackdropSupport {
    pub mica: bool,
    pub acrylic: bool,
}

impl Default for BackdropSupport {
    fn default() -> Self {
        Self { mica: true, acrylic: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorOption {
    pub label: &'static str,
    pub tag: &'static str,
    pub enabled: bool,
}

impl SelectorOption {
    fn new(label: &'static str, tag: &'static str) -> Self {
        Self {
            label,
            tag,
            enabled: true,
        }
    }
}

/// A combo box: fixed options and the index currently shown as selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub options: Vec<SelectorOption>,
    pub selected: usize,
}

impl Selector {
    pub fn selected_option(&self) -> Option<&SelectorOption> {
        self.options.get(self.selected)
    }
}

/// An entry of the download menu shown once an update is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub text: String,
    pub url: String,
}

/// The "updates" card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCard {
    pub header: String,
    /// Detail-disclosure arrow, shown when clicking the card leads to the release page
    pub action_icon_visible: bool,
    pub download_button_visible: bool,
    pub download_menu: Vec<MenuEntry>,
}

impl Default for UpdateCard {
    fn default() -> Self {
        Self {
            header: CHECK_FOR_UPDATES.to_string(),
            action_icon_visible: false,
            download_button_visible: false,
            download_menu: Vec::new(),
        }
    }
}

impl UpdateCard {
    fn apply(&mut self, outcome: &UpdateOutcome) {
        match outcome {
            UpdateOutcome::UpdateAvailable(update) => {
                self.header = format!("Update is available: {}", update.display_tag);
                self.download_menu = update
                    .release
                    .assets
                    .iter()
                    .map(|asset| MenuEntry {
                        text: asset.name.clone(),
                        url: asset.download_url.clone(),
                    })
                    .collect();
                self.download_button_visible = true;
                self.action_icon_visible = true;
            }
            UpdateOutcome::UpToDate { .. } => self.header = NO_UPDATE_AVAILABLE.to_string(),
            UpdateOutcome::CheckFailed(_) => self.header = CHECK_FAILED.to_string(),
            UpdateOutcome::OpenedRelease(_) | UpdateOutcome::AlreadyChecked => {}
        }
    }
}

#[derive(Debug)]
pub enum PageMessage {
    ThemeSelected(usize),
    MaterialSelected(usize),
    OpenLink(Link),
    UpdateClicked,
    UpdateFetched(Fetched),
    /// An entry of the download menu was clicked
    AssetActivated(usize),
}

pub struct SettingsPage<S: SettingsStore> {
    store: S,
    checker: UpdateChecker,
    launcher: Arc<dyn Launcher>,
    build: BuildVersionInfo,
    theme: Selector,
    material: Selector,
    update_card: UpdateCard,
    /// Handed out weakly to running tasks so they can tell the page is gone
    alive: Arc<()>,
}

impl<S: SettingsStore> SettingsPage<S> {
    pub fn new(
        store: S,
        checker: UpdateChecker,
        launcher: Arc<dyn Launcher>,
        build: BuildVersionInfo,
        backdrop: BackdropSupport,
    ) -> Self {
        let theme = load_theme(store.theme());
        let material = load_material(store.material(), backdrop);

        Self {
            store,
            checker,
            launcher,
            build,
            theme,
            material,
            update_card: UpdateCard::default(),
            alive: Arc::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn theme_selector(&self) -> &Selector {
        &self.theme
    }

    pub fn material_selector(&self) -> &Selector {
        &self.material
    }

    pub fn update_card(&self) -> &UpdateCard {
        &self.update_card
    }

    pub fn checker(&self) -> &UpdateChecker {
        &self.checker
    }

    pub fn app_info(&self) -> String {
        self.build.app_info()
    }

    /// Handles one message, returning follow-up work if there is any.
    pub fn update(&mut self, message: PageMessage) -> Option<Task> {
        match message {
            PageMessage::ThemeSelected(index) => {
                if let Some(tag) = select(&mut self.theme, index) {
                    let theme = ThemeMode::from_tag(tag);
                    info!(?theme, "theme changed");
                    if let Err(e) = self.store.set_theme(theme) {
                        error!("Failed to save theme: {}", e);
                    }
                }
                None
            }

            PageMessage::MaterialSelected(index) => {
                if let Some(tag) = select(&mut self.material, index) {
                    let material = MaterialMode::from_tag(tag);
                    info!(?material, "material changed");
                    if let Err(e) = self.store.set_material(material) {
                        error!("Failed to save material: {}", e);
                    }
                }
                None
            }

            PageMessage::OpenLink(link) => {
                self.launcher.open_url(link.url());
                None
            }

            PageMessage::UpdateClicked => match self.checker.begin() {
                CheckStep::OpenRelease(_) | CheckStep::Skip => None,
                CheckStep::Fetch(ticket) => Some(self.fetch_task(ticket)),
            },

            PageMessage::UpdateFetched(fetched) => {
                let outcome = self.checker.complete(fetched);
                self.update_card.apply(&outcome);
                None
            }

            PageMessage::AssetActivated(index) => {
                match self.update_card.download_menu.get(index) {
                    Some(entry) => self.launcher.open_url(&entry.url),
                    None => debug!(index, "no download entry at index"),
                }
                None
            }
        }
    }

    /// Runs `message` and every follow-up task to completion.
    pub async fn dispatch(&mut self, message: PageMessage) {
        let mut next = Some(message);
        while let Some(message) = next.take() {
            if let Some(task) = self.update(message) {
                next = task.await;
            }
        }
    }

    fn fetch_task(&self, ticket: FetchTicket) -> Task {
        let fetch = self.checker.fetch(ticket);
        let alive: Weak<()> = Arc::downgrade(&self.alive);

        async move {
            let fetched = fetch.await;
            if alive.upgrade().is_none() {
                debug!("settings page closed before the update check finished, dropping result");
                return None;
            }
            Some(PageMessage::UpdateFetched(fetched))
        }
        .boxed()
    }
}

/// Marks `index` as selected and returns its tag, ignoring disabled options.
fn select(selector: &mut Selector, index: usize) -> Option<&'static str> {
    let option = selector.options.get(index)?;
    if !option.enabled {
        return None;
    }
    selector.selected = index;
    Some(option.tag)
}

fn load_theme(theme: ThemeMode) -> Selector {
    let selected = match theme {
        ThemeMode::Light => 0,
        ThemeMode::Dark => 1,
        ThemeMode::SystemDefault => 2,
    };

    Selector {
        options: vec![
            SelectorOption::new("Light", ThemeMode::Light.tag()),
            SelectorOption::new("Dark", ThemeMode::Dark.tag()),
            SelectorOption::new("Use system setting", ThemeMode::SystemDefault.tag()),
        ],
        selected,
    }
}

fn load_material(material: MaterialMode, backdrop: BackdropSupport) -> Selector {
    let mut options = vec![
        SelectorOption::new("Mica", MaterialMode::Mica.tag()),
        SelectorOption::new("Acrylic", MaterialMode::Acrylic.tag()),
        SelectorOption::new("None", MaterialMode::None.tag()),
    ];
    options[0].enabled = backdrop.mica;
    options[1].enabled = backdrop.acrylic;

    let selected = match material {
        MaterialMode::Mica if backdrop.mica => 0,
        MaterialMode::Acrylic if backdrop.acrylic => 1,
        _ => 2,
    };

    Selector { options, selected }
}
