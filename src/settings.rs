//! User preferences and where they are persisted.
//!
//! Settings live as pretty-printed JSON in the user's local config folder.
//! Unknown or missing keys fall back to their defaults so older files keep loading.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::update::{ComparePolicy, TagFormat};

pub const APP_DIR_NAME: &str = "virtual-display-driver-control";

/// Application color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
pub enum ThemeMode {
    Light,
    Dark,
    /// Follow the OS
    #[default]
    #[value(name = "system")]
    SystemDefault,
}

impl ThemeMode {
    /// Maps a selector tag to a theme. Anything unrecognised follows the OS.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "Light" => ThemeMode::Light,
            "Dark" => ThemeMode::Dark,
            _ => ThemeMode::SystemDefault,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            ThemeMode::Light => "Light",
            ThemeMode::Dark => "Dark",
            ThemeMode::SystemDefault => "Default",
        }
    }
}

/// Window backdrop material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
pub enum MaterialMode {
    #[default]
    Mica,
    Acrylic,
    None,
}

impl MaterialMode {
    /// Maps a selector tag to a material. Anything unrecognised means no backdrop.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "Mica" => MaterialMode::Mica,
            "Acrylic" => MaterialMode::Acrylic,
            _ => MaterialMode::None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            MaterialMode::Mica => "Mica",
            MaterialMode::Acrylic => "Acrylic",
            MaterialMode::None => "None",
        }
    }
}

/// How update checks are performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatePreferences {
    pub tag_format: TagFormat,
    pub compare: ComparePolicy,
    /// Base URL of the GitHub REST API
    pub api_base: String,
    /// Request timeout in seconds, unset keeps the transport default
    pub timeout_secs: Option<u64>,
}

impl Default for UpdatePreferences {
    fn default() -> Self {
        Self {
            tag_format: TagFormat::default(),
            compare: ComparePolicy::default(),
            api_base: crate::update::release::GITHUB_API.to_string(),
            timeout_secs: None,
        }
    }
}

/// User-configurable application settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: ThemeMode,
    pub material: MaterialMode,
    pub update: UpdatePreferences,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file is not valid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not determine the user's config directory")]
    NoConfigDir,
}

/// Persisted theme and material accessors.
pub trait SettingsStore {
    fn theme(&self) -> ThemeMode;
    fn set_theme(&mut self, theme: ThemeMode) -> Result<(), SettingsError>;
    fn material(&self) -> MaterialMode;
    fn set_material(&mut self, material: MaterialMode) -> Result<(), SettingsError>;
}

/// Plain in-memory settings, nothing is written anywhere.
impl SettingsStore for Settings {
    fn theme(&self) -> ThemeMode {
        self.theme
    }

    fn set_theme(&mut self, theme: ThemeMode) -> Result<(), SettingsError> {
        self.theme = theme;
        Ok(())
    }

    fn material(&self) -> MaterialMode {
        self.material
    }

    fn set_material(&mut self, material: MaterialMode) -> Result<(), SettingsError> {
        self.material = material;
        Ok(())
    }
}

/// Returns the settings file path within the user's local config directory.
pub fn default_settings_path() -> Result<PathBuf, SettingsError> {
    let dirs = directories::BaseDirs::new().ok_or(SettingsError::NoConfigDir)?;
    Ok(dirs.config_local_dir().join(APP_DIR_NAME).join("settings.json"))
}

/// Counter for generating unique temp file names within this process.
static SAVE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Settings backed by a JSON file, written through on every change.
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl JsonSettingsStore {
    /// Loads settings from `path`. A missing or unreadable settings file yields the defaults.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();

        let settings = match std::fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => settings,
                Err(e) => {
                    error!("Failed to parse settings file {}: {}", path.display(), e);
                    Settings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Settings::default()
            }
            Err(source) => return Err(SettingsError::Io { path, source }),
        };

        Ok(Self { path, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Persists the current settings to disk.
    ///
    /// The JSON is written to a uniquely named temporary file first and then
    /// renamed over the real one, so a crash mid-write never leaves a truncated file.
    pub fn save(&self) -> Result<(), SettingsError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| SettingsError::Io { path, source }
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let json = serde_json::to_string_pretty(&self.settings)?;

        let unique_id = SAVE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = self
            .path
            .with_extension(format!("json.{}.{}.tmp", std::process::id(), unique_id));

        std::fs::write(&temp_path, json).map_err(io_err(&temp_path))?;

        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(io_err(&self.path)(e));
        }

        info!(path = %self.path.display(), "saved settings");
        Ok(())
    }

    fn modify(&mut self, f: impl FnOnce(&mut Settings)) -> Result<(), SettingsError> {
        f(&mut self.settings);
        self.save()
    }
}

impl SettingsStore for JsonSettingsStore {
    fn theme(&self) -> ThemeMode {
        self.settings.theme
    }

    fn set_theme(&mut self, theme: ThemeMode) -> Result<(), SettingsError> {
        self.modify(|s| s.theme = theme)
    }

    fn material(&self) -> MaterialMode {
        self.settings.material
    }

    fn set_material(&mut self, material: MaterialMode) -> Result<(), SettingsError> {
        self.modify(|s| s.material = material)
    }
}
