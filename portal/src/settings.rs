use std::path::{Path, PathBuf};
use std::time::Duration;

use portal_core::PlacementSearch;
use portal_router::{RouterConfig, DEFAULT_TIMEOUT};
use serde::Deserialize;

use crate::error::SettingsError;

/// Client settings, read from `<config dir>/portal/config.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub router: RouterSettings,
    #[serde(default)]
    pub placement: PlacementSettings,
    #[serde(default)]
    pub preview: PreviewSettings,
    #[serde(default)]
    pub teleport: TeleportSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    pub enabled: bool,
    pub timeout_ms: u64,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlacementSettings {
    pub max_rings: u32,
    /// Reject positions on the far side of a wall.
    pub collision: bool,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            max_rings: PlacementSearch::default().max_rings,
            collision: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    /// Fill color used when a portal sets none.
    pub color: String,
    pub texture: String,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            color: "#ff6400".to_string(),
            texture: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TeleportSettings {
    pub fade_ms: u64,
}

impl Default for TeleportSettings {
    fn default() -> Self {
        Self { fade_ms: 300 }
    }
}

impl Settings {
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            enabled: self.router.enabled,
            timeout: Duration::from_millis(self.router.timeout_ms),
        }
    }

    pub fn placement_search(&self) -> PlacementSearch {
        PlacementSearch::new(self.placement.max_rings)
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.teleport.fade_ms)
    }
}

pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("portal").join("config.toml"))
}

/// Loads settings from the default location, falling back to defaults when
/// the file is missing or malformed.
pub fn load_settings() -> Settings {
    let Some(path) = settings_path() else {
        return Settings::default();
    };

    match load_settings_from(&path) {
        Ok(settings) => settings,
        Err(SettingsError::Io(_)) => Settings::default(),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "ignoring unreadable settings");
            Settings::default()
        }
    }
}

pub fn load_settings_from(path: &Path) -> Result<Settings, SettingsError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}
