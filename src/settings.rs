//! Application preferences for impairment-sim
//!
//! Preferences are stored as XML in the user's config directory
//! (`<config>/ImpairmentSim/preferences.xml`). Loading never fails: a
//! missing or unreadable file yields the defaults.

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Errors saving or loading preferences
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::DeError),
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),
    #[error("Could not find config directory")]
    NoConfigDir,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Persisted user preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "ImpairmentPreferences")]
pub struct AppPreferences {
    /// Effect source file used when none is given on the command line
    #[serde(rename = "effectSource", default, skip_serializing_if = "Option::is_none")]
    pub effect_source: Option<String>,

    /// Last configuration document imported or exported
    #[serde(rename = "lastConfig", default, skip_serializing_if = "Option::is_none")]
    pub last_config: Option<String>,

    /// Re-parse effect sources when they change on disk
    #[serde(rename = "hotReload", default)]
    pub hot_reload: bool,

    /// Default log filter when no environment override is set
    #[serde(rename = "logLevel", default = "default_log_level")]
    pub log_level: String,

    #[serde(rename = "logToFile", default)]
    pub log_to_file: bool,

    #[serde(rename = "logFile", default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,

    #[serde(rename = "logJson", default)]
    pub log_json: bool,
}

impl Default for AppPreferences {
    fn default() -> Self {
        Self {
            effect_source: None,
            last_config: None,
            hot_reload: false,
            log_level: default_log_level(),
            log_to_file: false,
            log_file: None,
            log_json: false,
        }
    }
}

impl AppPreferences {
    /// Get the preferences file path
    fn get_prefs_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("ImpairmentSim");
            p.push("preferences.xml");
            p
        })
    }

    /// Load preferences from config directory
    pub fn load() -> Self {
        match Self::get_prefs_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load preferences from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => from_str(&contents).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable preferences {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save preferences to config directory
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::get_prefs_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// Save preferences to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let xml = to_string(self)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);
        fs::write(path, formatted)?;
        Ok(())
    }

    /// Set the last configuration document and save
    pub fn set_last_config(&mut self, path: &Path) {
        self.last_config = Some(path.to_string_lossy().to_string());
        if let Err(e) = self.save() {
            log::warn!("Failed to save preferences: {:?}", e);
        }
    }

    /// Get the effect source path if it exists
    pub fn get_effect_source(&self) -> Option<PathBuf> {
        self.effect_source.as_ref().map(PathBuf::from).filter(|p| p.exists())
    }
}
