/// Configuration module for the game overlay.
///
/// This module provides functionality for managing application configuration,
/// including:
/// - The global shortcuts for overlay mode and the developer panel
/// - Overlay opacity and main window size
/// - Where the question-answering backend lives
/// - Persisting configuration to disk as JSON
///
/// The configuration is saved to and loaded from a `config.json` file in the
/// platform-specific application data directory
/// (%APPDATA%/GameOverlay/ on Windows).
///
/// # Example
///
/// ```no_run
/// use game_overlay::config::{load_config, save_config};
///
/// // Load existing config or get defaults
/// let mut config = load_config();
///
/// // Modify config
/// config.overlay_opacity = 0.9;
///
/// // Save changes
/// save_config(&config).expect("Failed to save config");
/// ```
use crate::controller::DEFAULT_OVERLAY_OPACITY;
use crate::hotkey::ShortcutCombo;
use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Application configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct OverlayConfig {
    /// Toggles overlay mode from anywhere
    pub toggle_shortcut: ShortcutCombo,
    /// Opens/closes the developer panel (None = no shortcut)
    pub dev_panel_shortcut: Option<ShortcutCombo>,
    /// Window opacity while in overlay mode, 0.0 - 1.0
    pub overlay_opacity: f32,
    pub window_width: u32,
    pub window_height: u32,
    /// Base URL of the question-answering service
    pub backend_url: String,
    pub backend_timeout_secs: u64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        OverlayConfig {
            toggle_shortcut: ShortcutCombo {
                ctrl: false,
                alt: false,
                shift: false,
                win: false,
                key: "F2".to_string(),
            },
            dev_panel_shortcut: Some(ShortcutCombo {
                ctrl: false,
                alt: false,
                shift: false,
                win: false,
                key: "F3".to_string(),
            }),
            overlay_opacity: DEFAULT_OVERLAY_OPACITY,
            window_width: 450,
            window_height: 700,
            backend_url: "http://localhost:8000".to_string(),
            backend_timeout_secs: 30,
        }
    }
}

impl OverlayConfig {
    /// Clamp values that would make the window unusable
    pub fn sanitized(mut self) -> Self {
        if !self.overlay_opacity.is_finite() {
            self.overlay_opacity = DEFAULT_OVERLAY_OPACITY;
        }
        self.overlay_opacity = self.overlay_opacity.clamp(0.0, 1.0);
        self.window_width = self.window_width.max(200);
        self.window_height = self.window_height.max(200);
        self
    }
}

/// Get the application's data directory
/// Returns %APPDATA%/GameOverlay/ on Windows
/// Creates directory if it doesn't exist
pub fn get_data_directory() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "GameOverlay")
        .ok_or_else(|| anyhow!("Failed to determine user data directory"))?;

    let data_dir = project_dirs.data_dir();

    fs::create_dir_all(data_dir)
        .map_err(|e| anyhow!("Failed to create data directory: {}", e))?;

    Ok(data_dir.to_path_buf())
}

/// Path of config.json in the data directory
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_data_directory()?.join("config.json"))
}

/// Load application configuration from config.json
/// Returns default config if file doesn't exist or on error
pub fn load_config() -> OverlayConfig {
    match default_config_path() {
        Ok(path) => load_config_from(&path),
        Err(e) => {
            warn!("Using default configuration: {}", e);
            OverlayConfig::default()
        }
    }
}

/// Load configuration from `path`, falling back to defaults
pub fn load_config_from(path: &Path) -> OverlayConfig {
    if !path.exists() {
        return OverlayConfig::default();
    }

    let Ok(contents) = fs::read_to_string(path) else {
        warn!("Could not read {}, using defaults", path.display());
        return OverlayConfig::default();
    };

    match serde_json::from_str::<OverlayConfig>(&contents) {
        Ok(config) => config.sanitized(),
        Err(e) => {
            warn!("Invalid config {}: {}, using defaults", path.display(), e);
            OverlayConfig::default()
        }
    }
}

/// Save application configuration to config.json
pub fn save_config(config: &OverlayConfig) -> Result<()> {
    save_config_to(&default_config_path()?, config)
}

pub fn save_config_to(path: &Path, config: &OverlayConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

    fs::write(path, json).map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OverlayConfig::default();
        assert_eq!(config.toggle_shortcut.to_string(), "F2");
        assert_eq!(config.dev_panel_shortcut.unwrap().to_string(), "F3");
        assert_eq!(config.overlay_opacity, 0.8);
        assert_eq!(config.backend_url, "http://localhost:8000");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config.json"));
        assert_eq!(config, OverlayConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = OverlayConfig::default();
        config.toggle_shortcut = "Ctrl+Shift+O".parse().unwrap();
        config.dev_panel_shortcut = None;
        save_config_to(&path, &config).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"Ctrl+Shift+O\""));
        assert_eq!(load_config_from(&path), config);
    }

    #[test]
    fn test_partial_file_and_clamping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "overlay_opacity": 3.5, "window_width": 10 }"#).unwrap();

        let config = load_config_from(&path);
        assert_eq!(config.overlay_opacity, 1.0);
        assert_eq!(config.window_width, 200);
        assert_eq!(config.toggle_shortcut.to_string(), "F2");
    }

    #[test]
    fn test_invalid_shortcut_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "toggle_shortcut": "Ctrl+Banana" }"#).unwrap();

        assert_eq!(load_config_from(&path), OverlayConfig::default());
    }
}
