//! Configuration loading and saving utilities.
//!
//! Handles paths and persistence for:
//! - Presence settings (`settings.json`)
//! - The application identifier sent during the handshake

use crate::error::{PresenceError, Result};
use crate::settings::Settings;
use fs_err as fs;
use std::env;
use std::path::{Path, PathBuf};

pub const SETTINGS_ENV: &str = "VAULT_PRESENCE_SETTINGS";
pub const CLIENT_ID_ENV: &str = "VAULT_PRESENCE_CLIENT_ID";
pub const DEFAULT_CLIENT_ID: &str = "1108483488434446347";

const DATA_DIR_NAME: &str = ".vault-presence";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Returns the data directory (~/.vault-presence).
pub fn get_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(DATA_DIR_NAME))
}

/// Returns the settings path, honoring the env override.
pub fn get_settings_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(SETTINGS_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    get_data_dir()
        .map(|d| d.join(SETTINGS_FILE_NAME))
        .ok_or(PresenceError::HomeDirNotFound)
}

/// Application identifier for the handshake. Blank values fall back to the default.
pub fn application_id() -> String {
    env::var(CLIENT_ID_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string())
}

/// Loads settings, returning defaults if the file doesn't exist.
///
/// A file that exists but cannot be parsed is an error so the caller can log
/// it before deciding to fall back.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Settings::default())
        }
        Err(err) => {
            return Err(PresenceError::Io {
                context: format!("reading {}", path.display()),
                source: err,
            })
        }
    };

    if content.trim().is_empty() {
        return Ok(Settings::default());
    }

    serde_json::from_str(&content).map_err(|err| PresenceError::SettingsMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

/// Like [`load_settings`], but logs and falls back to defaults on error.
pub fn load_settings_or_default(path: &Path) -> Settings {
    load_settings(path).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Failed to load settings; using defaults");
        Settings::default()
    })
}

/// Saves settings to disk atomically (temp file then rename).
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    let write_failed = |source: std::io::Error| PresenceError::SettingsWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_failed)?;
    }

    let payload = serde_json::to_vec_pretty(settings).map_err(|err| PresenceError::Json {
        context: "serializing settings".to_string(),
        source: err,
    })?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, payload).map_err(write_failed)?;
    fs::rename(&tmp_path, path).map_err(write_failed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TimeMode;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            load_settings(&path),
            Err(PresenceError::SettingsMalformed { .. })
        ));
        assert_eq!(load_settings_or_default(&path), Settings::default());
    }

    #[test]
    fn save_then_load_preserves_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            time_mode: TimeMode::PerSession,
            hidden_paths: vec!["Private/".to_string()],
            enable_path_hiding: true,
            ..Settings::default()
        };

        save_settings(&path, &settings).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(load_settings(&path).unwrap(), settings);
    }
}
