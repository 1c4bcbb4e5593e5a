//! User-facing presence settings.
//!
//! Persisted as camelCase JSON. Every field has a default so a partial file
//! written by an older version merges cleanly.

use serde::{Deserialize, Serialize};

pub const DEFAULT_DETAILS_TEMPLATE: &str = "%activity_type%: %active_note_name%";
pub const DEFAULT_STATE_TEMPLATE: &str = "Vault: %vault_name%";

/// Which timestamp feeds the elapsed-time display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeMode {
    /// Restart the clock whenever a different file is opened.
    #[default]
    PerFile,
    /// Count from process start.
    PerSession,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    // Display
    pub show_file_name: bool,
    pub show_vault_name: bool,
    pub time_mode: TimeMode,

    // Templates
    pub use_custom_template: bool,
    pub custom_details_template: String,
    pub custom_state_template: String,

    // Button
    pub enable_custom_button: bool,
    pub custom_button_label: String,
    pub custom_button_url: String,

    // Privacy
    pub hide_vault_name: bool,
    pub hide_note_name: bool,
    pub enable_path_hiding: bool,
    pub hidden_paths: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_file_name: true,
            show_vault_name: true,
            time_mode: TimeMode::PerFile,
            use_custom_template: false,
            custom_details_template: DEFAULT_DETAILS_TEMPLATE.to_string(),
            custom_state_template: DEFAULT_STATE_TEMPLATE.to_string(),
            enable_custom_button: false,
            custom_button_label: String::new(),
            custom_button_url: String::new(),
            hide_vault_name: false,
            hide_note_name: false,
            enable_path_hiding: false,
            hidden_paths: Vec::new(),
        }
    }
}

/// Owns the current settings snapshot.
///
/// Readers borrow through [`SettingsStore::current`]; the settings surface
/// pushes changes through [`SettingsStore::update`], so the next synthesis
/// sees them without a restart.
#[derive(Debug, Default)]
pub struct SettingsStore {
    current: Settings,
    revision: u64,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: settings,
            revision: 0,
        }
    }

    pub fn current(&self) -> &Settings {
        &self.current
    }

    /// Replaces the snapshot. Returns `false` when nothing changed.
    pub fn update(&mut self, settings: Settings) -> bool {
        if settings == self.current {
            return false;
        }
        self.current = settings;
        self.revision += 1;
        true
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
