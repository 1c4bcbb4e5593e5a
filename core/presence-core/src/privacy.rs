//! Privacy redaction decisions.
//!
//! Pure functions of the current settings and a vault-relative path. Hidden
//! path patterns are literal: a pattern matches the identical path, or, when
//! it ends with a separator, every path below that folder. No globbing.

use crate::settings::Settings;

/// Decides what identifying text must be withheld from the payload.
#[derive(Debug, Clone, Copy)]
pub struct PrivacyFilter<'a> {
    settings: &'a Settings,
}

impl<'a> PrivacyFilter<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    pub fn should_hide_vault(&self) -> bool {
        self.settings.hide_vault_name
    }

    pub fn should_hide_file(&self, path: &str) -> bool {
        if self.settings.hide_note_name {
            return true;
        }
        self.settings.enable_path_hiding
            && self
                .settings
                .hidden_paths
                .iter()
                .any(|pattern| pattern_matches(pattern, path))
    }
}

/// Surrounding whitespace on a pattern is ignored.
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return false;
    }
    if pattern == path {
        return true;
    }
    is_folder_pattern(pattern) && path.starts_with(pattern)
}

fn is_folder_pattern(pattern: &str) -> bool {
    pattern.ends_with('/') || pattern.ends_with('\\')
}
