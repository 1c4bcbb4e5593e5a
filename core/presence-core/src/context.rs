//! Editor state the synthesizer reads from.
//!
//! The context is replaced piecemeal as host events arrive: opening a file
//! resets the per-file clock, renames keep it, and the session clock is fixed
//! at construction.

use crate::error::ModeDetectionError;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// A vault-relative note path, `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFile {
    path: String,
}

impl NoteFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment, including any extension.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// File name without its extension.
    pub fn basename(&self) -> &str {
        match self.split_name() {
            Some((stem, _)) => stem,
            None => self.name(),
        }
    }

    /// Extension without the dot; empty when there is none.
    pub fn extension(&self) -> &str {
        match self.split_name() {
            Some((_, ext)) => ext,
            None => "",
        }
    }

    /// Name of the immediate parent folder, or `None` at the vault root.
    pub fn folder_name(&self) -> Option<&str> {
        let (parent, _) = self.path.rsplit_once('/')?;
        parent.rsplit('/').next().filter(|name| !name.is_empty())
    }

    fn split_name(&self) -> Option<(&str, &str)> {
        let name = self.name();
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Some((stem, ext)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EditorContext {
    file: Option<NoteFile>,
    vault_name: String,
    file_started_at: DateTime<Utc>,
    session_started_at: DateTime<Utc>,
}

impl EditorContext {
    pub fn new(vault_name: impl Into<String>, session_started_at: DateTime<Utc>) -> Self {
        Self {
            file: None,
            vault_name: vault_name.into(),
            file_started_at: session_started_at,
            session_started_at,
        }
    }

    pub fn file(&self) -> Option<&NoteFile> {
        self.file.as_ref()
    }

    pub fn vault_name(&self) -> &str {
        &self.vault_name
    }

    pub fn file_started_at(&self) -> DateTime<Utc> {
        self.file_started_at
    }

    pub fn session_started_at(&self) -> DateTime<Utc> {
        self.session_started_at
    }

    /// Switches the active file and restarts the per-file clock.
    pub fn open_file(&mut self, file: Option<NoteFile>, now: DateTime<Utc>) {
        self.file = file;
        self.file_started_at = now;
    }

    /// Follows a rename of the active file. Returns `true` when the active
    /// file was affected; the per-file clock is left untouched.
    pub fn rename(&mut self, old_path: &str, file: NoteFile) -> bool {
        let affected = match &self.file {
            Some(current) => current.path() == old_path || current.path() == file.path(),
            None => false,
        };
        if affected {
            self.file = Some(file);
        }
        affected
    }
}

/// Host capability answering "is the active view in reading mode?".
pub trait ViewModeProbe: Send + Sync {
    fn is_in_preview_mode(&self) -> Result<bool, ModeDetectionError>;
}

/// Always reports the same mode.
#[derive(Debug, Clone, Copy)]
pub struct FixedViewMode(pub bool);

impl ViewModeProbe for FixedViewMode {
    fn is_in_preview_mode(&self) -> Result<bool, ModeDetectionError> {
        Ok(self.0)
    }
}

/// Last mode reported by the host; unknown until the first report.
#[derive(Debug, Clone, Default)]
pub struct SharedViewMode {
    inner: Arc<Mutex<Option<bool>>>,
}

impl SharedViewMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, preview: Option<bool>) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = preview;
        }
    }
}

impl ViewModeProbe for SharedViewMode {
    fn is_in_preview_mode(&self) -> Result<bool, ModeDetectionError> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| ModeDetectionError("view mode lock poisoned".to_string()))?;
        guard.ok_or_else(|| ModeDetectionError("no active view reported".to_string()))
    }
}
