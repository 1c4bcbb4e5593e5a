//! Placeholder substitution for user-authored templates.
//!
//! Substitution is a single left-to-right pass: text produced by one
//! placeholder is never rescanned, so a note called `%vault_name%.md` renders
//! literally. Unknown placeholders are left untouched.

use crate::context::NoteFile;
use crate::patterns::RE_PLACEHOLDER;
use regex::Captures;

pub const UNKNOWN: &str = "Unknown";
pub const ROOT_FOLDER: &str = "Root";
pub const ACTIVITY_READING: &str = "Reading";
pub const ACTIVITY_EDITING: &str = "Editing";

/// Everything a template may refer to.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub file: Option<&'a NoteFile>,
    pub vault_name: &'a str,
    pub is_reading: bool,
}

impl TemplateContext<'_> {
    pub fn activity_type(&self) -> &'static str {
        activity_type(self.is_reading)
    }

    fn resolve(&self, name: &str) -> Option<&str> {
        let value = match name {
            "active_note_name" => self.file.map_or(UNKNOWN, NoteFile::basename),
            "active_note_path" => self.file.map_or("", NoteFile::path),
            "vault_name" | "workspace_name" => self.vault_name,
            "folder_name" => match self.file {
                Some(file) => file.folder_name().unwrap_or(ROOT_FOLDER),
                None => UNKNOWN,
            },
            "file_extension" => self.file.map_or("", NoteFile::extension),
            "activity_type" => self.activity_type(),
            _ => return None,
        };
        Some(value)
    }
}

pub fn activity_type(is_reading: bool) -> &'static str {
    if is_reading {
        ACTIVITY_READING
    } else {
        ACTIVITY_EDITING
    }
}

pub fn render(template: &str, context: &TemplateContext<'_>) -> String {
    if template.is_empty() {
        return String::new();
    }

    RE_PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            context.resolve(&caps[1]).unwrap_or(&caps[0]).to_string()
        })
        .into_owned()
}
