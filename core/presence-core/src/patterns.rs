//! Compiled regex patterns.
//!
//! Compiled once on first use and reused for every synthesis.

use once_cell::sync::Lazy;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// Template Placeholders
// ═══════════════════════════════════════════════════════════════════════════════

/// A `%name%` token from the template vocabulary. Only known names match, so an
/// unknown token never consumes the `%` a following placeholder needs.
pub static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"%(active_note_name|active_note_path|vault_name|folder_name|file_extension|workspace_name|activity_type)%",
    )
    .expect("placeholder pattern is valid")
});
