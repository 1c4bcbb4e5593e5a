//! Builds one activity payload from editor state and settings.
//!
//! Evaluated from scratch on every call. The only input that can fail is the
//! view-mode probe, and that failure degrades to edit mode.

use crate::context::{EditorContext, ViewModeProbe};
use crate::privacy::PrivacyFilter;
use crate::settings::{Settings, TimeMode};
use crate::template::{activity_type, render, TemplateContext};
use vault_presence_protocol::{ActivityButton, ActivityPayload};

pub const LARGE_IMAGE_KEY: &str = "vault_logo";
pub const LARGE_IMAGE_TEXT: &str = "Vault";
pub const SMALL_IMAGE_KEY: &str = "note";
pub const SMALL_IMAGE_TEXT: &str = "Taking notes";
pub const DEFAULT_BUTTON_LABEL: &str = "Visit";

/// Static parts shared by every payload.
fn base_payload(start_timestamp: i64) -> ActivityPayload {
    ActivityPayload {
        details: None,
        state: None,
        large_image_key: LARGE_IMAGE_KEY.to_string(),
        large_image_text: LARGE_IMAGE_TEXT.to_string(),
        small_image_key: SMALL_IMAGE_KEY.to_string(),
        small_image_text: SMALL_IMAGE_TEXT.to_string(),
        start_timestamp,
        buttons: None,
        instance: false,
    }
}

pub fn synthesize(
    settings: &Settings,
    context: &EditorContext,
    view_mode: &dyn ViewModeProbe,
) -> ActivityPayload {
    let is_reading = view_mode.is_in_preview_mode().unwrap_or_else(|err| {
        tracing::debug!(error = %err, "View mode unknown; assuming edit mode");
        false
    });

    let privacy = PrivacyFilter::new(settings);
    let file = context.file();
    let hide_file = file.is_some_and(|f| privacy.should_hide_file(f.path()));
    let hide_vault = privacy.should_hide_vault();

    let template_context = TemplateContext {
        file,
        vault_name: context.vault_name(),
        is_reading,
    };

    let mut payload = base_payload(start_timestamp(settings, context));

    if settings.show_file_name && !hide_file {
        payload.details = details_text(settings, &template_context);
    }

    if settings.show_vault_name && !hide_vault {
        payload.state = state_text(settings, &template_context);
    }

    payload.buttons = custom_button(settings).map(|button| vec![button]);
    payload
}

fn details_text(settings: &Settings, context: &TemplateContext<'_>) -> Option<String> {
    if settings.use_custom_template {
        return render_non_blank(&settings.custom_details_template, context);
    }
    let activity = activity_type(context.is_reading);
    Some(match context.file {
        Some(file) => format!("{}: {}", activity, file.basename()),
        None => format!("{} a note", activity),
    })
}

fn state_text(settings: &Settings, context: &TemplateContext<'_>) -> Option<String> {
    if settings.use_custom_template {
        return render_non_blank(&settings.custom_state_template, context);
    }
    Some(format!("Vault: {}", context.vault_name))
}

/// A blank template omits the field rather than falling back to the default text.
fn render_non_blank(template: &str, context: &TemplateContext<'_>) -> Option<String> {
    if template.trim().is_empty() {
        return None;
    }
    Some(render(template, context))
}

fn start_timestamp(settings: &Settings, context: &EditorContext) -> i64 {
    let started_at = match settings.time_mode {
        TimeMode::PerFile => context.file_started_at(),
        TimeMode::PerSession => context.session_started_at(),
    };
    started_at.timestamp_millis().div_euclid(1000)
}

fn custom_button(settings: &Settings) -> Option<ActivityButton> {
    if !settings.enable_custom_button {
        return None;
    }
    let url = settings.custom_button_url.trim();
    if url.is_empty() {
        return None;
    }
    let label = settings.custom_button_label.trim();
    Some(ActivityButton {
        label: if label.is_empty() {
            DEFAULT_BUTTON_LABEL.to_string()
        } else {
            label.to_string()
        },
        url: url.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FixedViewMode, NoteFile, SharedViewMode};
    use chrono::{DateTime, TimeZone, Utc};

    fn session_start() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_999).unwrap()
    }

    fn context_with(path: Option<&str>) -> EditorContext {
        let mut context = EditorContext::new("Second Brain", session_start());
        let opened = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        context.open_file(path.map(NoteFile::new), opened);
        context
    }

    #[test]
    fn default_settings_with_file() {
        let payload = synthesize(
            &Settings::default(),
            &context_with(Some("Notes/Today.md")),
            &FixedViewMode(false),
        );
        assert_eq!(payload.details.as_deref(), Some("Editing: Today"));
        assert_eq!(payload.state.as_deref(), Some("Vault: Second Brain"));
        assert_eq!(payload.large_image_key, LARGE_IMAGE_KEY);
        assert!(!payload.instance);
        assert!(payload.buttons.is_none());
    }

    #[test]
    fn no_file_falls_back_to_generic_details() {
        let reading = synthesize(
            &Settings::default(),
            &context_with(None),
            &FixedViewMode(true),
        );
        assert_eq!(reading.details.as_deref(), Some("Reading a note"));

        let editing = synthesize(
            &Settings::default(),
            &context_with(None),
            &FixedViewMode(false),
        );
        assert_eq!(editing.details.as_deref(), Some("Editing a note"));
    }

    #[test]
    fn no_file_never_leaks_path_text() {
        let settings = Settings {
            use_custom_template: true,
            custom_details_template: "[%active_note_path%]".to_string(),
            ..Settings::default()
        };
        let payload = synthesize(&settings, &context_with(None), &FixedViewMode(false));
        assert_eq!(payload.details.as_deref(), Some("[]"));
    }

    #[test]
    fn both_display_toggles_off_omit_both_lines() {
        let settings = Settings {
            show_file_name: false,
            show_vault_name: false,
            ..Settings::default()
        };
        for path in [None, Some("Notes/Today.md")] {
            let payload = synthesize(&settings, &context_with(path), &FixedViewMode(true));
            assert!(payload.details.is_none());
            assert!(payload.state.is_none());
        }
    }

    #[test]
    fn hidden_folder_omits_details_entirely() {
        let settings = Settings {
            enable_path_hiding: true,
            hidden_paths: vec!["Private/".to_string()],
            ..Settings::default()
        };
        let payload = synthesize(
            &settings,
            &context_with(Some("Private/Diary.md")),
            &FixedViewMode(false),
        );
        assert!(payload.details.is_none());
        assert_eq!(payload.state.as_deref(), Some("Vault: Second Brain"));

        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("details").is_none());
    }

    #[test]
    fn hidden_file_wins_over_custom_template() {
        let settings = Settings {
            hide_note_name: true,
            use_custom_template: true,
            ..Settings::default()
        };
        let payload = synthesize(
            &settings,
            &context_with(Some("Notes/Today.md")),
            &FixedViewMode(false),
        );
        assert!(payload.details.is_none());
    }

    #[test]
    fn hide_note_name_without_file_keeps_generic_details() {
        let settings = Settings {
            hide_note_name: true,
            ..Settings::default()
        };
        let payload = synthesize(&settings, &context_with(None), &FixedViewMode(false));
        assert_eq!(payload.details.as_deref(), Some("Editing a note"));
    }

    #[test]
    fn hidden_vault_omits_state() {
        let settings = Settings {
            hide_vault_name: true,
            ..Settings::default()
        };
        let payload = synthesize(
            &settings,
            &context_with(Some("a.md")),
            &FixedViewMode(false),
        );
        assert!(payload.state.is_none());
        assert_eq!(payload.details.as_deref(), Some("Editing: a"));
    }

    #[test]
    fn custom_template_renders_reading_mode() {
        let settings = Settings {
            use_custom_template: true,
            custom_details_template: "%activity_type%: %active_note_name%".to_string(),
            custom_state_template: "in %folder_name%".to_string(),
            ..Settings::default()
        };
        let payload = synthesize(
            &settings,
            &context_with(Some("Notes/Today.md")),
            &FixedViewMode(true),
        );
        assert_eq!(payload.details.as_deref(), Some("Reading: Today"));
        assert_eq!(payload.state.as_deref(), Some("in Notes"));
    }

    #[test]
    fn blank_custom_template_omits_field() {
        let settings = Settings {
            use_custom_template: true,
            custom_details_template: "   ".to_string(),
            custom_state_template: String::new(),
            ..Settings::default()
        };
        let payload = synthesize(
            &settings,
            &context_with(Some("Notes/Today.md")),
            &FixedViewMode(false),
        );
        assert!(payload.details.is_none());
        assert!(payload.state.is_none());
    }

    #[test]
    fn display_toggles_gate_custom_templates_too() {
        let settings = Settings {
            show_file_name: false,
            show_vault_name: false,
            use_custom_template: true,
            ..Settings::default()
        };
        let payload = synthesize(
            &settings,
            &context_with(Some("Notes/Today.md")),
            &FixedViewMode(false),
        );
        assert!(payload.details.is_none());
        assert!(payload.state.is_none());
    }

    #[test]
    fn unknown_view_mode_means_editing() {
        let payload = synthesize(
            &Settings::default(),
            &context_with(Some("Notes/Today.md")),
            &SharedViewMode::new(),
        );
        assert_eq!(payload.details.as_deref(), Some("Editing: Today"));
    }

    #[test]
    fn time_mode_selects_source_timestamp() {
        let context = context_with(Some("a.md"));
        let mut settings = Settings::default();

        let per_file = synthesize(&settings, &context, &FixedViewMode(false));
        assert_eq!(per_file.start_timestamp, 1_700_000_123);

        settings.time_mode = TimeMode::PerSession;
        let per_session = synthesize(&settings, &context, &FixedViewMode(false));
        assert_eq!(per_session.start_timestamp, 1_700_000_000);

        assert_eq!(per_file.details, per_session.details);
        assert_eq!(per_file.state, per_session.state);
    }

    #[test]
    fn timestamp_present_under_full_privacy() {
        let settings = Settings {
            hide_note_name: true,
            hide_vault_name: true,
            ..Settings::default()
        };
        let payload = synthesize(
            &settings,
            &context_with(Some("a.md")),
            &FixedViewMode(false),
        );
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["startTimestamp"], 1_700_000_123);
    }

    #[test]
    fn button_requires_url_and_defaults_label() {
        let mut settings = Settings {
            enable_custom_button: true,
            ..Settings::default()
        };
        let context = context_with(None);
        assert!(synthesize(&settings, &context, &FixedViewMode(false))
            .buttons
            .is_none());

        settings.custom_button_url = "https://example.com".to_string();
        let buttons = synthesize(&settings, &context, &FixedViewMode(false))
            .buttons
            .unwrap();
        assert_eq!(
            buttons,
            vec![ActivityButton {
                label: DEFAULT_BUTTON_LABEL.to_string(),
                url: "https://example.com".to_string(),
            }]
        );

        settings.custom_button_label = "My garden".to_string();
        let buttons = synthesize(&settings, &context, &FixedViewMode(false))
            .buttons
            .unwrap();
        assert_eq!(buttons[0].label, "My garden");
    }

    #[test]
    fn disabled_button_is_omitted_from_json() {
        let settings = Settings {
            enable_custom_button: false,
            custom_button_url: "https://example.com".to_string(),
            ..Settings::default()
        };
        let payload = synthesize(&settings, &context_with(None), &FixedViewMode(false));
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("buttons").is_none());
    }
}
