//! Host side of the bridge.
//!
//! The notes app writes one JSON object per line to stdin, tagged by `type`:
//!
//! ```text
//! {"type":"file_open","file":"Notes/Today.md","preview":false}
//! {"type":"active_view_change","preview":true}
//! {"type":"layout_change"}
//! {"type":"rename","old_path":"Notes/Draft.md","file":"Notes/Final.md"}
//! {"type":"settings_changed","settings":{...}}   (omit settings to reload from disk)
//! {"type":"connect"} / {"type":"disconnect"} / {"type":"shutdown"}
//! ```
//!
//! Notices travel the other way as `{"type":"notice","message":...}` lines on
//! stdout, which is why logging never writes there.

use presence_core::{
    load_settings, save_settings, HostEvent, NoteFile, Notifier, PresenceEvent, Settings,
    SharedViewMode,
};
use serde::Deserialize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    FileOpen {
        #[serde(default)]
        file: Option<String>,
        #[serde(default)]
        preview: Option<bool>,
    },
    ActiveViewChange {
        #[serde(default)]
        preview: Option<bool>,
    },
    LayoutChange {
        #[serde(default)]
        preview: Option<bool>,
    },
    Rename {
        old_path: String,
        file: String,
    },
    SettingsChanged {
        #[serde(default)]
        settings: Option<Settings>,
    },
    Connect,
    Disconnect,
    Shutdown,
}

/// Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<HostMessage>, serde_json::Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some)
}

/// Turns host messages into service events, keeping the shared view mode
/// and the settings file up to date on the way.
pub struct HostAdapter {
    view_mode: SharedViewMode,
    settings_path: PathBuf,
}

impl HostAdapter {
    pub fn new(view_mode: SharedViewMode, settings_path: PathBuf) -> Self {
        Self {
            view_mode,
            settings_path,
        }
    }

    pub fn translate(&self, message: HostMessage) -> Option<PresenceEvent> {
        match message {
            HostMessage::FileOpen { file, preview } => {
                match (&file, preview) {
                    (_, Some(preview)) => self.view_mode.report(Some(preview)),
                    (None, None) => self.view_mode.report(None),
                    (Some(_), None) => {}
                }
                Some(PresenceEvent::Host(HostEvent::FileOpen(file.map(NoteFile::new))))
            }
            HostMessage::ActiveViewChange { preview } => {
                self.report_preview(preview);
                Some(PresenceEvent::Host(HostEvent::ActiveViewChange))
            }
            HostMessage::LayoutChange { preview } => {
                self.report_preview(preview);
                Some(PresenceEvent::Host(HostEvent::LayoutChange))
            }
            HostMessage::Rename { old_path, file } => Some(PresenceEvent::Host(HostEvent::Rename {
                old_path,
                file: NoteFile::new(file),
            })),
            HostMessage::SettingsChanged { settings } => self.settings_event(settings),
            HostMessage::Connect => Some(PresenceEvent::Connect),
            HostMessage::Disconnect => Some(PresenceEvent::Disconnect),
            HostMessage::Shutdown => Some(PresenceEvent::Shutdown),
        }
    }

    fn report_preview(&self, preview: Option<bool>) {
        if let Some(preview) = preview {
            self.view_mode.report(Some(preview));
        }
    }

    /// Inline snapshots are persisted before being applied; a bare
    /// `settings_changed` reloads from disk and keeps the current settings
    /// if the file is unreadable.
    fn settings_event(&self, inline: Option<Settings>) -> Option<PresenceEvent> {
        match inline {
            Some(settings) => {
                if let Err(err) = save_settings(&self.settings_path, &settings) {
                    tracing::warn!(error = %err, "Failed to persist settings snapshot");
                }
                Some(PresenceEvent::SettingsChanged(settings))
            }
            None => match load_settings(&self.settings_path) {
                Ok(settings) => Some(PresenceEvent::SettingsChanged(settings)),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "Settings reload failed; keeping current settings"
                    );
                    None
                }
            },
        }
    }
}

/// Forwards every parsable line until EOF, then posts `Shutdown`. Stops early
/// once the service has gone away.
pub fn pump<R: BufRead>(reader: R, adapter: &HostAdapter, events: &Sender<PresenceEvent>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read host input");
                break;
            }
        };

        let message = match parse_line(&line) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring malformed host message");
                continue;
            }
        };

        if let Some(event) = adapter.translate(message) {
            if events.send(event).is_err() {
                return;
            }
        }
    }

    tracing::debug!("Host input closed");
    let _ = events.send(PresenceEvent::Shutdown);
}

pub fn spawn_stdin_reader(
    adapter: HostAdapter,
    events: Sender<PresenceEvent>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("presence-host-reader".to_string())
        .spawn(move || pump(io::stdin().lock(), &adapter, &events))
}

/// Writes notices as JSON lines.
pub struct LineNotifier<W: Write + Send> {
    out: Mutex<W>,
}

impl LineNotifier<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> LineNotifier<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> Notifier for LineNotifier<W> {
    fn notify(&self, message: &str) {
        let line = serde_json::json!({ "type": "notice", "message": message });
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        if let Err(err) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            tracing::debug!(error = %err, "Failed to write notice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_core::{TimeMode, ViewModeProbe};
    use std::io::Cursor;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn adapter(dir: &TempDir) -> (HostAdapter, SharedViewMode) {
        let view_mode = SharedViewMode::new();
        let adapter = HostAdapter::new(view_mode.clone(), dir.path().join("settings.json"));
        (adapter, view_mode)
    }

    #[test]
    fn parses_each_message_type() {
        assert_eq!(
            parse_line(r#"{"type":"file_open","file":"a.md","preview":true}"#).unwrap(),
            Some(HostMessage::FileOpen {
                file: Some("a.md".to_string()),
                preview: Some(true),
            })
        );
        assert_eq!(
            parse_line(r#"{"type":"file_open","file":null}"#).unwrap(),
            Some(HostMessage::FileOpen {
                file: None,
                preview: None,
            })
        );
        assert_eq!(
            parse_line(r#"{"type":"layout_change"}"#).unwrap(),
            Some(HostMessage::LayoutChange { preview: None })
        );
        assert_eq!(
            parse_line(r#"{"type":"rename","old_path":"a.md","file":"b.md"}"#).unwrap(),
            Some(HostMessage::Rename {
                old_path: "a.md".to_string(),
                file: "b.md".to_string(),
            })
        );
        assert_eq!(
            parse_line(r#"{"type":"shutdown"}"#).unwrap(),
            Some(HostMessage::Shutdown)
        );
        assert_eq!(parse_line("   ").unwrap(), None);
        assert!(parse_line(r#"{"type":"bogus"}"#).is_err());
    }

    #[test]
    fn preview_flag_updates_view_mode() {
        let dir = TempDir::new().unwrap();
        let (adapter, view_mode) = adapter(&dir);

        adapter.translate(HostMessage::ActiveViewChange {
            preview: Some(true),
        });
        assert!(view_mode.is_in_preview_mode().unwrap());

        adapter.translate(HostMessage::LayoutChange { preview: None });
        assert!(view_mode.is_in_preview_mode().unwrap());

        let event = adapter.translate(HostMessage::FileOpen {
            file: None,
            preview: None,
        });
        assert_eq!(event, Some(PresenceEvent::Host(HostEvent::FileOpen(None))));
        assert!(view_mode.is_in_preview_mode().is_err());
    }

    #[test]
    fn inline_settings_are_persisted() {
        let dir = TempDir::new().unwrap();
        let (adapter, _) = adapter(&dir);
        let settings = Settings {
            time_mode: TimeMode::PerSession,
            ..Settings::default()
        };

        let event = adapter.translate(HostMessage::SettingsChanged {
            settings: Some(settings.clone()),
        });
        assert_eq!(event, Some(PresenceEvent::SettingsChanged(settings.clone())));
        assert_eq!(
            load_settings(&dir.path().join("settings.json")).unwrap(),
            settings
        );
    }

    #[test]
    fn bare_settings_change_reloads_from_disk() {
        let dir = TempDir::new().unwrap();
        let (adapter, _) = adapter(&dir);
        let path = dir.path().join("settings.json");

        fs_err::write(&path, r#"{"hideVaultName": true}"#).unwrap();
        let event = adapter.translate(HostMessage::SettingsChanged { settings: None });
        let Some(PresenceEvent::SettingsChanged(settings)) = event else {
            panic!("expected a settings event, got {:?}", event);
        };
        assert!(settings.hide_vault_name);
        assert!(settings.show_file_name);

        fs_err::write(&path, "{not json").unwrap();
        assert_eq!(
            adapter.translate(HostMessage::SettingsChanged { settings: None }),
            None
        );
    }

    #[test]
    fn pump_skips_garbage_and_shuts_down_on_eof() {
        let dir = TempDir::new().unwrap();
        let (adapter, _) = adapter(&dir);
        let (tx, rx) = mpsc::channel();
        let input = concat!(
            "{\"type\":\"connect\"}\n",
            "not json\n",
            "\n",
            "{\"type\":\"file_open\",\"file\":\"Notes/Today.md\"}\n",
        );

        pump(Cursor::new(input), &adapter, &tx);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                PresenceEvent::Connect,
                PresenceEvent::Host(HostEvent::FileOpen(Some(NoteFile::new("Notes/Today.md")))),
                PresenceEvent::Shutdown,
            ]
        );
    }

    #[test]
    fn notices_are_json_lines() {
        let notifier = LineNotifier::new(Vec::new());
        notifier.notify("Disconnected from Discord.");
        notifier.notify("second");

        let output = String::from_utf8(notifier.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "notice");
        assert_eq!(lines[0]["message"], "Disconnected from Discord.");
    }
}
