//! Orchestrates host events, synthesis and the connection.
//!
//! All state lives on the thread that calls [`PresenceService::run`] (or
//! [`PresenceService::handle`] directly). Other threads only post
//! [`PresenceEvent`]s through the sender, which keeps every transition and
//! synthesis strictly ordered.

use crate::context::{EditorContext, NoteFile, ViewModeProbe};
use crate::debounce::Debouncer;
use crate::lifecycle::{ConnectionManager, ConnectionState, Notifier};
use crate::settings::{Settings, SettingsStore};
use crate::synthesizer::synthesize;
use crate::transport::{TransportFactory, TransportSignal};
use chrono::Utc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use vault_presence_protocol::ActivityPayload;

pub const LAYOUT_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    FileOpen(Option<NoteFile>),
    ActiveViewChange,
    LayoutChange,
    Rename { old_path: String, file: NoteFile },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    Host(HostEvent),
    Transport(TransportSignal),
    Refresh,
    SettingsChanged(Settings),
    Connect,
    Disconnect,
    Shutdown,
}

pub struct PresenceService {
    settings: SettingsStore,
    context: EditorContext,
    view_mode: Arc<dyn ViewModeProbe>,
    connection: ConnectionManager,
    layout: Debouncer,
    events_tx: Sender<PresenceEvent>,
    events_rx: Receiver<PresenceEvent>,
}

impl PresenceService {
    pub fn new(
        settings: Settings,
        vault_name: impl Into<String>,
        view_mode: Arc<dyn ViewModeProbe>,
        factory: Box<dyn TransportFactory>,
        application_id: impl Into<String>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let signal_tx = events_tx.clone();
        let connection = ConnectionManager::new(
            factory,
            application_id,
            Arc::new(move |signal: TransportSignal| {
                let _ = signal_tx.send(PresenceEvent::Transport(signal));
            }),
            notifier,
        );

        Self {
            settings: SettingsStore::new(settings),
            context: EditorContext::new(vault_name, Utc::now()),
            view_mode,
            connection,
            layout: Debouncer::new(LAYOUT_DEBOUNCE),
            events_tx,
            events_rx,
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.connection.set_refresh_interval(interval);
        self
    }

    /// Handle for posting events from other threads.
    pub fn sender(&self) -> Sender<PresenceEvent> {
        self.events_tx.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn settings(&self) -> &Settings {
        self.settings.current()
    }

    pub fn context(&self) -> &EditorContext {
        &self.context
    }

    /// What would be sent right now.
    pub fn current_activity(&self) -> ActivityPayload {
        synthesize(self.settings.current(), &self.context, self.view_mode.as_ref())
    }

    /// One handshake attempt. On success the current activity is pushed
    /// immediately instead of waiting for the first refresh tick.
    pub fn connect(&mut self) -> bool {
        let refresh_tx = self.events_tx.clone();
        let on_refresh = Arc::new(move || {
            let _ = refresh_tx.send(PresenceEvent::Refresh);
        });
        let on_disconnected = Box::new(|| {
            debug!("Presence connection lost; waiting for an explicit reconnect");
        });

        let connected = self.connection.connect(on_refresh, on_disconnected);
        if connected {
            self.sync();
        }
        connected
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Applies one event. Returns `false` once the service should stop.
    pub fn handle(&mut self, event: PresenceEvent) -> bool {
        match event {
            PresenceEvent::Host(host) => self.handle_host(host),
            PresenceEvent::Transport(signal) => self.connection.handle_signal(signal),
            PresenceEvent::Refresh => self.sync(),
            PresenceEvent::SettingsChanged(settings) => {
                if self.settings.update(settings) {
                    debug!(revision = self.settings.revision(), "Settings updated");
                    self.sync();
                }
            }
            PresenceEvent::Connect => {
                self.connect();
            }
            PresenceEvent::Disconnect => self.disconnect(),
            PresenceEvent::Shutdown => {
                info!("Presence service shutting down");
                self.disconnect();
                return false;
            }
        }
        true
    }

    fn handle_host(&mut self, event: HostEvent) {
        match event {
            HostEvent::FileOpen(file) => {
                debug!(path = ?file.as_ref().map(NoteFile::path), "File opened");
                self.context.open_file(file, Utc::now());
                self.sync();
            }
            HostEvent::ActiveViewChange => self.sync(),
            HostEvent::LayoutChange => self.layout.schedule(Instant::now()),
            HostEvent::Rename { old_path, file } => {
                if self.context.rename(&old_path, file) {
                    self.sync();
                }
            }
        }
    }

    /// Resynthesize and transmit, if connected.
    fn sync(&mut self) {
        if !self.connection.is_ready() {
            return;
        }
        let payload = self.current_activity();
        self.connection.set_activity(&payload);
    }

    /// Drains events until `Shutdown`. A pending layout change is flushed
    /// once its debounce window has passed without further layout changes.
    pub fn run(&mut self) {
        loop {
            let next = match self.layout.time_until_due(Instant::now()) {
                Some(wait) => match self.events_rx.recv_timeout(wait) {
                    Ok(event) => Some(event),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.events_rx.recv() {
                    Ok(event) => Some(event),
                    Err(_) => break,
                },
            };

            if let Some(event) = next {
                if !self.handle(event) {
                    return;
                }
            }

            if self.layout.fire_if_due(Instant::now()) {
                self.sync();
            }
        }
        self.disconnect();
    }
}
