//! Connection lifecycle for the presence service.
//!
//! ```text
//! Disconnected --connect--> Connecting --ready--> Ready
//!      ^                        |                   |
//!      +------ login failed ----+                   |
//!      +------ disconnected signal / disconnect ----+
//! ```
//!
//! The manager exclusively owns the transport and the refresh timer. Every
//! path out of `Ready` goes through [`ConnectionManager::leave_ready`], which
//! drops the timer before anything else.

use crate::timer::{RefreshHook, RefreshTimer};
use crate::transport::{
    SessionId, SignalKind, SignalSink, Transport, TransportFactory, TransportSignal,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use vault_presence_protocol::ActivityPayload;

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(15);

pub const NOTICE_CONNECT_FAILED: &str =
    "Failed to connect to Discord. Make sure the desktop app is running.";
pub const NOTICE_DISCONNECTED: &str = "Disconnected from Discord.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
}

/// Surface for one-line user-visible notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notices go to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!(notice = message, "User notice");
    }
}

pub type DisconnectHook = Box<dyn FnMut() + Send>;

pub struct ConnectionManager {
    factory: Box<dyn TransportFactory>,
    application_id: String,
    signals: SignalSink,
    notifier: Arc<dyn Notifier>,
    refresh_interval: Duration,

    state: ConnectionState,
    session: SessionId,
    transport: Option<Box<dyn Transport>>,
    timer: Option<RefreshTimer>,
    on_refresh: Option<RefreshHook>,
    on_disconnected: Option<DisconnectHook>,
}

impl ConnectionManager {
    pub fn new(
        factory: Box<dyn TransportFactory>,
        application_id: impl Into<String>,
        signals: SignalSink,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            factory,
            application_id: application_id.into(),
            signals,
            notifier,
            refresh_interval: REFRESH_INTERVAL,
            state: ConnectionState::Disconnected,
            session: 0,
            transport: None,
            timer: None,
            on_refresh: None,
            on_disconnected: None,
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.set_refresh_interval(interval);
        self
    }

    /// Takes effect the next time the timer starts.
    pub fn set_refresh_interval(&mut self, interval: Duration) {
        self.refresh_interval = interval;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn has_refresh_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Attempts one handshake. Returns `false` on failure after notifying the
    /// user; never returns an error.
    ///
    /// `on_refresh` runs on the timer thread every refresh interval while the
    /// connection is ready. `on_disconnected` runs when the service drops the
    /// connection on its own.
    pub fn connect(&mut self, on_refresh: RefreshHook, on_disconnected: DisconnectHook) -> bool {
        if self.is_ready() {
            debug!(session = self.session, "Already connected; connect is a no-op");
            return true;
        }

        self.release_transport();
        self.session += 1;
        let session = self.session;
        self.state = ConnectionState::Connecting;
        self.on_refresh = Some(on_refresh);
        self.on_disconnected = Some(on_disconnected);
        info!(session, "Connecting to presence service");

        let mut transport = self.factory.create(session, Arc::clone(&self.signals));
        match transport.login(&self.application_id) {
            Ok(()) => {
                self.transport = Some(transport);
                self.enter_ready();
                true
            }
            Err(err) => {
                warn!(error = %err, session, "Presence handshake failed");
                if let Err(err) = transport.destroy() {
                    debug!(error = %err, "Failed to release transport after handshake failure");
                }
                self.on_refresh = None;
                self.on_disconnected = None;
                self.state = ConnectionState::Disconnected;
                self.notifier.notify(NOTICE_CONNECT_FAILED);
                false
            }
        }
    }

    /// Applies a signal posted by the transport. Signals for any session
    /// other than the current one are ignored.
    pub fn handle_signal(&mut self, signal: TransportSignal) {
        if signal.session != self.session {
            debug!(
                signal_session = signal.session,
                session = self.session,
                kind = ?signal.kind,
                "Ignoring signal from stale transport session"
            );
            return;
        }

        match (signal.kind, self.state) {
            // `login` only succeeds after READY, so the confirmation never
            // changes state; a late one must not revive a closed session.
            (SignalKind::Ready, state) => {
                debug!(session = self.session, ?state, "Handshake confirmed by transport");
            }
            (SignalKind::Disconnected, ConnectionState::Disconnected) => {}
            (SignalKind::Disconnected, _) => {
                info!(session = self.session, "Presence service disconnected");
                self.leave_ready();
                self.release_transport();
                self.notifier.notify(NOTICE_DISCONNECTED);
                if let Some(mut hook) = self.on_disconnected.take() {
                    hook();
                }
            }
        }
    }

    /// Clears the remote activity and tears the transport down. Teardown
    /// failures are logged and swallowed; the state is `Disconnected` after.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected && self.transport.is_none() {
            return;
        }

        self.leave_ready();
        if let Some(transport) = self.transport.as_mut() {
            if let Err(err) = transport.clear_activity() {
                debug!(error = %err, "Failed to clear activity during disconnect");
            }
        }
        self.release_transport();
        self.on_disconnected = None;
        info!(session = self.session, "Disconnected from presence service");
    }

    /// Best-effort send; a no-op unless ready.
    pub fn set_activity(&mut self, payload: &ActivityPayload) {
        if !self.is_ready() {
            debug!(state = ?self.state, "Not ready; dropping activity update");
            return;
        }
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Err(err) = transport.set_activity(payload) {
            warn!(error = %err, "Failed to send activity");
        }
    }

    fn enter_ready(&mut self) {
        self.state = ConnectionState::Ready;
        self.restart_timer();
        info!(session = self.session, "Presence service ready");
    }

    fn leave_ready(&mut self) {
        self.timer = None;
        self.on_refresh = None;
        self.state = ConnectionState::Disconnected;
    }

    fn restart_timer(&mut self) {
        self.timer = None;
        if let Some(hook) = self.on_refresh.clone() {
            self.timer = Some(RefreshTimer::start(self.refresh_interval, hook));
        }
    }

    fn release_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(err) = transport.destroy() {
                debug!(error = %err, "Failed to destroy transport");
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}
