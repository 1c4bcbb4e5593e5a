//! Seam between the lifecycle manager and the presence service client.
//!
//! One transport instance backs one connect attempt. Asynchronous signals
//! (the service going away) are posted through a [`SignalSink`] tagged with
//! the session id the manager assigned, so a signal from a torn-down session
//! can be told apart from one for the live session.

use crate::error::TransportError;
use std::sync::Arc;
use vault_presence_protocol::ActivityPayload;

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Handshake confirmed by the service.
    Ready,
    /// The service closed the connection (e.g. the chat client quit).
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSignal {
    pub session: SessionId,
    pub kind: SignalKind,
}

impl TransportSignal {
    pub fn ready(session: SessionId) -> Self {
        Self {
            session,
            kind: SignalKind::Ready,
        }
    }

    pub fn disconnected(session: SessionId) -> Self {
        Self {
            session,
            kind: SignalKind::Disconnected,
        }
    }
}

/// Callable from any thread; implementations forward onto the event queue.
pub type SignalSink = Arc<dyn Fn(TransportSignal) + Send + Sync>;

pub trait Transport: Send {
    /// Performs the handshake. Blocks until the service confirms or rejects.
    fn login(&mut self, application_id: &str) -> Result<(), TransportError>;

    fn set_activity(&mut self, activity: &ActivityPayload) -> Result<(), TransportError>;

    fn clear_activity(&mut self) -> Result<(), TransportError>;

    /// Releases the connection. Must not emit a `Disconnected` signal.
    fn destroy(&mut self) -> Result<(), TransportError>;
}

pub trait TransportFactory: Send {
    fn create(&self, session: SessionId, signals: SignalSink) -> Box<dyn Transport>;
}
