//! Error types for presence-core operations.
//!
//! Most failures in this crate are absorbed close to where they happen (the
//! host must never crash because presence is unavailable). These types carry
//! enough context for the log line that records them.

use std::path::PathBuf;
use vault_presence_protocol::FrameError;

/// All errors that can occur in presence-core operations.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    // ─────────────────────────────────────────────────────────────────────
    // Settings Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Settings file malformed: {path}: {details}")]
    SettingsMalformed { path: PathBuf, details: String },

    #[error("Settings write failed: {path}: {source}")]
    SettingsWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Transport Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures talking to the local presence service.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("No presence service socket accepted a connection")]
    SocketNotFound,

    #[error("Transport I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol error: {0}")]
    Protocol(#[from] FrameError),

    #[error("Handshake rejected ({code}): {message}")]
    HandshakeRejected { code: i64, message: String },

    #[error("Activity rejected before sending: {0}")]
    InvalidActivity(String),

    #[error("Transport is not connected")]
    NotConnected,
}

/// The host could not tell whether the active view is in reading mode.
#[derive(Debug, thiserror::Error)]
#[error("View mode unavailable: {0}")]
pub struct ModeDetectionError(pub String);

/// Convenience type alias for Results using PresenceError.
pub type Result<T> = std::result::Result<T, PresenceError>;
