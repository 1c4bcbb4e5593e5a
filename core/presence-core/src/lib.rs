//! # presence-core
//!
//! Presence synthesis and connection lifecycle for the vault presence bridge.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Background threads only
//!   post events; one thread owns all state.
//! - **Best-effort**: Presence failures are logged and absorbed, never
//!   propagated to the host.
//! - **Pure where possible**: Privacy, templating and synthesis are plain
//!   functions of settings and editor context.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use presence_core::{IpcTransportFactory, LogNotifier, PresenceService, SharedViewMode};
//!
//! let mut service = PresenceService::new(
//!     settings,
//!     "My Vault",
//!     Arc::new(SharedViewMode::new()),
//!     Box::new(IpcTransportFactory::new()),
//!     presence_core::application_id(),
//!     Arc::new(LogNotifier),
//! );
//! service.connect();
//! service.run();
//! ```

pub mod config;
pub mod context;
pub mod debounce;
pub mod error;
pub mod ipc;
pub mod lifecycle;
pub mod patterns;
pub mod privacy;
pub mod service;
pub mod settings;
pub mod synthesizer;
pub mod template;
pub mod timer;
pub mod transport;

pub use config::*;
pub use context::{EditorContext, FixedViewMode, NoteFile, SharedViewMode, ViewModeProbe};
pub use error::{ModeDetectionError, PresenceError, Result, TransportError};
pub use ipc::{IpcTransport, IpcTransportFactory};
pub use lifecycle::{ConnectionManager, ConnectionState, LogNotifier, Notifier};
pub use privacy::PrivacyFilter;
pub use service::{HostEvent, PresenceEvent, PresenceService};
pub use settings::{Settings, SettingsStore, TimeMode};
pub use synthesizer::synthesize;
pub use template::{render, TemplateContext};
pub use transport::{
    SessionId, SignalKind, SignalSink, Transport, TransportFactory, TransportSignal,
};
pub use vault_presence_protocol::{ActivityButton, ActivityPayload};
