//! Unix-socket transport for the local chat-client presence service.
//!
//! `login` connects to the first socket that accepts, sends the handshake and
//! blocks until the service dispatches READY (or rejects). A reader thread
//! then owns the receive half: it answers pings and posts `Disconnected`
//! when the service closes the socket. Writes share one stream behind a
//! mutex so pongs and commands never interleave.

use crate::error::TransportError;
use crate::transport::{SessionId, SignalSink, Transport, TransportFactory, TransportSignal};
use chrono::Utc;
use rand::RngCore;
use std::env;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vault_presence_protocol::{
    read_frame, write_frame, ActivityPayload, CommandRequest, ErrorInfo, Frame, Handshake,
    IncomingMessage, Opcode,
};

pub const SOCKET_ENV: &str = "VAULT_PRESENCE_IPC_SOCKET";
const SOCKET_PREFIX: &str = "discord-ipc-";
const SOCKET_SLOTS: u32 = 10;
const SANDBOX_SUBDIRS: [&str; 2] = ["app/com.discordapp.Discord", "snap.discord"];
const HANDSHAKE_TIMEOUT_MS: u64 = 5_000;
const WRITE_TIMEOUT_MS: u64 = 2_000;

/// Candidate socket paths in probe order.
pub fn candidate_socket_paths() -> Vec<PathBuf> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        if !path.trim().is_empty() {
            return vec![PathBuf::from(path)];
        }
    }

    let base = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));

    socket_paths_under(&base)
}

fn socket_paths_under(base: &Path) -> Vec<PathBuf> {
    let dirs = std::iter::once(base.to_path_buf())
        .chain(SANDBOX_SUBDIRS.iter().map(|sub| base.join(sub)))
        .collect::<Vec<_>>();

    dirs.iter()
        .flat_map(|dir| {
            (0..SOCKET_SLOTS).map(move |slot| dir.join(format!("{}{}", SOCKET_PREFIX, slot)))
        })
        .collect()
}

fn make_nonce() -> String {
    let mut random = rand::thread_rng();
    format!("{}-{:x}", Utc::now().timestamp_millis(), random.next_u64())
}

fn io_error(context: &str) -> impl FnOnce(std::io::Error) -> TransportError + '_ {
    move |source| TransportError::Io {
        context: context.to_string(),
        source,
    }
}

pub struct IpcTransport {
    session: SessionId,
    signals: SignalSink,
    candidates: Vec<PathBuf>,
    pid: u32,
    writer: Option<Arc<Mutex<UnixStream>>>,
    control: Option<UnixStream>,
    reader: Option<JoinHandle<()>>,
    closing: Arc<AtomicBool>,
}

impl IpcTransport {
    pub fn new(session: SessionId, signals: SignalSink, candidates: Vec<PathBuf>) -> Self {
        Self {
            session,
            signals,
            candidates,
            pid: std::process::id(),
            writer: None,
            control: None,
            reader: None,
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    fn open_stream(&self) -> Result<UnixStream, TransportError> {
        for path in &self.candidates {
            match UnixStream::connect(path) {
                Ok(stream) => {
                    debug!(path = %path.display(), "Connected to presence socket");
                    return Ok(stream);
                }
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "Presence socket unavailable");
                }
            }
        }
        Err(TransportError::SocketNotFound)
    }

    fn send(&self, frame: &Frame) -> Result<(), TransportError> {
        let writer = self.writer.as_ref().ok_or(TransportError::NotConnected)?;
        let mut stream = writer.lock().map_err(|_| TransportError::NotConnected)?;
        write_frame(&mut *stream, frame)?;
        Ok(())
    }

    fn send_command(&self, activity: Option<&ActivityPayload>) -> Result<(), TransportError> {
        let request =
            CommandRequest::set_activity(self.pid, activity.map(|a| a.to_wire()), make_nonce());
        self.send(&request.to_frame())
    }
}

/// Blocks until READY, answering pings along the way.
fn await_ready(stream: &mut UnixStream) -> Result<(), TransportError> {
    let deadline = Instant::now() + Duration::from_millis(HANDSHAKE_TIMEOUT_MS);
    loop {
        if Instant::now() >= deadline {
            return Err(TransportError::Io {
                context: "waiting for READY".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::TimedOut, "handshake timed out"),
            });
        }

        let frame = read_frame(stream)?;
        match frame.opcode {
            Opcode::Frame => {
                let message = IncomingMessage::parse(&frame.payload);
                if message.is_ready() {
                    return Ok(());
                }
                if let Some(info) = message.error() {
                    return Err(rejected(info));
                }
                debug!(cmd = ?message.cmd, evt = ?message.evt, "Ignoring frame before READY");
            }
            Opcode::Close => return Err(rejected(ErrorInfo::from_payload(&frame.payload))),
            Opcode::Ping => write_frame(stream, &Frame::new(Opcode::Pong, frame.payload))?,
            Opcode::Handshake | Opcode::Pong => {}
        }
    }
}

fn rejected(info: ErrorInfo) -> TransportError {
    TransportError::HandshakeRejected {
        code: info.code,
        message: info.message,
    }
}

fn reader_loop(
    mut stream: UnixStream,
    writer: Arc<Mutex<UnixStream>>,
    session: SessionId,
    signals: SignalSink,
    closing: Arc<AtomicBool>,
) {
    loop {
        let frame = match read_frame(&mut stream) {
            Ok(frame) => frame,
            Err(err) => {
                if !closing.load(Ordering::SeqCst) {
                    debug!(error = %err, session, "Presence socket read ended");
                }
                break;
            }
        };

        match frame.opcode {
            Opcode::Ping => {
                if let Ok(mut guard) = writer.lock() {
                    let pong = Frame::new(Opcode::Pong, frame.payload);
                    if let Err(err) = write_frame(&mut *guard, &pong) {
                        debug!(error = %err, "Failed to answer ping");
                    }
                }
            }
            Opcode::Close => {
                let info = ErrorInfo::from_payload(&frame.payload);
                info!(
                    code = info.code,
                    message = %info.message,
                    session,
                    "Presence service closed the connection"
                );
                break;
            }
            Opcode::Frame => {
                let message = IncomingMessage::parse(&frame.payload);
                match message.error() {
                    Some(info) => warn!(
                        code = info.code,
                        message = %info.message,
                        nonce = ?message.nonce,
                        "Presence service rejected a command"
                    ),
                    None => debug!(
                        cmd = ?message.cmd,
                        evt = ?message.evt,
                        "Presence service response"
                    ),
                }
            }
            Opcode::Handshake | Opcode::Pong => {}
        }
    }

    if !closing.load(Ordering::SeqCst) {
        signals(TransportSignal::disconnected(session));
    }
}

impl Transport for IpcTransport {
    fn login(&mut self, application_id: &str) -> Result<(), TransportError> {
        let mut stream = self.open_stream()?;
        stream
            .set_read_timeout(Some(Duration::from_millis(HANDSHAKE_TIMEOUT_MS)))
            .map_err(io_error("setting read timeout"))?;
        stream
            .set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)))
            .map_err(io_error("setting write timeout"))?;

        write_frame(&mut stream, &Handshake::new(application_id).to_frame())?;
        await_ready(&mut stream)?;

        stream
            .set_read_timeout(None)
            .map_err(io_error("clearing read timeout"))?;
        let reader_stream = stream
            .try_clone()
            .map_err(io_error("cloning stream for reader"))?;
        let control = stream
            .try_clone()
            .map_err(io_error("cloning stream for shutdown"))?;

        let writer = Arc::new(Mutex::new(stream));
        let reader_writer = Arc::clone(&writer);
        let signals = Arc::clone(&self.signals);
        let closing = Arc::clone(&self.closing);
        let session = self.session;
        let reader = thread::Builder::new()
            .name("presence-ipc-reader".to_string())
            .spawn(move || reader_loop(reader_stream, reader_writer, session, signals, closing))
            .map_err(io_error("spawning reader thread"))?;

        self.writer = Some(writer);
        self.control = Some(control);
        self.reader = Some(reader);
        info!(session, "Presence handshake complete");
        (self.signals)(TransportSignal::ready(session));
        Ok(())
    }

    fn set_activity(&mut self, activity: &ActivityPayload) -> Result<(), TransportError> {
        let activity = activity.truncated();
        activity
            .validate()
            .map_err(|info| TransportError::InvalidActivity(info.message))?;
        self.send_command(Some(&activity))
    }

    fn clear_activity(&mut self) -> Result<(), TransportError> {
        self.send_command(None)
    }

    fn destroy(&mut self) -> Result<(), TransportError> {
        self.closing.store(true, Ordering::SeqCst);
        self.writer = None;

        let result = match self.control.take() {
            Some(control) => match control.shutdown(Shutdown::Both) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(io_error("shutting down socket")(err)),
            },
            None => Ok(()),
        };

        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!(session = self.session, "Presence reader thread panicked");
            }
        }
        result
    }
}

impl Drop for IpcTransport {
    fn drop(&mut self) {
        if self.control.is_some() || self.reader.is_some() {
            let _ = self.destroy();
        }
    }
}

/// Creates [`IpcTransport`]s that probe the default socket locations, or a
/// fixed list when one is supplied.
#[derive(Debug, Clone, Default)]
pub struct IpcTransportFactory {
    socket_paths: Option<Vec<PathBuf>>,
}

impl IpcTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_socket_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            socket_paths: Some(paths),
        }
    }
}

impl TransportFactory for IpcTransportFactory {
    fn create(&self, session: SessionId, signals: SignalSink) -> Box<dyn Transport> {
        let candidates = self
            .socket_paths
            .clone()
            .unwrap_or_else(candidate_socket_paths);
        Box::new(IpcTransport::new(session, signals, candidates))
    }
}
