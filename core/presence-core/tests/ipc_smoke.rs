//! Drives the Unix-socket transport against a scripted local service.

use presence_core::{
    ConnectionManager, ConnectionState, IpcTransportFactory, LogNotifier, SignalKind, SignalSink,
    TransportSignal,
};
use serde_json::{json, Value};
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;
use vault_presence_protocol::{
    read_frame, write_frame, ActivityPayload, Frame, Opcode, CMD_SET_ACTIVITY, MAX_TEXT_CHARS,
};

const WAIT: Duration = Duration::from_secs(3);

enum Reply {
    Ready,
    Reject { code: i64, message: &'static str },
}

enum Action {
    Ping(Value),
    Close,
}

struct FakeService {
    _dir: TempDir,
    path: PathBuf,
    frames: Receiver<Frame>,
    actions: Sender<Action>,
    handle: Option<JoinHandle<()>>,
}

impl FakeService {
    fn start(reply: Reply) -> Self {
        let dir = tempfile::tempdir_in("/tmp").unwrap();
        let path = dir.path().join("discord-ipc-0");
        let listener = UnixListener::bind(&path).unwrap();
        let (frames_tx, frames) = mpsc::channel();
        let (actions, actions_rx) = mpsc::channel::<Action>();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let handshake = read_frame(&mut stream).unwrap();
            let _ = frames_tx.send(handshake);

            match reply {
                Reply::Ready => {
                    let ready = json!({"cmd": "DISPATCH", "evt": "READY", "data": {"v": 1}});
                    write_frame(&mut stream, &Frame::new(Opcode::Frame, ready)).unwrap();
                }
                Reply::Reject { code, message } => {
                    let close = json!({"code": code, "message": message});
                    write_frame(&mut stream, &Frame::new(Opcode::Close, close)).unwrap();
                    return;
                }
            }

            let mut reader = stream.try_clone().unwrap();
            let forward = frames_tx.clone();
            thread::spawn(move || {
                while let Ok(frame) = read_frame(&mut reader) {
                    if forward.send(frame).is_err() {
                        break;
                    }
                }
            });

            while let Ok(action) = actions_rx.recv() {
                match action {
                    Action::Ping(payload) => {
                        write_frame(&mut stream, &Frame::new(Opcode::Ping, payload)).unwrap();
                    }
                    Action::Close => {
                        let close = json!({"code": 1000, "message": "bye"});
                        let _ = write_frame(&mut stream, &Frame::new(Opcode::Close, close));
                        let _ = stream.shutdown(std::net::Shutdown::Both);
                        return;
                    }
                }
            }
        });

        Self {
            _dir: dir,
            path,
            frames,
            actions,
            handle: Some(handle),
        }
    }

    fn factory(&self) -> Box<IpcTransportFactory> {
        Box::new(IpcTransportFactory::with_socket_paths(vec![self.path.clone()]))
    }

    fn next_frame(&self) -> Frame {
        self.frames.recv_timeout(WAIT).unwrap()
    }

    fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

fn signal_channel() -> (SignalSink, Receiver<TransportSignal>) {
    let (tx, rx) = mpsc::channel();
    let sink: SignalSink = Arc::new(move |signal: TransportSignal| {
        let _ = tx.send(signal);
    });
    (sink, rx)
}

fn manager(service: &FakeService, signals: SignalSink) -> ConnectionManager {
    ConnectionManager::new(service.factory(), "1234", signals, Arc::new(LogNotifier))
}

fn sample_activity() -> ActivityPayload {
    ActivityPayload {
        details: Some("Editing: Today".to_string()),
        state: None,
        large_image_key: "vault_logo".to_string(),
        large_image_text: "Vault".to_string(),
        small_image_key: "note".to_string(),
        small_image_text: "Taking notes".to_string(),
        start_timestamp: 1_700_000_000,
        buttons: None,
        instance: false,
    }
}

#[test]
fn handshake_then_set_activity_and_clear() {
    let service = FakeService::start(Reply::Ready);
    let (signals, rx) = signal_channel();
    let mut connection = manager(&service, signals);

    assert!(connection.connect(Arc::new(|| {}), Box::new(|| {})));
    assert_eq!(connection.state(), ConnectionState::Ready);
    let ready = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(ready, TransportSignal::ready(connection.session()));

    let handshake = service.next_frame();
    assert_eq!(handshake.opcode, Opcode::Handshake);
    assert_eq!(handshake.payload["v"], 1);
    assert_eq!(handshake.payload["client_id"], "1234");

    connection.set_activity(&sample_activity());
    let command = service.next_frame();
    assert_eq!(command.opcode, Opcode::Frame);
    assert_eq!(command.payload["cmd"], CMD_SET_ACTIVITY);
    assert_eq!(command.payload["args"]["pid"], std::process::id());
    let activity = &command.payload["args"]["activity"];
    assert_eq!(activity["details"], "Editing: Today");
    assert!(activity.get("state").is_none());
    assert_eq!(activity["timestamps"]["start"], 1_700_000_000);
    assert_eq!(activity["assets"]["large_image"], "vault_logo");
    assert!(command.payload["nonce"].is_string());

    connection.disconnect();
    let clear = service.next_frame();
    assert_eq!(clear.payload["cmd"], CMD_SET_ACTIVITY);
    assert!(clear.payload["args"]["activity"].is_null());
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[test]
fn overlong_note_name_is_sent_truncated() {
    let service = FakeService::start(Reply::Ready);
    let (signals, _rx) = signal_channel();
    let mut connection = manager(&service, signals);
    assert!(connection.connect(Arc::new(|| {}), Box::new(|| {})));
    let _handshake = service.next_frame();

    let mut activity = sample_activity();
    activity.details = Some(format!("Editing: {}", "n".repeat(300)));
    connection.set_activity(&activity);

    let command = service.next_frame();
    let details = command.payload["args"]["activity"]["details"]
        .as_str()
        .unwrap();
    assert_eq!(details.chars().count(), MAX_TEXT_CHARS);
    assert!(details.starts_with("Editing: nnn"));

    connection.disconnect();
}

#[test]
fn rejected_handshake_fails_connect() {
    let service = FakeService::start(Reply::Reject {
        code: 4000,
        message: "Invalid Client ID",
    });
    let (signals, rx) = signal_channel();
    let mut connection = manager(&service, signals);

    assert!(!connection.connect(Arc::new(|| {}), Box::new(|| {})));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert!(!connection.has_refresh_timer());
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    service.join();
}

#[test]
fn service_close_posts_disconnected_for_current_session() {
    let service = FakeService::start(Reply::Ready);
    let (signals, rx) = signal_channel();
    let mut connection = manager(&service, signals);
    assert!(connection.connect(Arc::new(|| {}), Box::new(|| {})));
    let _handshake = service.next_frame();
    assert_eq!(rx.recv_timeout(WAIT).unwrap().kind, SignalKind::Ready);

    service.actions.send(Action::Close).unwrap();
    let signal = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(signal.kind, SignalKind::Disconnected);
    assert_eq!(signal.session, connection.session());

    connection.handle_signal(signal);
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert!(!connection.has_refresh_timer());
    service.join();
}

#[test]
fn reader_answers_ping_with_pong() {
    let service = FakeService::start(Reply::Ready);
    let (signals, _rx) = signal_channel();
    let mut connection = manager(&service, signals);
    assert!(connection.connect(Arc::new(|| {}), Box::new(|| {})));
    let _handshake = service.next_frame();

    service
        .actions
        .send(Action::Ping(json!({"seq": 7})))
        .unwrap();
    let pong = service.next_frame();
    assert_eq!(pong.opcode, Opcode::Pong);
    assert_eq!(pong.payload["seq"], 7);

    connection.disconnect();
}

#[test]
fn missing_socket_fails_connect() {
    let dir = tempfile::tempdir_in("/tmp").unwrap();
    let factory = IpcTransportFactory::with_socket_paths(vec![dir.path().join("discord-ipc-0")]);
    let (signals, _rx) = signal_channel();
    let mut connection =
        ConnectionManager::new(Box::new(factory), "1234", signals, Arc::new(LogNotifier));

    assert!(!connection.connect(Arc::new(|| {}), Box::new(|| {})));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}
