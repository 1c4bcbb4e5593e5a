//! IPC wire types for the local chat-client presence service.
//!
//! Shared by the transport and by test fakes so both sides agree on framing.
//! Every frame is a little-endian `u32` opcode, a little-endian `u32` body
//! length, then a UTF-8 JSON body.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Read, Write};

pub const HANDSHAKE_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 8;
pub const MAX_FRAME_BYTES: usize = 64 * 1024;
pub const MAX_TEXT_CHARS: usize = 128;
pub const MAX_BUTTON_LABEL_CHARS: usize = 32;
pub const MAX_BUTTONS: usize = 2;

pub const CMD_DISPATCH: &str = "DISPATCH";
pub const CMD_SET_ACTIVITY: &str = "SET_ACTIVITY";
pub const EVT_READY: &str = "READY";
pub const EVT_ERROR: &str = "ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Handshake,
    Frame,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    pub fn as_u32(self) -> u32 {
        match self {
            Opcode::Handshake => 0,
            Opcode::Frame => 1,
            Opcode::Close => 2,
            Opcode::Ping => 3,
            Opcode::Pong => 4,
        }
    }

    pub fn from_u32(value: u32) -> Result<Self, FrameError> {
        match value {
            0 => Ok(Opcode::Handshake),
            1 => Ok(Opcode::Frame),
            2 => Ok(Opcode::Close),
            3 => Ok(Opcode::Ping),
            4 => Ok(Opcode::Pong),
            other => Err(FrameError::UnknownOpcode(other)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame body of {0} bytes exceeds maximum of {max}", max = MAX_FRAME_BYTES)]
    TooLarge(usize),

    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unknown opcode {0}")]
    UnknownOpcode(u32),

    #[error("frame body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("frame I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One decoded IPC frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub opcode: Opcode,
    pub payload: Value,
}

impl Frame {
    pub fn new(opcode: Opcode, payload: Value) -> Self {
        Self { opcode, payload }
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let body = serde_json::to_vec(&self.payload).map_err(FrameError::InvalidJson)?;
        if body.len() > MAX_FRAME_BYTES {
            return Err(FrameError::TooLarge(body.len()));
        }

        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
        bytes.extend_from_slice(&self.opcode.as_u32().to_le_bytes());
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Decodes a complete frame from a byte slice (header plus body).
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::Truncated {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let (opcode, len) = decode_header(&bytes[..HEADER_LEN])?;
        let body = &bytes[HEADER_LEN..];
        if body.len() < len {
            return Err(FrameError::Truncated {
                expected: len,
                actual: body.len(),
            });
        }
        decode_body(opcode, &body[..len])
    }
}

fn decode_header(header: &[u8]) -> Result<(Opcode, usize), FrameError> {
    let mut opcode_bytes = [0u8; 4];
    let mut len_bytes = [0u8; 4];
    opcode_bytes.copy_from_slice(&header[..4]);
    len_bytes.copy_from_slice(&header[4..HEADER_LEN]);

    let opcode = Opcode::from_u32(u32::from_le_bytes(opcode_bytes))?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(FrameError::TooLarge(len));
    }
    Ok((opcode, len))
}

fn decode_body(opcode: Opcode, body: &[u8]) -> Result<Frame, FrameError> {
    let payload = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body).map_err(FrameError::InvalidJson)?
    };
    Ok(Frame { opcode, payload })
}

/// Blocks until one full frame has been read.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame, FrameError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header)?;
    let (opcode, len) = decode_header(&header)?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    decode_body(opcode, &body)
}

pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<(), FrameError> {
    let bytes = frame.encode()?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Envelopes
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Handshake {
    pub v: u32,
    pub client_id: String,
}

impl Handshake {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            v: HANDSHAKE_VERSION,
            client_id: client_id.into(),
        }
    }

    pub fn to_frame(&self) -> Frame {
        Frame::new(Opcode::Handshake, serde_json::json!(self))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetActivityArgs {
    pub pid: u32,
    /// `None` serializes as `null`, which clears the remote activity.
    pub activity: Option<WireActivity>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommandRequest {
    pub cmd: String,
    pub args: SetActivityArgs,
    pub nonce: String,
}

impl CommandRequest {
    pub fn set_activity(pid: u32, activity: Option<WireActivity>, nonce: String) -> Self {
        Self {
            cmd: CMD_SET_ACTIVITY.to_string(),
            args: SetActivityArgs { pid, activity },
            nonce,
        }
    }

    pub fn to_frame(&self) -> Frame {
        Frame::new(Opcode::Frame, serde_json::json!(self))
    }
}

/// Any message received from the service on an `Opcode::Frame`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default)]
    pub evt: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub nonce: Option<String>,
}

impl IncomingMessage {
    pub fn parse(payload: &Value) -> Self {
        serde_json::from_value(payload.clone()).unwrap_or_default()
    }

    pub fn is_ready(&self) -> bool {
        self.cmd.as_deref() == Some(CMD_DISPATCH) && self.evt.as_deref() == Some(EVT_READY)
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        if self.evt.as_deref() != Some(EVT_ERROR) {
            return None;
        }
        Some(
            self.data
                .as_ref()
                .map(ErrorInfo::from_payload)
                .unwrap_or_else(|| ErrorInfo::new(0, "unknown error")),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorInfo {
    pub code: i64,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Reads `{code, message}` leniently; close frames are not always well formed.
    pub fn from_payload(payload: &Value) -> Self {
        let code = payload.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("connection closed")
            .to_string();
        Self { code, message }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Activity
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ActivityButton {
    pub label: String,
    pub url: String,
}

/// The presence message handed to the transport. Built fresh per synthesis
/// and never mutated afterwards.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub large_image_key: String,
    pub large_image_text: String,
    pub small_image_key: String,
    pub small_image_text: String,
    /// Seconds since the Unix epoch.
    pub start_timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<ActivityButton>>,
    pub instance: bool,
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

impl ActivityPayload {
    /// Copy with text fields and button labels cut to the service limits, so
    /// an overlong note name still produces an update.
    pub fn truncated(&self) -> Self {
        let clip = |text: &Option<String>| {
            text.as_deref()
                .map(|text| truncate_chars(text, MAX_TEXT_CHARS))
        };
        Self {
            details: clip(&self.details),
            state: clip(&self.state),
            buttons: self.buttons.as_ref().map(|buttons| {
                buttons
                    .iter()
                    .map(|button| ActivityButton {
                        label: truncate_chars(&button.label, MAX_BUTTON_LABEL_CHARS),
                        url: button.url.clone(),
                    })
                    .collect()
            }),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        for (field, value) in [("details", &self.details), ("state", &self.state)] {
            if let Some(text) = value {
                if text.chars().count() > MAX_TEXT_CHARS {
                    return Err(ErrorInfo::new(
                        0,
                        format!("{} must be {} characters or fewer", field, MAX_TEXT_CHARS),
                    ));
                }
            }
        }

        if let Some(buttons) = &self.buttons {
            if buttons.len() > MAX_BUTTONS {
                return Err(ErrorInfo::new(
                    0,
                    format!("at most {} buttons are allowed", MAX_BUTTONS),
                ));
            }
            for button in buttons {
                if button.label.trim().is_empty() || button.url.trim().is_empty() {
                    return Err(ErrorInfo::new(0, "button label and url are required"));
                }
                if button.label.chars().count() > MAX_BUTTON_LABEL_CHARS {
                    return Err(ErrorInfo::new(
                        0,
                        format!(
                            "button label must be {} characters or fewer",
                            MAX_BUTTON_LABEL_CHARS
                        ),
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn to_wire(&self) -> WireActivity {
        WireActivity {
            details: self.details.clone(),
            state: self.state.clone(),
            timestamps: WireTimestamps {
                start: self.start_timestamp,
            },
            assets: WireAssets {
                large_image: self.large_image_key.clone(),
                large_text: self.large_image_text.clone(),
                small_image: self.small_image_key.clone(),
                small_text: self.small_image_text.clone(),
            },
            buttons: self.buttons.clone(),
            instance: self.instance,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WireActivity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub timestamps: WireTimestamps,
    pub assets: WireAssets,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<ActivityButton>>,
    pub instance: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WireTimestamps {
    pub start: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WireAssets {
    pub large_image: String,
    pub large_text: String,
    pub small_image: String,
    pub small_text: String,
}
