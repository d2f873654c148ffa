//! Control-channel message codes and line framing.
//!
//! Every line is `"[NN] payload\r\n"` with a two-digit, zero-padded code.

use crate::defaults::MESSAGE_HEADER_LEN;
use crate::error::{Result, WakegateError};
use serde::Serialize;
use std::fmt;

/// Message kinds, contiguous from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MessageCode {
    Handshake = 0,
    Info = 1,
    Context = 2,
    WakeDetected = 3,
    Inference = 4,
    Sensitivity = 5,
    DeviceId = 6,
    CpuUsage = 7,
    Volume = 8,
    AudioDump = 9,
    Error = 10,
}

impl MessageCode {
    pub const ALL: [MessageCode; 11] = [
        MessageCode::Handshake,
        MessageCode::Info,
        MessageCode::Context,
        MessageCode::WakeDetected,
        MessageCode::Inference,
        MessageCode::Sensitivity,
        MessageCode::DeviceId,
        MessageCode::CpuUsage,
        MessageCode::Volume,
        MessageCode::AudioDump,
        MessageCode::Error,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageCode::Handshake => "HANDSHAKE",
            MessageCode::Info => "INFO",
            MessageCode::Context => "CONTEXT",
            MessageCode::WakeDetected => "WAKE_WORD_DETECTED",
            MessageCode::Inference => "INFERENCE",
            MessageCode::Sensitivity => "SENSITIVITY",
            MessageCode::DeviceId => "DEVICE_ID",
            MessageCode::CpuUsage => "CPU_USAGE",
            MessageCode::Volume => "VOLUME",
            MessageCode::AudioDump => "AUDIO_DUMP",
            MessageCode::Error => "ERROR",
        }
    }
}

impl TryFrom<u8> for MessageCode {
    type Error = WakegateError;

    fn try_from(code: u8) -> Result<Self> {
        Self::from_code(code).ok_or_else(|| {
            WakegateError::invalid_argument(format!("unknown message code {:02}", code))
        })
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlMessage {
    pub code: MessageCode,
    pub payload: String,
}

impl ControlMessage {
    pub fn new(code: MessageCode, payload: impl Into<String>) -> Self {
        Self {
            code,
            payload: payload.into(),
        }
    }

    /// Wire form including the line terminator.
    pub fn encode(&self) -> String {
        encode_line(self.code, &self.payload)
    }
}

/// Frame one outbound line.
pub fn encode_line(code: MessageCode, payload: &str) -> String {
    format!("[{:02}] {}\r\n", code.code(), payload)
}

/// Parse one receive record.
///
/// The payload is cut at the first CR, LF or NUL and truncated to
/// `capacity` bytes.
///
/// # Errors
/// `InvalidArgument` for a short record, a broken header or an unknown code.
pub fn parse_record(raw: &[u8], capacity: usize) -> Result<ControlMessage> {
    if raw.len() < MESSAGE_HEADER_LEN {
        return Err(WakegateError::invalid_argument(format!(
            "record of {} bytes is shorter than the header",
            raw.len()
        )));
    }
    if raw[0] != b'[' || raw[3] != b']' || raw[4] != b' ' {
        return Err(WakegateError::invalid_argument("malformed message header"));
    }

    let (tens, ones) = (raw[1], raw[2]);
    if !tens.is_ascii_digit() || !ones.is_ascii_digit() {
        return Err(WakegateError::invalid_argument(
            "message code is not two decimal digits",
        ));
    }
    let code = MessageCode::try_from((tens - b'0') * 10 + (ones - b'0'))?;

    let body = &raw[MESSAGE_HEADER_LEN..];
    let end = body
        .iter()
        .position(|&b| matches!(b, b'\r' | b'\n' | 0))
        .unwrap_or(body.len())
        .min(capacity);
    let payload = String::from_utf8_lossy(&body[..end]).into_owned();

    Ok(ControlMessage { code, payload })
}
