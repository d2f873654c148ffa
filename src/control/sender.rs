//! Outbound control lines.

use crate::control::message::{MessageCode, encode_line};
use crate::engine::Inference;
use crate::error::Result;
use std::io::Write;

/// Writes framed lines to a byte transport.
///
/// Fire-and-forget: each line is written and flushed synchronously, with no
/// acknowledgement and no retry.
#[derive(Debug)]
pub struct MessageSender<T: Write> {
    transport: T,
    lines_sent: u64,
}

impl<T: Write> MessageSender<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            lines_sent: 0,
        }
    }

    pub fn send(&mut self, code: MessageCode, message: &str) -> Result<()> {
        self.transport
            .write_all(encode_line(code, message).as_bytes())?;
        self.transport.flush()?;
        self.lines_sent += 1;
        Ok(())
    }

    pub fn send_handshake(&mut self, version: &str) -> Result<()> {
        self.send(MessageCode::Handshake, version)
    }

    pub fn send_info(&mut self, message: &str) -> Result<()> {
        self.send(MessageCode::Info, message)
    }

    pub fn send_wake(&mut self) -> Result<()> {
        self.send(MessageCode::WakeDetected, "Wake word detected!")
    }

    pub fn send_inference(&mut self, inference: &Inference) -> Result<()> {
        self.send(MessageCode::Inference, &format_inference(inference))
    }

    pub fn send_context(&mut self, context: &str) -> Result<()> {
        self.send(MessageCode::Context, context)
    }

    pub fn send_sensitivity(&mut self, wake: f32, inference: f32) -> Result<()> {
        self.send(
            MessageCode::Sensitivity,
            &format!("wake:{:.2};inference:{:.2}", wake, inference),
        )
    }

    /// Bytes as space-separated lowercase hex pairs.
    pub fn send_device_id(&mut self, id: &[u8]) -> Result<()> {
        let hex = id
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");
        self.send(MessageCode::DeviceId, &hex)
    }

    /// Busy share as a percentage with two decimals.
    pub fn send_cpu_usage(&mut self, ratio: f64) -> Result<()> {
        self.send(MessageCode::CpuUsage, &format!("{:.2}%", ratio * 100.0))
    }

    /// RMS level as a percentage of full scale.
    pub fn send_volume(&mut self, level: f32) -> Result<()> {
        self.send(MessageCode::Volume, &format!("{:.0}", level * 100.0))
    }

    /// Samples as space-separated 4-digit hex words (two's complement).
    pub fn send_audio(&mut self, samples: &[i16]) -> Result<()> {
        let mut line = String::with_capacity(samples.len() * 5);
        for (i, sample) in samples.iter().enumerate() {
            if i > 0 {
                line.push(' ');
            }
            line.push_str(&format!("{:04x}", *sample as u16));
        }
        self.send(MessageCode::AudioDump, &line)
    }

    pub fn send_error(&mut self, message: &str) -> Result<()> {
        self.send(MessageCode::Error, message)
    }

    pub fn lines_sent(&self) -> u64 {
        self.lines_sent
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

/// `is_understood:true;intent:<name>;<slot>:<value>...` or
/// `is_understood:false`.
pub fn format_inference(inference: &Inference) -> String {
    if !inference.understood {
        return "is_understood:false".to_string();
    }
    let mut line = format!(
        "is_understood:true;intent:{}",
        inference.intent.as_deref().unwrap_or("")
    );
    for (slot, value) in &inference.slots {
        line.push_str(&format!(";{}:{}", slot, value));
    }
    line
}
