//! Scripted engines for testing.
//!
//! Both mocks decide from the first sample of each frame, so a test can build
//! a sample stream with markers at frame boundaries and then deliver it in any
//! chunking it likes.

use crate::defaults;
use crate::engine::{
    EngineProvider, Inference, IntentEngine, IntentSettings, WakeWordEngine, WakeWordSettings,
};
use crate::error::{Result, WakegateError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// First sample of a frame that makes [`MockWakeWordEngine`] fire.
pub const WAKE_MARKER: i16 = 0x7ead;

/// First sample of a frame that makes [`MockIntentEngine`] finalize with the
/// configured intent.
pub const UNDERSTOOD_MARKER: i16 = 0x1a7e;

/// First sample of a frame that makes [`MockIntentEngine`] finalize without
/// understanding.
pub const REJECT_MARKER: i16 = -0x1a7e;

/// Counts inference leases handed out and returned.
#[derive(Debug, Default)]
pub struct LeaseTracker {
    issued: AtomicUsize,
    released: AtomicUsize,
}

impl LeaseTracker {
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Leases handed out but not yet released.
    pub fn outstanding(&self) -> usize {
        self.issued() - self.released()
    }
}

/// Mock wake word engine for testing
#[derive(Debug, Clone)]
pub struct MockWakeWordEngine {
    frame_length: usize,
    sample_rate: u32,
    calls: usize,
    fail_on_call: Option<usize>,
}

impl MockWakeWordEngine {
    pub fn new() -> Self {
        Self {
            frame_length: defaults::FRAME_LENGTH,
            sample_rate: defaults::SAMPLE_RATE,
            calls: 0,
            fail_on_call: None,
        }
    }

    pub fn with_frame_length(mut self, frame_length: usize) -> Self {
        self.frame_length = frame_length;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Configure the mock to fail on the n-th call to `process` (1-based)
    pub fn with_failure_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Number of frames processed so far
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Default for MockWakeWordEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeWordEngine for MockWakeWordEngine {
    fn process(&mut self, frame: &[i16]) -> Result<bool> {
        self.calls += 1;
        if self.fail_on_call == Some(self.calls) {
            return Err(WakegateError::Engine {
                engine: "wake word",
                message: "mock wake word failure".to_string(),
            });
        }
        Ok(frame.first() == Some(&WAKE_MARKER))
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn version(&self) -> String {
        "mock-wake-1.0".to_string()
    }
}

/// Mock intent engine for testing
#[derive(Debug, Clone)]
pub struct MockIntentEngine {
    frame_length: usize,
    sample_rate: u32,
    intent: String,
    slots: Vec<(String, String)>,
    timeout_frames: Option<usize>,
    fail_on_call: Option<usize>,
    fail_take: bool,
    calls: usize,
    frames_in_utterance: usize,
    finalized: Option<bool>,
    leases: Arc<LeaseTracker>,
}

impl MockIntentEngine {
    pub fn new() -> Self {
        Self {
            frame_length: defaults::FRAME_LENGTH,
            sample_rate: defaults::SAMPLE_RATE,
            intent: "mockIntent".to_string(),
            slots: Vec::new(),
            timeout_frames: None,
            fail_on_call: None,
            fail_take: false,
            calls: 0,
            frames_in_utterance: 0,
            finalized: None,
            leases: Arc::new(LeaseTracker::default()),
        }
    }

    pub fn with_frame_length(mut self, frame_length: usize) -> Self {
        self.frame_length = frame_length;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Configure the intent reported for understood utterances
    pub fn with_intent(mut self, intent: &str, slots: &[(&str, &str)]) -> Self {
        self.intent = intent.to_string();
        self.slots = slots
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    /// Finalize as not understood after this many frames without a marker
    pub fn with_timeout_frames(mut self, frames: usize) -> Self {
        self.timeout_frames = Some(frames);
        self
    }

    /// Configure the mock to fail on the n-th call to `process` (1-based)
    pub fn with_failure_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Configure `take_inference` to fail
    pub fn with_take_failure(mut self) -> Self {
        self.fail_take = true;
        self
    }

    /// Shared lease counter; grab it before boxing the engine
    pub fn lease_tracker(&self) -> Arc<LeaseTracker> {
        Arc::clone(&self.leases)
    }

    /// Number of frames processed so far
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Default for MockIntentEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentEngine for MockIntentEngine {
    fn process(&mut self, frame: &[i16]) -> Result<bool> {
        self.calls += 1;
        if self.fail_on_call == Some(self.calls) {
            return Err(WakegateError::Engine {
                engine: "intent",
                message: "mock intent failure".to_string(),
            });
        }

        self.frames_in_utterance += 1;
        self.finalized = match frame.first() {
            Some(&UNDERSTOOD_MARKER) => Some(true),
            Some(&REJECT_MARKER) => Some(false),
            _ if self.timeout_frames == Some(self.frames_in_utterance) => Some(false),
            _ => None,
        };
        Ok(self.finalized.is_some())
    }

    fn take_inference(&mut self) -> Result<Inference> {
        if self.fail_take {
            return Err(WakegateError::Engine {
                engine: "intent",
                message: "mock inference failure".to_string(),
            });
        }
        let understood = self
            .finalized
            .take()
            .ok_or_else(|| WakegateError::invalid_state("inference is not finalized"))?;
        self.frames_in_utterance = 0;

        let inference = if understood {
            Inference::understood(self.intent.clone(), self.slots.clone())
        } else {
            Inference::not_understood()
        };

        self.leases.issued.fetch_add(1, Ordering::SeqCst);
        let leases = Arc::clone(&self.leases);
        Ok(inference.with_release(move || {
            leases.released.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn context_info(&self) -> String {
        format!("mock context: {}", self.intent)
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn version(&self) -> String {
        "mock-intent-1.0".to_string()
    }
}

/// Provider handing out clones of preconfigured mock engines.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    wake_word: MockWakeWordEngine,
    intent: MockIntentEngine,
    seen: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    pub fn new(wake_word: MockWakeWordEngine, intent: MockIntentEngine) -> Self {
        Self {
            wake_word,
            intent,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Debug renderings of every settings value the provider was asked to use
    pub fn settings_seen(&self) -> Vec<String> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    fn record(&self, entry: String) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(entry);
        }
    }
}

impl EngineProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn wake_word(&self, settings: &WakeWordSettings) -> Result<Box<dyn WakeWordEngine>> {
        self.record(format!("{:?}", settings));
        Ok(Box::new(self.wake_word.clone()))
    }

    fn intent(&self, settings: &IntentSettings) -> Result<Box<dyn IntentEngine>> {
        self.record(format!("{:?}", settings));
        Ok(Box::new(self.intent.clone()))
    }
}
