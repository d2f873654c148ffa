use crate::defaults;
use crate::error::{Result, WakegateError};
use std::collections::VecDeque;

/// Trait for audio delivery backends.
///
/// One implementation per capture backend (file replay, cpal microphone,
/// mock). Deliveries may have any size; the frame assembler downstream
/// re-slices them.
pub trait AudioSource: Send {
    /// Start delivering audio.
    fn start(&mut self) -> Result<()>;

    /// Stop delivering audio.
    fn stop(&mut self) -> Result<()>;

    /// Read the samples delivered since the last call.
    ///
    /// An empty vector means nothing is available right now; for a finite
    /// source it means the stream is exhausted.
    fn read_samples(&mut self) -> Result<Vec<i16>>;

    /// Sample rate of the delivered audio in Hz.
    fn sample_rate(&self) -> u32;

    /// Whether the source ends on its own (file) or runs until stopped (mic).
    fn is_finite(&self) -> bool {
        false
    }
}

/// Mock audio source for testing.
///
/// Either repeats one block forever, or plays a scripted list of deliveries
/// once and then reports exhaustion.
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    samples: Vec<i16>,
    script: Option<VecDeque<Vec<i16>>>,
    sample_rate: u32,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Create a new mock audio source with default settings
    pub fn new() -> Self {
        Self {
            is_started: false,
            samples: vec![0i16; 160],
            script: None,
            sample_rate: defaults::SAMPLE_RATE,
            should_fail_start: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Configure the mock to return the same block on every read
    pub fn with_samples(mut self, samples: Vec<i16>) -> Self {
        self.samples = samples;
        self
    }

    /// Configure a finite list of deliveries, returned in order
    pub fn with_deliveries(mut self, deliveries: Vec<Vec<i16>>) -> Self {
        self.script = Some(deliveries.into());
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }

    fn failure(&self) -> WakegateError {
        WakegateError::AudioCapture {
            message: self.error_message.clone(),
        }
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(self.failure());
        }
        self.is_started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(self.failure());
        }
        match self.script.as_mut() {
            Some(script) => Ok(script.pop_front().unwrap_or_default()),
            None => Ok(self.samples.clone()),
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_finite(&self) -> bool {
        self.script.is_some()
    }
}
