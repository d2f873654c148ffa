//! Two-stage trigger orchestration.
//!
//! While listening, every frame goes to the wake word engine. A detection
//! switches to inferring, where every frame goes to the intent engine until it
//! finalizes. Each frame is processed by exactly one engine.

use crate::config::EngineConfig;
use crate::defaults;
use crate::engine::{
    EngineProvider, Inference, IntentEngine, IntentSettings, WakeWordEngine, WakeWordSettings,
};
use crate::error::{Result, WakegateError};
use std::path::PathBuf;
use tracing::{debug, error, info};

/// Which engine receives the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Listening,
    Inferring,
}

/// Routes frames between the wake word engine and the intent engine.
///
/// Callbacks run synchronously on the thread calling [`Orchestrator::process`].
/// The inference callback takes ownership of the [`Inference`]; dropping it
/// hands engine storage back.
pub struct Orchestrator<W, I>
where
    W: FnMut(),
    I: FnMut(Inference),
{
    wake_word: Box<dyn WakeWordEngine>,
    intent: Box<dyn IntentEngine>,
    wake_word_callback: W,
    inference_callback: I,
    phase: Phase,
    frame_length: usize,
    sample_rate: u32,
    failed: bool,
    frames_processed: u64,
    triggers: u64,
}

impl<W, I> Orchestrator<W, I>
where
    W: FnMut(),
    I: FnMut(Inference),
{
    /// Wire two ready engines together.
    ///
    /// # Errors
    /// `InvalidArgument` if the engines disagree on frame length or sample rate.
    pub fn new(
        wake_word: Box<dyn WakeWordEngine>,
        intent: Box<dyn IntentEngine>,
        wake_word_callback: W,
        inference_callback: I,
    ) -> Result<Self> {
        if wake_word.frame_length() != intent.frame_length() {
            return Err(WakegateError::invalid_argument(format!(
                "wake word frame length {} does not match intent frame length {}",
                wake_word.frame_length(),
                intent.frame_length()
            )));
        }
        if wake_word.sample_rate() != intent.sample_rate() {
            return Err(WakegateError::invalid_argument(format!(
                "wake word sample rate {} does not match intent sample rate {}",
                wake_word.sample_rate(),
                intent.sample_rate()
            )));
        }
        if wake_word.frame_length() == 0 {
            return Err(WakegateError::invalid_argument(
                "engines report a zero frame length",
            ));
        }

        let frame_length = wake_word.frame_length();
        let sample_rate = wake_word.sample_rate();

        Ok(Self {
            wake_word,
            intent,
            wake_word_callback,
            inference_callback,
            phase: Phase::Listening,
            frame_length,
            sample_rate,
            failed: false,
            frames_processed: 0,
            triggers: 0,
        })
    }

    /// Route one frame to the engine for the current phase.
    ///
    /// # Errors
    /// `InvalidArgument` if the frame has the wrong length; the frame is not
    /// consumed. Engine failures are returned unchanged, after which the
    /// orchestrator refuses further frames with `InvalidState`.
    pub fn process(&mut self, frame: &[i16]) -> Result<()> {
        if self.failed {
            return Err(WakegateError::invalid_state(
                "orchestrator stopped after an engine failure",
            ));
        }
        if frame.len() != self.frame_length {
            return Err(WakegateError::invalid_argument(format!(
                "frame has {} samples, engines expect {}",
                frame.len(),
                self.frame_length
            )));
        }

        let outcome = self.route(frame);
        if let Err(e) = &outcome {
            error!(phase = ?self.phase, "engine failed: {}", e);
            self.failed = true;
        }
        outcome
    }

    fn route(&mut self, frame: &[i16]) -> Result<()> {
        self.frames_processed += 1;

        match self.phase {
            Phase::Listening => {
                if self.wake_word.process(frame)? {
                    self.phase = Phase::Inferring;
                    self.triggers += 1;
                    debug!(frame = self.frames_processed, "wake word detected");
                    (self.wake_word_callback)();
                }
            }
            Phase::Inferring => {
                if self.intent.process(frame)? {
                    self.phase = Phase::Listening;
                    let inference = self.intent.take_inference()?;
                    debug!(
                        frame = self.frames_processed,
                        understood = inference.understood,
                        "inference finalized"
                    );
                    (self.inference_callback)(inference);
                }
            }
        }

        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames accepted so far.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Wake word detections so far.
    pub fn triggers(&self) -> u64 {
        self.triggers
    }

    /// Context description reported by the intent engine.
    pub fn context_info(&self) -> String {
        self.intent.context_info()
    }

    /// Library version followed by both engine versions.
    pub fn version(&self) -> String {
        format!(
            "{} (wake word {}, intent {})",
            crate::version_string(),
            self.wake_word.version(),
            self.intent.version()
        )
    }
}

/// Collects parameters and creates both engines through a provider.
pub struct OrchestratorBuilder<'p, W, I>
where
    W: FnMut(),
    I: FnMut(Inference),
{
    provider: &'p dyn EngineProvider,
    wake_word_callback: W,
    inference_callback: I,
    keyword_path: Option<PathBuf>,
    context_path: Option<PathBuf>,
    wake_sensitivity: f32,
    inference_sensitivity: f32,
    endpoint_duration_sec: f32,
    require_endpoint: bool,
}

impl<'p, W, I> OrchestratorBuilder<'p, W, I>
where
    W: FnMut(),
    I: FnMut(Inference),
{
    pub fn new(provider: &'p dyn EngineProvider, wake_word_callback: W, inference_callback: I) -> Self {
        Self {
            provider,
            wake_word_callback,
            inference_callback,
            keyword_path: None,
            context_path: None,
            wake_sensitivity: defaults::WAKE_SENSITIVITY,
            inference_sensitivity: defaults::INFERENCE_SENSITIVITY,
            endpoint_duration_sec: defaults::ENDPOINT_DURATION_SEC,
            require_endpoint: defaults::REQUIRE_ENDPOINT,
        }
    }

    /// Take every engine parameter from the `[engine]` configuration section.
    pub fn with_config(self, config: &EngineConfig) -> Self {
        Self {
            keyword_path: config.keyword_path.clone(),
            context_path: config.context_path.clone(),
            wake_sensitivity: config.wake_sensitivity,
            inference_sensitivity: config.inference_sensitivity,
            endpoint_duration_sec: config.endpoint_duration_sec,
            require_endpoint: config.require_endpoint,
            ..self
        }
    }

    pub fn keyword_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.keyword_path = Some(path.into());
        self
    }

    pub fn context_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.context_path = Some(path.into());
        self
    }

    pub fn wake_sensitivity(mut self, sensitivity: f32) -> Self {
        self.wake_sensitivity = sensitivity;
        self
    }

    pub fn inference_sensitivity(mut self, sensitivity: f32) -> Self {
        self.inference_sensitivity = sensitivity;
        self
    }

    pub fn endpoint_duration_sec(mut self, seconds: f32) -> Self {
        self.endpoint_duration_sec = seconds;
        self
    }

    pub fn require_endpoint(mut self, require: bool) -> Self {
        self.require_endpoint = require;
        self
    }

    /// Create both engines and the orchestrator.
    ///
    /// # Errors
    /// `InvalidArgument` for out-of-range parameters or mismatched engines;
    /// provider errors are passed through.
    pub fn init(self) -> Result<Orchestrator<W, I>> {
        for (name, value) in [
            ("wake word sensitivity", self.wake_sensitivity),
            ("inference sensitivity", self.inference_sensitivity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(WakegateError::invalid_argument(format!(
                    "{} {} is outside [0, 1]",
                    name, value
                )));
            }
        }
        if !(self.endpoint_duration_sec.is_finite() && self.endpoint_duration_sec > 0.0) {
            return Err(WakegateError::invalid_argument(format!(
                "endpoint duration {} must be finite and positive",
                self.endpoint_duration_sec
            )));
        }

        let wake_word = self.provider.wake_word(&WakeWordSettings {
            keyword_path: self.keyword_path,
            sensitivity: self.wake_sensitivity,
        })?;
        let intent = self.provider.intent(&IntentSettings {
            context_path: self.context_path,
            sensitivity: self.inference_sensitivity,
            endpoint_duration_sec: self.endpoint_duration_sec,
            require_endpoint: self.require_endpoint,
        })?;

        let orchestrator = Orchestrator::new(
            wake_word,
            intent,
            self.wake_word_callback,
            self.inference_callback,
        )?;
        info!(
            provider = self.provider.name(),
            frame_length = orchestrator.frame_length(),
            sample_rate = orchestrator.sample_rate(),
            "orchestrator ready"
        );
        Ok(orchestrator)
    }
}
