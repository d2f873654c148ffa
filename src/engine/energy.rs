//! Energy-based reference engines.
//!
//! No keyword or language model: the wake trigger fires on sustained loud
//! audio and the intent engine only finds the end of the utterance. Every
//! inference is reported as not understood. Useful for wiring up a device,
//! checking levels and exercising the control channel before real models are
//! available.

use crate::defaults;
use crate::engine::{
    EngineProvider, Inference, IntentEngine, IntentSettings, WakeWordEngine, WakeWordSettings,
};
use crate::error::{Result, WakegateError};
use tracing::debug;

const VERSION: &str = "energy-1.0";

/// Loud audio needed before the wake trigger fires, in milliseconds.
const TRIGGER_MS: f32 = 100.0;

/// RMS level of 16-bit PCM samples, normalized to 0.0..=1.0.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Map a sensitivity in [0, 1] onto an RMS threshold.
///
/// 0.5 yields the base threshold, 1.0 halves it and 0.0 doubles it.
fn threshold_for(sensitivity: f32) -> f32 {
    defaults::ENERGY_THRESHOLD * 2f32.powf(1.0 - 2.0 * sensitivity)
}

fn frames_for(duration_ms: f32, frame_length: usize, sample_rate: u32) -> usize {
    let frame_ms = frame_length as f32 * 1000.0 / sample_rate as f32;
    ((duration_ms / frame_ms).ceil() as usize).max(1)
}

fn check_sensitivity(sensitivity: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&sensitivity) {
        return Err(WakegateError::invalid_argument(format!(
            "sensitivity {} is outside [0, 1]",
            sensitivity
        )));
    }
    Ok(())
}

/// Provider for the energy reference engines.
#[derive(Debug, Clone)]
pub struct EnergyProvider {
    frame_length: usize,
    sample_rate: u32,
}

impl EnergyProvider {
    pub fn new(frame_length: usize, sample_rate: u32) -> Result<Self> {
        if frame_length == 0 {
            return Err(WakegateError::invalid_argument(
                "frame length must be greater than zero",
            ));
        }
        if sample_rate == 0 {
            return Err(WakegateError::invalid_argument(
                "sample rate must be greater than zero",
            ));
        }
        Ok(Self {
            frame_length,
            sample_rate,
        })
    }
}

impl EngineProvider for EnergyProvider {
    fn name(&self) -> &'static str {
        "energy"
    }

    fn wake_word(&self, settings: &WakeWordSettings) -> Result<Box<dyn WakeWordEngine>> {
        if let Some(path) = &settings.keyword_path {
            debug!(path = %path.display(), "energy trigger ignores keyword model");
        }
        Ok(Box::new(EnergyWakeWord::new(
            self.frame_length,
            self.sample_rate,
            settings.sensitivity,
        )?))
    }

    fn intent(&self, settings: &IntentSettings) -> Result<Box<dyn IntentEngine>> {
        if let Some(path) = &settings.context_path {
            debug!(path = %path.display(), "endpoint engine ignores context model");
        }
        Ok(Box::new(EndpointIntent::new(
            self.frame_length,
            self.sample_rate,
            settings,
        )?))
    }
}

/// Fires after `TRIGGER_MS` of consecutive frames above the threshold.
#[derive(Debug, Clone)]
pub struct EnergyWakeWord {
    frame_length: usize,
    sample_rate: u32,
    threshold: f32,
    required_frames: usize,
    loud_frames: usize,
}

impl EnergyWakeWord {
    pub fn new(frame_length: usize, sample_rate: u32, sensitivity: f32) -> Result<Self> {
        check_sensitivity(sensitivity)?;
        Ok(Self {
            frame_length,
            sample_rate,
            threshold: threshold_for(sensitivity),
            required_frames: frames_for(TRIGGER_MS, frame_length, sample_rate),
            loud_frames: 0,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl WakeWordEngine for EnergyWakeWord {
    fn process(&mut self, frame: &[i16]) -> Result<bool> {
        if calculate_rms(frame) > self.threshold {
            self.loud_frames += 1;
        } else {
            self.loud_frames = 0;
        }

        if self.loud_frames >= self.required_frames {
            self.loud_frames = 0;
            return Ok(true);
        }
        Ok(false)
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn version(&self) -> String {
        VERSION.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UtteranceState {
    /// Waiting for the command to start.
    Waiting,
    /// Command audio is arriving.
    Speaking,
    /// Quiet after speech, counting toward the endpoint.
    Trailing,
}

/// Finds the end of a spoken command.
///
/// Finalizes once `endpoint_duration_sec` of quiet follows speech, or when
/// the utterance budget runs out. With `require_endpoint` off, the first
/// quiet frame after speech ends the utterance.
#[derive(Debug, Clone)]
pub struct EndpointIntent {
    frame_length: usize,
    sample_rate: u32,
    threshold: f32,
    endpoint_frames: usize,
    max_frames: usize,
    state: UtteranceState,
    quiet_frames: usize,
    frames: usize,
    finalized: bool,
}

impl EndpointIntent {
    pub fn new(frame_length: usize, sample_rate: u32, settings: &IntentSettings) -> Result<Self> {
        check_sensitivity(settings.sensitivity)?;
        if !(settings.endpoint_duration_sec.is_finite() && settings.endpoint_duration_sec > 0.0) {
            return Err(WakegateError::invalid_argument(format!(
                "endpoint duration {} must be finite and positive",
                settings.endpoint_duration_sec
            )));
        }

        let endpoint_frames = if settings.require_endpoint {
            frames_for(
                settings.endpoint_duration_sec * 1000.0,
                frame_length,
                sample_rate,
            )
        } else {
            1
        };

        Ok(Self {
            frame_length,
            sample_rate,
            threshold: threshold_for(settings.sensitivity),
            endpoint_frames,
            max_frames: frames_for(
                defaults::MAX_UTTERANCE_SEC * 1000.0,
                frame_length,
                sample_rate,
            ),
            state: UtteranceState::Waiting,
            quiet_frames: 0,
            frames: 0,
            finalized: false,
        })
    }

    fn reset(&mut self) {
        self.state = UtteranceState::Waiting;
        self.quiet_frames = 0;
        self.frames = 0;
        self.finalized = false;
    }
}

impl IntentEngine for EndpointIntent {
    fn process(&mut self, frame: &[i16]) -> Result<bool> {
        let loud = calculate_rms(frame) > self.threshold;
        self.frames += 1;

        self.state = match (self.state, loud) {
            (_, true) => {
                self.quiet_frames = 0;
                UtteranceState::Speaking
            }
            (UtteranceState::Waiting, false) => UtteranceState::Waiting,
            (_, false) => {
                self.quiet_frames += 1;
                UtteranceState::Trailing
            }
        };

        let endpoint = self.state == UtteranceState::Trailing
            && self.quiet_frames >= self.endpoint_frames;
        if endpoint || self.frames >= self.max_frames {
            debug!(frames = self.frames, endpoint, "utterance finalized");
            self.finalized = true;
        }
        Ok(self.finalized)
    }

    fn take_inference(&mut self) -> Result<Inference> {
        if !self.finalized {
            return Err(WakegateError::invalid_state("inference is not finalized"));
        }
        self.reset();
        Ok(Inference::not_understood())
    }

    fn context_info(&self) -> String {
        "energy endpoint detector (no intents)".to_string()
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn version(&self) -> String {
        VERSION.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: usize = 512;
    const RATE: u32 = 16000;

    fn loud() -> Vec<i16> {
        vec![8000i16; FRAME]
    }

    fn quiet() -> Vec<i16> {
        vec![0i16; FRAME]
    }

    fn intent_settings(require_endpoint: bool) -> IntentSettings {
        IntentSettings {
            context_path: None,
            sensitivity: 0.5,
            endpoint_duration_sec: 0.1,
            require_endpoint,
        }
    }

    #[test]
    fn test_calculate_rms() {
        assert_eq!(calculate_rms(&[]), 0.0);
        assert_eq!(calculate_rms(&[0; 100]), 0.0);
        let full = calculate_rms(&[i16::MAX; 100]);
        assert!((full - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_scales_with_sensitivity() {
        assert!((threshold_for(0.5) - defaults::ENERGY_THRESHOLD).abs() < 1e-6);
        assert!(threshold_for(1.0) < threshold_for(0.5));
        assert!(threshold_for(0.0) > threshold_for(0.5));
    }

    #[test]
    fn test_wake_word_needs_sustained_energy() {
        let mut engine = EnergyWakeWord::new(FRAME, RATE, 0.5).unwrap();
        // 100 ms at 32 ms frames
        assert!(!engine.process(&loud()).unwrap());
        assert!(!engine.process(&loud()).unwrap());
        assert!(!engine.process(&loud()).unwrap());
        assert!(engine.process(&loud()).unwrap());
    }

    #[test]
    fn test_wake_word_resets_on_quiet() {
        let mut engine = EnergyWakeWord::new(FRAME, RATE, 0.5).unwrap();
        for _ in 0..3 {
            assert!(!engine.process(&loud()).unwrap());
        }
        assert!(!engine.process(&quiet()).unwrap());
        for _ in 0..3 {
            assert!(!engine.process(&loud()).unwrap());
        }
        assert!(engine.process(&loud()).unwrap());
    }

    #[test]
    fn test_wake_word_rejects_bad_sensitivity() {
        assert!(matches!(
            EnergyWakeWord::new(FRAME, RATE, 1.5),
            Err(WakegateError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_intent_finalizes_after_trailing_quiet() {
        let mut engine = EndpointIntent::new(FRAME, RATE, &intent_settings(true)).unwrap();
        assert!(!engine.process(&quiet()).unwrap());
        assert!(!engine.process(&loud()).unwrap());
        // 100 ms endpoint = 4 quiet frames
        for _ in 0..3 {
            assert!(!engine.process(&quiet()).unwrap());
        }
        assert!(engine.process(&quiet()).unwrap());

        let inference = engine.take_inference().unwrap();
        assert!(!inference.understood);
        assert!(inference.slots.is_empty());
    }

    #[test]
    fn test_intent_without_endpoint_finalizes_on_first_quiet_frame() {
        let mut engine = EndpointIntent::new(FRAME, RATE, &intent_settings(false)).unwrap();
        assert!(!engine.process(&loud()).unwrap());
        assert!(engine.process(&quiet()).unwrap());
    }

    #[test]
    fn test_intent_times_out_without_speech() {
        let mut engine = EndpointIntent::new(FRAME, RATE, &intent_settings(true)).unwrap();
        let max_frames = frames_for(defaults::MAX_UTTERANCE_SEC * 1000.0, FRAME, RATE);
        for _ in 1..max_frames {
            assert!(!engine.process(&quiet()).unwrap());
        }
        assert!(engine.process(&quiet()).unwrap());
    }

    #[test]
    fn test_take_inference_resets_for_next_utterance() {
        let mut engine = EndpointIntent::new(FRAME, RATE, &intent_settings(false)).unwrap();
        engine.process(&loud()).unwrap();
        assert!(engine.process(&quiet()).unwrap());
        engine.take_inference().unwrap();

        assert!(!engine.process(&quiet()).unwrap());
        assert!(matches!(
            engine.take_inference(),
            Err(WakegateError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_intent_rejects_non_positive_endpoint() {
        let settings = IntentSettings {
            endpoint_duration_sec: 0.0,
            ..intent_settings(true)
        };
        assert!(EndpointIntent::new(FRAME, RATE, &settings).is_err());
    }

    #[test]
    fn test_intent_rejects_nan_endpoint() {
        let settings = IntentSettings {
            endpoint_duration_sec: f32::NAN,
            ..intent_settings(true)
        };
        assert!(matches!(
            EndpointIntent::new(FRAME, RATE, &settings),
            Err(WakegateError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_provider_builds_matching_engines() {
        let provider = EnergyProvider::new(FRAME, RATE).unwrap();
        let wake = provider
            .wake_word(&WakeWordSettings {
                keyword_path: None,
                sensitivity: 0.5,
            })
            .unwrap();
        let intent = provider.intent(&intent_settings(true)).unwrap();
        assert_eq!(wake.frame_length(), intent.frame_length());
        assert_eq!(wake.sample_rate(), intent.sample_rate());
    }
}
