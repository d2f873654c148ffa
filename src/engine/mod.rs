//! Engine contract consumed by the orchestrator.
//!
//! The wake word detector and the intent engine are black boxes behind two
//! traits. A provider resolves concrete engines once at startup; after that the
//! orchestrator only ever calls `process` on fixed-length frames.

pub mod energy;
pub mod mock;

use crate::config::EngineConfig;
use crate::error::{Result, WakegateError};
use std::fmt;
use std::path::PathBuf;

pub use energy::EnergyProvider;
pub use mock::{LeaseTracker, MockIntentEngine, MockProvider, MockWakeWordEngine};

/// Keyword spotter run on every frame while listening.
pub trait WakeWordEngine: Send {
    /// Process one frame. Returns `true` when the wake word was detected.
    fn process(&mut self, frame: &[i16]) -> Result<bool>;

    /// Samples per frame this engine requires.
    fn frame_length(&self) -> usize;

    /// Sample rate in Hz this engine requires.
    fn sample_rate(&self) -> u32;

    fn version(&self) -> String;
}

/// Speech-to-intent engine run on every frame after a trigger.
pub trait IntentEngine: Send {
    /// Process one frame. Returns `true` once inference is finalized, either
    /// because the command was understood or because the endpoint or timeout
    /// budget ran out.
    fn process(&mut self, frame: &[i16]) -> Result<bool>;

    /// Hand out the finalized result. Only valid right after `process`
    /// returned `true`; the engine resets for the next utterance.
    fn take_inference(&mut self) -> Result<Inference>;

    /// Human-readable description of the configured context.
    fn context_info(&self) -> String;

    fn frame_length(&self) -> usize;

    fn sample_rate(&self) -> u32;

    fn version(&self) -> String;
}

/// Configuration handed to a provider when creating the wake word engine.
#[derive(Debug, Clone, PartialEq)]
pub struct WakeWordSettings {
    pub keyword_path: Option<PathBuf>,
    pub sensitivity: f32,
}

/// Configuration handed to a provider when creating the intent engine.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentSettings {
    pub context_path: Option<PathBuf>,
    pub sensitivity: f32,
    pub endpoint_duration_sec: f32,
    pub require_endpoint: bool,
}

/// Creates engines for one build target or model family.
pub trait EngineProvider {
    fn name(&self) -> &'static str;

    fn wake_word(&self, settings: &WakeWordSettings) -> Result<Box<dyn WakeWordEngine>>;

    fn intent(&self, settings: &IntentSettings) -> Result<Box<dyn IntentEngine>>;
}

/// Names accepted by [`provider_from_config`].
pub const PROVIDERS: &[&str] = &["energy"];

/// Resolve the engine provider named in the configuration.
pub fn provider_from_config(config: &EngineConfig) -> Result<Box<dyn EngineProvider>> {
    match config.provider.as_str() {
        "energy" => Ok(Box::new(EnergyProvider::new(
            config.frame_length,
            config.sample_rate,
        )?)),
        other => Err(WakegateError::ConfigInvalidValue {
            key: "engine.provider".to_string(),
            message: format!("unknown provider '{}', expected one of {:?}", other, PROVIDERS),
        }),
    }
}

/// Result of one inference phase.
///
/// Owned by the inference callback. The engine may back the result with
/// storage it reuses, so the value carries a release hook that runs exactly
/// once, when the value is dropped or passed to [`Inference::release`].
pub struct Inference {
    pub understood: bool,
    pub intent: Option<String>,
    /// Slot name/value pairs in engine order. Empty when not understood.
    pub slots: Vec<(String, String)>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Inference {
    pub fn understood(intent: impl Into<String>, slots: Vec<(String, String)>) -> Self {
        Self {
            understood: true,
            intent: Some(intent.into()),
            slots,
            release: None,
        }
    }

    pub fn not_understood() -> Self {
        Self {
            understood: false,
            intent: None,
            slots: Vec::new(),
            release: None,
        }
    }

    /// Attach the hook that returns engine-side storage.
    pub fn with_release<F>(mut self, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }

    /// Look up a slot value by name.
    pub fn slot(&self, name: &str) -> Option<&str> {
        self.slots
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Release engine storage and keep the plain data.
    pub fn into_parts(mut self) -> (bool, Option<String>, Vec<(String, String)>) {
        let intent = self.intent.take();
        let slots = std::mem::take(&mut self.slots);
        (self.understood, intent, slots)
    }

    /// Release engine storage now.
    pub fn release(self) {}
}

impl Drop for Inference {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Inference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inference")
            .field("understood", &self.understood)
            .field("intent", &self.intent)
            .field("slots", &self.slots)
            .field("leased", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_inference_release_runs_once_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);

        let inference = Inference::not_understood().with_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(released.load(Ordering::SeqCst), 0);

        drop(inference);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_release() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);

        Inference::understood("lights", vec![])
            .with_release(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .release();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_into_parts_releases_and_keeps_data() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);

        let inference = Inference::understood(
            "changeColor",
            vec![("color".to_string(), "blue".to_string())],
        )
        .with_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let (understood, intent, slots) = inference.into_parts();
        assert!(understood);
        assert_eq!(intent.as_deref(), Some("changeColor"));
        assert_eq!(slots, vec![("color".to_string(), "blue".to_string())]);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_slot_lookup() {
        let inference = Inference::understood(
            "orderBeverage",
            vec![
                ("size".to_string(), "large".to_string()),
                ("beverage".to_string(), "latte".to_string()),
            ],
        );
        assert_eq!(inference.slot("beverage"), Some("latte"));
        assert_eq!(inference.slot("milk"), None);
    }

    #[test]
    fn test_not_understood_is_empty() {
        let inference = Inference::not_understood();
        assert!(!inference.understood);
        assert!(inference.intent.is_none());
        assert!(inference.slots.is_empty());
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let config = EngineConfig {
            provider: "porcelain".to_string(),
            ..EngineConfig::default()
        };
        match provider_from_config(&config) {
            Err(WakegateError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "engine.provider");
            }
            _ => panic!("Expected ConfigInvalidValue"),
        }
    }

    #[test]
    fn test_energy_provider_resolves() {
        let provider = provider_from_config(&EngineConfig::default()).unwrap();
        assert_eq!(provider.name(), "energy");
    }
}
