use crate::defaults;
use crate::error::{Result, WakegateError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub audio: AudioConfig,
    pub control: ControlConfig,
}

/// Engine selection and tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub provider: String,
    pub keyword_path: Option<PathBuf>,
    pub context_path: Option<PathBuf>,
    pub wake_sensitivity: f32,
    pub inference_sensitivity: f32,
    pub endpoint_duration_sec: f32,
    pub require_endpoint: bool,
    /// Frame length for providers that let the host choose it.
    pub frame_length: usize,
    pub sample_rate: u32,
}

/// Audio delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    /// Samples per delivery when replaying files.
    pub chunk_samples: usize,
}

/// Control channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    pub payload_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: defaults::DEFAULT_PROVIDER.to_string(),
            keyword_path: None,
            context_path: None,
            wake_sensitivity: defaults::WAKE_SENSITIVITY,
            inference_sensitivity: defaults::INFERENCE_SENSITIVITY,
            endpoint_duration_sec: defaults::ENDPOINT_DURATION_SEC,
            require_endpoint: defaults::REQUIRE_ENDPOINT,
            frame_length: defaults::FRAME_LENGTH,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            chunk_samples: defaults::FILE_CHUNK_SAMPLES,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            payload_capacity: defaults::MESSAGE_PAYLOAD_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(WakegateError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - WAKEGATE_PROVIDER → engine.provider
    /// - WAKEGATE_AUDIO_DEVICE → audio.device
    /// - WAKEGATE_WAKE_SENSITIVITY → engine.wake_sensitivity (ignored unless it
    ///   parses as a number)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(provider) = std::env::var("WAKEGATE_PROVIDER")
            && !provider.is_empty()
        {
            self.engine.provider = provider;
        }

        if let Ok(device) = std::env::var("WAKEGATE_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(sensitivity) = std::env::var("WAKEGATE_WAKE_SENSITIVITY")
            && let Ok(value) = sensitivity.trim().parse::<f32>()
        {
            self.engine.wake_sensitivity = value;
        }

        self
    }

    /// Reject values the engines or the control channel cannot work with.
    pub fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        for (key, value) in [
            ("engine.wake_sensitivity", engine.wake_sensitivity),
            ("engine.inference_sensitivity", engine.inference_sensitivity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(key, format!("{} is outside [0, 1]", value)));
            }
        }
        let endpoint = engine.endpoint_duration_sec;
        if !(endpoint.is_finite() && endpoint > 0.0) {
            return Err(invalid(
                "engine.endpoint_duration_sec",
                format!("{} must be finite and positive", endpoint),
            ));
        }
        if engine.frame_length == 0 {
            return Err(invalid("engine.frame_length", "must be positive".to_string()));
        }
        if engine.sample_rate == 0 {
            return Err(invalid("engine.sample_rate", "must be positive".to_string()));
        }
        if self.audio.chunk_samples == 0 {
            return Err(invalid("audio.chunk_samples", "must be positive".to_string()));
        }
        if !(1..=99).contains(&self.control.payload_capacity) {
            return Err(invalid(
                "control.payload_capacity",
                format!("{} is outside 1..=99", self.control.payload_capacity),
            ));
        }
        Ok(())
    }

    /// Render as TOML, e.g. for `config show`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| WakegateError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/wakegate/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wakegate")
            .join("config.toml")
    }
}

fn invalid(key: &str, message: String) -> WakegateError {
    WakegateError::ConfigInvalidValue {
        key: key.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_wakegate_env() {
        remove_env("WAKEGATE_PROVIDER");
        remove_env("WAKEGATE_AUDIO_DEVICE");
        remove_env("WAKEGATE_WAKE_SENSITIVITY");
    }

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.engine.provider, "energy");
        assert_eq!(config.engine.keyword_path, None);
        assert_eq!(config.engine.wake_sensitivity, 0.5);
        assert_eq!(config.engine.inference_sensitivity, 0.5);
        assert_eq!(config.engine.endpoint_duration_sec, 1.0);
        assert!(config.engine.require_endpoint);
        assert_eq!(config.engine.frame_length, 512);
        assert_eq!(config.engine.sample_rate, 16000);

        assert_eq!(config.audio.device, None);
        assert_eq!(config.audio.chunk_samples, 1000);

        assert_eq!(config.control.payload_capacity, 10);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = write_temp(
            r#"
            [engine]
            provider = "energy"
            context_path = "/opt/models/coffee.ctx"
            wake_sensitivity = 0.7
            inference_sensitivity = 0.3
            endpoint_duration_sec = 0.5
            require_endpoint = false

            [audio]
            device = "hw:0,0"
            chunk_samples = 160

            [control]
            payload_capacity = 32
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(
            config.engine.context_path,
            Some(PathBuf::from("/opt/models/coffee.ctx"))
        );
        assert_eq!(config.engine.wake_sensitivity, 0.7);
        assert_eq!(config.engine.inference_sensitivity, 0.3);
        assert_eq!(config.engine.endpoint_duration_sec, 0.5);
        assert!(!config.engine.require_endpoint);
        assert_eq!(config.audio.device, Some("hw:0,0".to_string()));
        assert_eq!(config.audio.chunk_samples, 160);
        assert_eq!(config.control.payload_capacity, 32);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let temp_file = write_temp(
            r#"
            [engine]
            wake_sensitivity = 0.9
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.engine.wake_sensitivity, 0.9);
        assert_eq!(config.engine.provider, "energy");
        assert_eq!(config.audio, AudioConfig::default());
        assert_eq!(config.control, ControlConfig::default());
    }

    #[test]
    fn test_env_override_provider() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_wakegate_env();

        set_env("WAKEGATE_PROVIDER", "mock");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.engine.provider, "mock");
        assert_eq!(config.audio.device, None);

        clear_wakegate_env();
    }

    #[test]
    fn test_env_override_device_and_sensitivity() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_wakegate_env();

        set_env("WAKEGATE_AUDIO_DEVICE", "pulse");
        set_env("WAKEGATE_WAKE_SENSITIVITY", "0.8");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.audio.device, Some("pulse".to_string()));
        assert_eq!(config.engine.wake_sensitivity, 0.8);

        clear_wakegate_env();
    }

    #[test]
    fn test_env_override_empty_or_garbage_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_wakegate_env();

        set_env("WAKEGATE_PROVIDER", "");
        set_env("WAKEGATE_WAKE_SENSITIVITY", "loud");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.engine.provider, "energy");
        assert_eq!(config.engine.wake_sensitivity, 0.5);

        clear_wakegate_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_file = write_temp(
            r#"
            [engine
            provider = "broken
        "#,
        );

        assert!(matches!(
            Config::load(temp_file.path()),
            Err(WakegateError::Config(_))
        ));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_rejects_invalid_toml() {
        let temp_file = write_temp("[engine\n");
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_sensitivity_out_of_range() {
        let mut config = Config::default();
        config.engine.inference_sensitivity = 1.5;

        match config.validate() {
            Err(WakegateError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "engine.inference_sensitivity");
            }
            other => panic!("Expected ConfigInvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_zero_endpoint() {
        let mut config = Config::default();
        config.engine.endpoint_duration_sec = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_endpoint() {
        for value in [f32::NAN, f32::INFINITY] {
            let mut config = Config::default();
            config.engine.endpoint_duration_sec = value;
            match config.validate() {
                Err(WakegateError::ConfigInvalidValue { key, .. }) => {
                    assert_eq!(key, "engine.endpoint_duration_sec");
                }
                other => panic!("Expected ConfigInvalidValue for {}, got {:?}", value, other),
            }
        }
    }

    #[test]
    fn test_validate_rejects_payload_capacity() {
        let mut config = Config::default();
        config.control.payload_capacity = 0;
        assert!(config.validate().is_err());
        config.control.payload_capacity = 100;
        assert!(config.validate().is_err());
        config.control.payload_capacity = 99;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_toml_loads_back() {
        let mut config = Config::default();
        config.audio.device = Some("usb".to_string());

        let temp_file = write_temp(&config.to_toml().unwrap());
        assert_eq!(Config::load(temp_file.path()).unwrap(), config);
    }

    #[test]
    fn test_default_path_ends_with_wakegate_config() {
        let path = Config::default_path();
        assert!(path.ends_with("wakegate/config.toml"));
    }
}
