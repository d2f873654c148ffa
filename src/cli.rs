//! Command-line interface for wakegate
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Two-stage voice triggering: wake word, then spoken intent
#[derive(Parser, Debug)]
#[command(
    name = "wakegate",
    version = crate::version_string(),
    about = "Two-stage voice triggering: wake word, then spoken intent"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// How wake and inference events are printed
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Engine overrides, applied on top of the configuration file
#[derive(clap::Args, Debug, Default, Clone)]
pub struct EngineArgs {
    /// Engine provider (default: energy)
    #[arg(long, global = true, value_name = "NAME")]
    pub provider: Option<String>,

    /// Wake word model file
    #[arg(long, global = true, value_name = "PATH")]
    pub keyword: Option<PathBuf>,

    /// Intent context file
    #[arg(long, global = true, value_name = "PATH")]
    pub context: Option<PathBuf>,

    /// Wake word sensitivity in [0, 1]
    #[arg(long, global = true, value_name = "VALUE")]
    pub wake_sensitivity: Option<f32>,

    /// Inference sensitivity in [0, 1]
    #[arg(long, global = true, value_name = "VALUE")]
    pub inference_sensitivity: Option<f32>,

    /// Trailing silence that ends a command, in seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub endpoint_duration: Option<f32>,

    /// Finalize commands without waiting for trailing silence
    #[arg(long, global = true)]
    pub no_require_endpoint: bool,
}

/// Event output style
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
    /// Framed control-channel lines ("[03] Wake word detected!")
    Control,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a 16-bit mono WAV file through the pipeline
    File {
        /// WAV file at the engine sample rate
        input: PathBuf,

        /// Samples per delivery (default: from config)
        #[arg(long, value_name = "SAMPLES")]
        chunk_samples: Option<usize>,
    },

    /// Listen on a microphone until interrupted
    #[cfg(feature = "cpal-audio")]
    Mic {
        /// Audio input device (default: system default)
        #[arg(long, value_name = "DEVICE")]
        device: Option<String>,

        /// Report CPU usage every N seconds
        #[arg(long, value_name = "SECONDS")]
        cpu_report: Option<u64>,

        /// Save the captured audio to a WAV file on exit
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// List available audio input devices
    #[cfg(feature = "cpal-audio")]
    Devices,

    /// Measure processing time for a WAV file and for the same length of silence
    Profile {
        /// WAV file at the engine sample rate
        input: PathBuf,

        /// Passes over the audio
        #[arg(long, default_value = "5")]
        repetitions: u32,
    },

    /// Read control-channel records and print each message
    Monitor {
        /// Read records from a file instead of stdin
        #[arg(long, value_name = "PATH")]
        input: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        /// Action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration commands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}
