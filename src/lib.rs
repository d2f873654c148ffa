//! wakegate - Two-stage voice triggering
//!
//! A wake word detector listens on every frame; once it fires, a
//! speech-to-intent engine takes over until it reports a result. A small
//! framed text protocol carries diagnostics to and from a host.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod config;
pub mod control;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod pipeline;

#[cfg(feature = "cli")]
pub mod cli;

// Composition root
#[cfg(feature = "cli")]
pub mod app;

// Core traits (source → frames → engines)
pub use audio::{AudioSource, FrameAssembler};
pub use engine::{EngineProvider, Inference, IntentEngine, WakeWordEngine};

// Pipeline
pub use pipeline::{Orchestrator, OrchestratorBuilder, Phase, Session};

// Control channel
pub use control::{ControlLink, ControlMessage, MessageChannel, MessageCode, MessageSender};

// Error handling
pub use error::{Result, WakegateError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// `"0.1.0+abc1234"` when built from a git checkout, `"0.1.0"` otherwise.
/// Reported by `--version` and in the control-channel handshake.
pub fn version_string() -> &'static str {
    env!("WAKEGATE_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if let Some(hash) = option_env!("GIT_HASH").filter(|h| !h.is_empty()) {
            assert!(
                ver.ends_with(&format!("+{}", hash)),
                "With GIT_HASH set, version should end with '+<hash>', got: {}",
                ver
            );
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
