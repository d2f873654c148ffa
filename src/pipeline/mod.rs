//! Trigger pipeline: audio deliveries → frames → wake word → intent.
//!
//! Everything here runs on the thread that delivers audio; callbacks fire
//! synchronously from inside `ingest`.

pub mod orchestrator;
pub mod profile;
pub mod session;

pub use orchestrator::{Orchestrator, OrchestratorBuilder, Phase};
pub use profile::Profiler;
pub use session::{Pump, Session, SessionStats};
