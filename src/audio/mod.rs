//! Audio delivery and frame assembly.
//!
//! Sources deliver samples in whatever burst size their backend produces;
//! the assembler turns that stream into fixed-length engine frames.

pub mod assembler;
#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod recorder;
pub mod wav;

pub use assembler::FrameAssembler;
pub use recorder::{AudioSource, MockAudioSource};
pub use wav::{WavAudioSource, write_wav};
