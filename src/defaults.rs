//! Default configuration constants for wakegate.
//!
//! Shared between the configuration types, the reference engines and the
//! control channel so the values stay consistent.

/// Default audio sample rate in Hz.
pub const SAMPLE_RATE: u32 = 16000;

/// Default engine frame length in samples (32 ms at 16 kHz).
pub const FRAME_LENGTH: usize = 512;

/// Default wake word sensitivity within [0, 1].
///
/// Higher values miss fewer triggers at the cost of more false alarms.
pub const WAKE_SENSITIVITY: f32 = 0.5;

/// Default intent inference sensitivity within [0, 1].
pub const INFERENCE_SENSITIVITY: f32 = 0.5;

/// Default endpoint duration in seconds.
///
/// Trailing silence required before the intent engine finalizes.
pub const ENDPOINT_DURATION_SEC: f32 = 1.0;

/// Whether the intent engine waits for an endpoint before finalizing.
pub const REQUIRE_ENDPOINT: bool = true;

/// Longest utterance the reference intent engine accepts, in seconds.
pub const MAX_UTTERANCE_SEC: f32 = 5.0;

/// RMS level (0.0 to 1.0) the reference wake trigger scales by sensitivity.
pub const ENERGY_THRESHOLD: f32 = 0.02;

/// Payload bytes in one control-channel receive record.
///
/// A record is the 5-byte `"[NN] "` header plus this many payload bytes.
pub const MESSAGE_PAYLOAD_CAPACITY: usize = 10;

/// Size of the `"[NN] "` header on every control-channel line.
pub const MESSAGE_HEADER_LEN: usize = 5;

/// Samples per delivery when replaying a file through the pipeline.
///
/// Deliberately not a multiple of the frame length so file mode exercises the
/// same reassembly path as irregular microphone callbacks.
pub const FILE_CHUNK_SAMPLES: usize = 1000;

/// Number of tic/toc pairs the profiler keeps.
pub const PROFILE_HISTORY: usize = 31;

/// Name of the engine provider used when none is configured.
pub const DEFAULT_PROVIDER: &str = "energy";
