//! Default configuration constants for voxline.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default VAD energy threshold in dBFS.
///
/// Frames whose RMS energy exceeds this level are classified as speech.
/// -35 dB is tuned for typical recording levels: loud enough to reject
/// room tone, quiet enough to keep soft speech.
pub const ENERGY_THRESHOLD_DB: f32 = -35.0;

/// Default silence duration in seconds before a speech segment is closed.
pub const MIN_SILENCE_SECS: f32 = 0.5;

/// Default minimum speech duration in seconds for a segment to be emitted.
///
/// Shorter bursts are treated as transient noise (clicks, chair creaks).
pub const MIN_SPEECH_SECS: f32 = 0.3;

/// VAD analysis frame size in samples (32ms at 16kHz).
pub const VAD_FRAME_SIZE: usize = 512;

/// VAD hop size in samples (50% frame overlap, ~16ms at 16kHz).
pub const VAD_HOP_SIZE: usize = 256;

/// Speech ratio below which a buffer counts as "mostly silence".
pub const SILENCE_RATIO_THRESHOLD: f32 = 0.1;

/// Maximum chunk duration in seconds.
///
/// Hard limit imposed by the recognition engine's context window; Whisper
/// models process at most 30 seconds of audio per inference call.
pub const MAX_CHUNK_SECS: f64 = 30.0;

/// Overlap between consecutive chunks in seconds.
///
/// Words spoken exactly at a chunk boundary appear whole in at least one
/// of the two adjacent chunks.
pub const OVERLAP_SECS: f64 = 1.0;

/// Minimum chunk duration in seconds; shorter trailing slivers are dropped.
pub const MIN_CHUNK_SECS: f64 = 0.5;

/// Default language code for transcription.
///
/// "auto" lets the engine detect the spoken language automatically.
/// Set to a specific code (e.g., "en", "de") to force a language.
pub const DEFAULT_LANGUAGE: &str = "auto";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
