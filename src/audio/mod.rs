//! Audio decoding and analysis: preprocessing to canonical PCM and voice
//! activity detection.

pub mod preprocess;
pub mod vad;

pub use preprocess::{AudioPreprocessor, ProcessedAudio};
pub use vad::{SpeechSegment, VadAnalysis, VadConfig, VadFilter};
