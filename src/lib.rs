//! voxline - offline chunked transcription pipeline.
//!
//! Splits long recordings into bounded overlapping windows, skips silence
//! with an energy-based VAD, feeds each window to a pluggable recognition
//! engine, and merges the per-window segments into one absolute-timestamped
//! transcript.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod chunk;
pub mod config;
pub mod defaults;
pub mod error;
pub mod pipeline;
pub mod stt;

// Core pipeline stages
pub use audio::preprocess::{AudioPreprocessor, ProcessedAudio};
pub use audio::vad::{SpeechSegment, VadAnalysis, VadConfig, VadFilter};
pub use chunk::{AudioChunk, ChunkProcessor, ChunkerConfig};

// Orchestration
pub use pipeline::{
    CompletionStatus, Orchestrator, OrchestratorConfig, ProgressEvent, RequestOptions, Stage,
    Transcript,
};

// Engine boundary
pub use stt::{
    CancelToken, ChunkContext, FallbackEngine, MockEngine, RecognitionEngine, TranscriptSegment,
    WhisperEngine, WhisperEngineConfig,
};

// Error handling
pub use error::{Result, VoxlineError};

// Config
pub use config::Config;

pub use defaults::version_string;
