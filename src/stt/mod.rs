//! Speech-to-text engine boundary.
//!
//! The pipeline treats recognition as a black box behind [`RecognitionEngine`]:
//! hand it a chunk of canonical PCM, get back timestamped segments. Concrete
//! adapters live here; everything upstream is engine-agnostic.

pub mod engine;
pub mod fallback;
pub mod whisper;

pub use engine::{
    CancelToken, ChunkContext, MockEngine, ProgressFn, RecognitionEngine, TranscriptSegment,
};
pub use fallback::FallbackEngine;
pub use whisper::{WhisperEngine, WhisperEngineConfig};
