//! Transcription pipeline: preprocess → VAD → chunk → engine → merge.
//!
//! The orchestrator runs one request at a time against an exclusive engine,
//! reporting whole-request progress and honoring cooperative cancellation.

pub mod orchestrator;
pub mod types;

pub use orchestrator::{Orchestrator, OrchestratorConfig, RequestOptions};
pub use types::{CompletionStatus, ProgressEvent, Stage, Transcript};
