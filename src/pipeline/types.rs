//! Data types for the transcription pipeline.

use crate::error::VoxlineError;
use crate::stt::TranscriptSegment;

/// Stage of a transcription request, in state-machine order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// No request running.
    Idle,
    /// Decoding and resampling the source audio.
    Preparing,
    /// Running the engine over chunk `index` of `total` (0-based).
    Transcribing { index: usize, total: usize },
    /// Combining per-chunk segments into the final transcript.
    Merging,
    /// Request finished with a full transcript.
    Completed,
    /// Request ended early on an engine failure.
    Failed,
    /// Request ended early on cancellation.
    Cancelled,
}

/// Progress report emitted while a request runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Current pipeline stage.
    pub stage: Stage,
    /// Whole-request fraction in [0, 1]; non-decreasing within a request.
    pub fraction: f32,
    /// Most recent partial text snapshot from the engine, if any.
    pub partial_text: Option<String>,
}

/// How a request ended.
///
/// `Cancelled` and `Failed` are terminal states, not errors: the transcript
/// they accompany still carries every segment produced before the exit.
#[derive(Debug)]
pub enum CompletionStatus {
    /// Every chunk was transcribed and merged.
    Complete,
    /// Cancellation was honored at a chunk boundary or mid-inference.
    Cancelled,
    /// A chunk's inference failed; earlier chunks are preserved.
    Failed {
        /// Index of the chunk whose inference failed.
        chunk_index: usize,
        /// The underlying engine error.
        error: VoxlineError,
    },
}

impl CompletionStatus {
    /// Returns true for a fully transcribed request.
    pub fn is_complete(&self) -> bool {
        matches!(self, CompletionStatus::Complete)
    }

    /// Returns true when the request was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CompletionStatus::Cancelled)
    }

    /// Returns true when a chunk's inference failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, CompletionStatus::Failed { .. })
    }
}

/// Final deliverable of a transcription request.
#[derive(Debug)]
pub struct Transcript {
    /// Merged segments with absolute timestamps, in start order.
    pub segments: Vec<TranscriptSegment>,
    /// How the request ended; partial on `Cancelled`/`Failed`.
    pub status: CompletionStatus,
    /// Identifier of the engine that served the request.
    pub engine: String,
    /// Language the engine reported, if any.
    pub language: Option<String>,
    /// True when a degraded fallback engine served the request.
    pub degraded: bool,
    /// Duration of the preprocessed audio in seconds.
    pub duration_secs: f64,
}

impl Transcript {
    /// Joins all segment texts into one string.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start_secs: start,
            end_secs: end,
            text: text.to_string(),
            confidence: None,
        }
    }

    #[test]
    fn transcript_text_joins_segments() {
        let transcript = Transcript {
            segments: vec![seg(0.0, 1.0, "hello"), seg(1.0, 2.0, ""), seg(2.0, 3.0, "world")],
            status: CompletionStatus::Complete,
            engine: "mock".to_string(),
            language: None,
            degraded: false,
            duration_secs: 3.0,
        };
        assert_eq!(transcript.text(), "hello world");
    }

    #[test]
    fn status_predicates() {
        assert!(CompletionStatus::Complete.is_complete());
        assert!(CompletionStatus::Cancelled.is_cancelled());
        let failed = CompletionStatus::Failed {
            chunk_index: 2,
            error: VoxlineError::Other("x".to_string()),
        };
        assert!(failed.is_failed());
        assert!(!failed.is_complete());
    }

    #[test]
    fn stage_equality_includes_chunk_position() {
        assert_eq!(
            Stage::Transcribing { index: 1, total: 3 },
            Stage::Transcribing { index: 1, total: 3 }
        );
        assert_ne!(
            Stage::Transcribing { index: 1, total: 3 },
            Stage::Transcribing { index: 2, total: 3 }
        );
    }
}
