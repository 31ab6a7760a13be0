//! Orchestrator: drives one transcription request end to end.

use crate::audio::preprocess::{AudioPreprocessor, ProcessedAudio};
use crate::audio::vad::{VadConfig, VadFilter};
use crate::chunk::{ChunkProcessor, ChunkerConfig};
use crate::defaults;
use crate::error::{Result, VoxlineError};
use crate::pipeline::types::{CompletionStatus, ProgressEvent, Stage, Transcript};
use crate::stt::engine::{CancelToken, ChunkContext, ProgressFn, RecognitionEngine};
use crate::stt::TranscriptSegment;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// VAD configuration (used by silence skipping).
    pub vad: VadConfig,
    /// Chunker configuration.
    pub chunker: ChunkerConfig,
    /// Drop silence before chunking. Off by default: discarding silence
    /// shifts absolute timestamps, which the caller must opt into.
    pub skip_silence: bool,
    /// Language hint passed to the engine ("auto" = detect).
    pub language: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            vad: VadConfig::default(),
            chunker: ChunkerConfig::default(),
            skip_silence: false,
            language: defaults::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Per-request overrides; unset fields fall back to the orchestrator's
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Language hint for this request only.
    pub language: Option<String>,
    /// Silence skipping for this request only.
    pub skip_silence: Option<bool>,
    /// Chunking geometry for this request only.
    pub chunker: Option<ChunkerConfig>,
    /// VAD tuning for this request only.
    pub vad: Option<VadConfig>,
}

/// Monotone whole-request progress reporting.
///
/// Fractions are clamped to the maximum seen so far, so callbacks observe a
/// non-decreasing sequence regardless of how an engine reports within-chunk
/// progress.
struct ProgressTracker {
    completed_chunks: AtomicUsize,
    /// Highest fraction emitted so far, in thousandths.
    max_milli: AtomicU32,
    tx: Option<crossbeam_channel::Sender<ProgressEvent>>,
}

impl ProgressTracker {
    fn new(tx: Option<crossbeam_channel::Sender<ProgressEvent>>) -> Self {
        Self {
            completed_chunks: AtomicUsize::new(0),
            max_milli: AtomicU32::new(0),
            tx,
        }
    }

    fn completed(&self) -> usize {
        self.completed_chunks.load(Ordering::SeqCst)
    }

    fn emit(&self, stage: Stage, fraction: f32, partial_text: Option<&str>) {
        let milli = (fraction.clamp(0.0, 1.0) * 1000.0) as u32;
        let prev = self.max_milli.fetch_max(milli, Ordering::SeqCst);
        let fraction = prev.max(milli) as f32 / 1000.0;

        if let Some(tx) = &self.tx {
            // Receiver may be gone; progress is best-effort
            let _ = tx.send(ProgressEvent {
                stage,
                fraction,
                partial_text: partial_text.map(str::to_string),
            });
        }
    }
}

/// Drives preprocess → (optional VAD filter) → chunking → per-chunk engine
/// calls → merge for one request at a time.
///
/// The engine is an exclusive resource: the internal lock is held for the
/// whole request, so concurrent `transcribe_*` calls on clones of the same
/// orchestrator serialize rather than interleave inference.
pub struct Orchestrator {
    engine: Arc<Mutex<Box<dyn RecognitionEngine>>>,
    config: OrchestratorConfig,
    preprocessor: AudioPreprocessor,
    /// Token for the running (or next) request.
    current_cancel: StdMutex<CancelToken>,
    progress_tx: Option<crossbeam_channel::Sender<ProgressEvent>>,
}

impl Orchestrator {
    /// Creates an orchestrator owning the given engine.
    pub fn new(engine: Box<dyn RecognitionEngine>, config: OrchestratorConfig) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            config,
            preprocessor: AudioPreprocessor::new(),
            current_cancel: StdMutex::new(CancelToken::new()),
            progress_tx: None,
        }
    }

    /// Attaches a progress event sender.
    pub fn with_progress_sender(
        mut self,
        tx: crossbeam_channel::Sender<ProgressEvent>,
    ) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Returns the cancellation token for the running (or next) request.
    pub fn cancel_token(&self) -> CancelToken {
        self.current_cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Requests cooperative cancellation of the running request.
    pub fn cancel(&self) {
        self.current_cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
    }

    /// Loads the engine's model up front; otherwise the first request does it.
    pub async fn load_engine(&self) -> Result<()> {
        self.engine.lock().await.load().await
    }

    /// Releases the engine's model.
    pub async fn unload_engine(&self) -> Result<()> {
        self.engine.lock().await.unload().await
    }

    /// Transcribes an audio file.
    ///
    /// Decode runs on the blocking thread pool; everything else as in
    /// [`transcribe_samples`](Self::transcribe_samples).
    pub async fn transcribe_file(&self, path: &Path) -> Result<Transcript> {
        self.transcribe_file_with(path, &RequestOptions::default())
            .await
    }

    /// Transcribes an audio file with per-request overrides.
    pub async fn transcribe_file_with(
        &self,
        path: &Path,
        options: &RequestOptions,
    ) -> Result<Transcript> {
        let preprocessor = self.preprocessor;
        let path = path.to_path_buf();
        let audio = tokio::task::spawn_blocking(move || preprocessor.process(&path))
            .await
            .map_err(|e| VoxlineError::Other(format!("decode task failed: {}", e)))??;
        self.transcribe_samples_with(audio, options).await
    }

    /// Transcribes pre-decoded canonical audio.
    ///
    /// Returns `Err` only for input and model-load failures, where no work
    /// has been done. Once chunk processing starts, engine failures and
    /// cancellation end the request early but still return `Ok`: the
    /// transcript carries every segment produced before the exit, with
    /// `status` saying how the request ended.
    pub async fn transcribe_samples(&self, audio: ProcessedAudio) -> Result<Transcript> {
        self.transcribe_samples_with(audio, &RequestOptions::default())
            .await
    }

    /// Transcribes pre-decoded canonical audio with per-request overrides.
    pub async fn transcribe_samples_with(
        &self,
        audio: ProcessedAudio,
        options: &RequestOptions,
    ) -> Result<Transcript> {
        let language = options
            .language
            .clone()
            .unwrap_or_else(|| self.config.language.clone());
        let skip_silence = options.skip_silence.unwrap_or(self.config.skip_silence);
        let chunker = ChunkProcessor::new(options.chunker.unwrap_or(self.config.chunker));
        let vad = VadFilter::new(options.vad.unwrap_or(self.config.vad));

        let cancel = self.request_token();
        let tracker = Arc::new(ProgressTracker::new(self.progress_tx.clone()));
        tracker.emit(Stage::Preparing, 0.0, None);

        if audio.is_empty() {
            return Err(VoxlineError::AudioTooShort {
                duration_secs: audio.duration_secs(),
            });
        }
        let duration_secs = audio.duration_secs();

        let samples = if skip_silence {
            vad.filter_silence(&audio.samples)
        } else {
            audio.samples
        };

        let mut engine = self.engine.lock().await;
        if !engine.is_ready() {
            engine.load().await?;
        }

        if samples.is_empty() {
            // Silence skipping removed everything: legitimately empty result
            tracker.emit(Stage::Completed, 1.0, None);
            self.refresh_token();
            return Ok(self.finish(Vec::new(), CompletionStatus::Complete, &**engine, duration_secs));
        }

        let chunks = chunker.create_chunks(&samples);
        let total = chunks.len();
        debug_assert_eq!(
            total,
            chunker.chunk_count(samples.len() as f64 / chunker.config().sample_rate as f64)
        );

        // Within-chunk engine progress folded into the whole-request fraction
        let within_progress: Arc<ProgressFn> = {
            let tracker = tracker.clone();
            Arc::new(move |fraction: f32, partial: Option<&str>| {
                let completed = tracker.completed();
                let overall = (completed as f32 + fraction.clamp(0.0, 1.0)) / total as f32;
                tracker.emit(
                    Stage::Transcribing {
                        index: completed.min(total - 1),
                        total,
                    },
                    overall,
                    partial,
                );
            })
        };

        let mut per_chunk: Vec<Vec<TranscriptSegment>> = Vec::with_capacity(total);
        let mut status = CompletionStatus::Complete;

        for chunk in &chunks {
            // Mandatory cancellation point between chunk calls
            if cancel.is_cancelled() {
                status = CompletionStatus::Cancelled;
                break;
            }

            tracker.emit(
                Stage::Transcribing {
                    index: chunk.index,
                    total,
                },
                tracker.completed() as f32 / total as f32,
                None,
            );

            let ctx = ChunkContext::new(cancel.clone()).with_progress(within_progress.clone());
            match engine.transcribe(&chunk.samples, &language, &ctx).await {
                Ok(segments) => {
                    per_chunk.push(segments);
                    let done = tracker.completed_chunks.fetch_add(1, Ordering::SeqCst) + 1;
                    tracker.emit(
                        Stage::Transcribing {
                            index: (done - 1).min(total - 1),
                            total,
                        },
                        done as f32 / total as f32,
                        None,
                    );
                }
                Err(error) => {
                    // An abort threaded into the engine surfaces as an
                    // inference error; report it as the cancellation it is.
                    status = if cancel.is_cancelled() {
                        CompletionStatus::Cancelled
                    } else {
                        CompletionStatus::Failed {
                            chunk_index: chunk.index,
                            error,
                        }
                    };
                    break;
                }
            }
        }

        tracker.emit(Stage::Merging, tracker.completed() as f32 / total as f32, None);
        let segments = chunker.merge_segments(per_chunk, &chunks);

        let final_stage = match &status {
            CompletionStatus::Complete => Stage::Completed,
            CompletionStatus::Cancelled => Stage::Cancelled,
            CompletionStatus::Failed { .. } => Stage::Failed,
        };
        let final_fraction = if status.is_complete() {
            1.0
        } else {
            tracker.completed() as f32 / total as f32
        };
        tracker.emit(final_stage, final_fraction, None);

        self.refresh_token();
        Ok(self.finish(segments, status, &**engine, duration_secs))
    }

    fn finish(
        &self,
        segments: Vec<TranscriptSegment>,
        status: CompletionStatus,
        engine: &dyn RecognitionEngine,
        duration_secs: f64,
    ) -> Transcript {
        Transcript {
            segments,
            status,
            engine: engine.name().to_string(),
            language: engine.reported_language(),
            degraded: engine.is_fallback(),
            duration_secs,
        }
    }

    /// Returns the token for this request. A cancellation latched before the
    /// request started is honored, not discarded.
    fn request_token(&self) -> CancelToken {
        self.current_cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Installs a fresh token after a request consumed a cancellation, so
    /// the next request starts clean.
    fn refresh_token(&self) {
        let mut guard = self
            .current_cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if guard.is_cancelled() {
            *guard = CancelToken::new();
        }
    }
}
