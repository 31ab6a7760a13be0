//! The recognition engine trait and its call contract.

use crate::error::{Result, VoxlineError};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A timestamped span of recognized text.
///
/// Fresh from an engine the times are relative to the chunk that produced
/// them; after merging they are absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    /// Span start in seconds.
    pub start_secs: f64,
    /// Span end in seconds.
    pub end_secs: f64,
    /// Recognized text.
    pub text: String,
    /// Engine confidence in [0, 1], when the engine reports one.
    pub confidence: Option<f32>,
}

/// Cooperative cancellation token.
///
/// Cloned freely; all clones observe the same flag. The orchestrator checks
/// it between chunk calls and threads it into the engine so an in-flight
/// inference can also abort.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress sink invoked by engines mid-call: fraction of the current chunk
/// in [0, 1] plus an optional partial text snapshot.
pub type ProgressFn = dyn Fn(f32, Option<&str>) + Send + Sync;

/// Per-call context handed to [`RecognitionEngine::transcribe`].
#[derive(Clone, Default)]
pub struct ChunkContext {
    /// Optional within-chunk progress sink.
    pub progress: Option<Arc<ProgressFn>>,
    /// Cancellation token for this request.
    pub cancel: CancelToken,
}

impl ChunkContext {
    /// Creates a context carrying only a cancellation token.
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            progress: None,
            cancel,
        }
    }

    /// Attaches a progress sink.
    pub fn with_progress(mut self, progress: Arc<ProgressFn>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Reports within-chunk progress if a sink is attached.
    pub fn report(&self, fraction: f32, partial_text: Option<&str>) {
        if let Some(progress) = &self.progress {
            progress(fraction.clamp(0.0, 1.0), partial_text);
        }
    }
}

impl std::fmt::Debug for ChunkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkContext")
            .field("progress", &self.progress.as_ref().map(|_| "<fn>"))
            .field("cancel", &self.cancel)
            .finish()
    }
}

/// Exclusive-access handle to a loaded recognition model.
///
/// One instance serves one inference at a time; the orchestrator serializes
/// access. Implementations must not keep global mutable state.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Loads the model. May be slow (seconds); called once before the first
    /// transcribe and again only after `unload`.
    async fn load(&mut self) -> Result<()>;

    /// Releases the loaded model.
    async fn unload(&mut self) -> Result<()> {
        Ok(())
    }

    /// Transcribes one chunk of mono 16kHz f32 samples.
    ///
    /// `language` is a hint ("auto" for detection). Implementations should
    /// invoke `ctx.report` zero or more times before returning and honor
    /// `ctx.cancel` on a best-effort basis.
    async fn transcribe(
        &self,
        samples: &[f32],
        language: &str,
        ctx: &ChunkContext,
    ) -> Result<Vec<TranscriptSegment>>;

    /// Engine identifier for status messaging.
    fn name(&self) -> &str;

    /// Language code the engine last detected, if any.
    fn reported_language(&self) -> Option<String> {
        None
    }

    /// True when this engine is a degraded fallback rather than the primary.
    fn is_fallback(&self) -> bool {
        false
    }

    /// True when the model is loaded and inference can run.
    fn is_ready(&self) -> bool;
}

/// Shape of the segments a [`MockEngine`] fabricates per call.
#[derive(Debug, Clone)]
enum MockResponse {
    /// One segment per chunk spanning `[0, min(duration, cap))`.
    Span { text: String, cap_secs: Option<f64> },
    /// Pre-scripted segment lists, consumed in call order.
    Scripted(Vec<Vec<TranscriptSegment>>),
}

/// Deterministic engine for tests and dry runs.
pub struct MockEngine {
    name: String,
    response: MockResponse,
    confidence: Option<f32>,
    language: Option<String>,
    fail_on_call: Option<usize>,
    calls: AtomicUsize,
    loaded: AtomicBool,
    call_hook: Option<Arc<dyn Fn(usize) + Send + Sync>>,
}

impl MockEngine {
    /// Creates a mock that emits one whole-chunk segment per call.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            response: MockResponse::Span {
                text: "mock transcription".to_string(),
                cap_secs: None,
            },
            confidence: None,
            language: None,
            fail_on_call: None,
            calls: AtomicUsize::new(0),
            loaded: AtomicBool::new(false),
            call_hook: None,
        }
    }

    /// Sets the text of fabricated segments.
    pub fn with_text(mut self, text: &str) -> Self {
        self.response = MockResponse::Span {
            text: text.to_string(),
            cap_secs: match self.response {
                MockResponse::Span { cap_secs, .. } => cap_secs,
                MockResponse::Scripted(_) => None,
            },
        };
        self
    }

    /// Caps the fabricated segment's end time, in chunk-relative seconds.
    pub fn with_segment_cap_secs(mut self, cap: f64) -> Self {
        if let MockResponse::Span { cap_secs, .. } = &mut self.response {
            *cap_secs = Some(cap);
        }
        self
    }

    /// Replaces fabrication with pre-scripted per-call segment lists.
    pub fn with_scripted_segments(mut self, script: Vec<Vec<TranscriptSegment>>) -> Self {
        self.response = MockResponse::Scripted(script);
        self
    }

    /// Sets the confidence attached to fabricated segments.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Sets the language the mock reports as detected.
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    /// Makes the `n`-th transcribe call (0-based) fail.
    pub fn with_failure_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// Invokes `hook(call_index)` after each successful transcribe call.
    /// Lets tests cancel the request at a precise chunk boundary.
    pub fn with_call_hook(mut self, hook: Arc<dyn Fn(usize) + Send + Sync>) -> Self {
        self.call_hook = Some(hook);
        self
    }

    /// Number of transcribe calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionEngine for MockEngine {
    async fn load(&mut self) -> Result<()> {
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unload(&mut self) -> Result<()> {
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn transcribe(
        &self,
        samples: &[f32],
        _language: &str,
        ctx: &ChunkContext,
    ) -> Result<Vec<TranscriptSegment>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_on_call == Some(call) {
            return Err(VoxlineError::InferenceFailed {
                message: format!("mock failure on call {}", call),
            });
        }

        ctx.report(0.5, None);

        let segments = match &self.response {
            MockResponse::Span { text, cap_secs } => {
                let duration = samples.len() as f64 / crate::defaults::SAMPLE_RATE as f64;
                let end = cap_secs.map_or(duration, |cap| duration.min(cap));
                vec![TranscriptSegment {
                    start_secs: 0.0,
                    end_secs: end,
                    text: text.clone(),
                    confidence: self.confidence,
                }]
            }
            MockResponse::Scripted(script) => script.get(call).cloned().unwrap_or_default(),
        };

        let partial = segments.first().map(|s| s.text.clone());
        ctx.report(1.0, partial.as_deref());

        if let Some(hook) = &self.call_hook {
            hook(call);
        }

        Ok(segments)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn reported_language(&self) -> Option<String> {
        self.language.clone()
    }

    fn is_ready(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}
