//! Engine composition: a primary engine backed by fallbacks.
//!
//! Each chunk is offered to the engines in order; the first success wins.
//! Useful for pairing a GPU engine with a CPU build, or a large model with
//! a small one that always loads.

use crate::error::{Result, VoxlineError};
use crate::stt::engine::{ChunkContext, RecognitionEngine, TranscriptSegment};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Engine that tries children in order until one succeeds.
pub struct FallbackEngine {
    engines: Vec<Box<dyn RecognitionEngine>>,
    name: String,
    /// Index of the engine that served the most recent successful call.
    active: AtomicUsize,
}

impl FallbackEngine {
    /// Creates a fallback chain; the first engine is the primary.
    ///
    /// # Panics
    /// Panics if `engines` is empty.
    pub fn new(engines: Vec<Box<dyn RecognitionEngine>>) -> Self {
        assert!(!engines.is_empty(), "need at least one engine");
        let name = engines
            .iter()
            .map(|e| e.name())
            .collect::<Vec<_>>()
            .join("+");
        Self {
            engines,
            name,
            active: AtomicUsize::new(0),
        }
    }

    /// Index of the engine that served the most recent successful call.
    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionEngine for FallbackEngine {
    async fn load(&mut self) -> Result<()> {
        let mut failures = Vec::new();
        for engine in &mut self.engines {
            if let Err(e) = engine.load().await {
                failures.push(format!("{}: {}", engine.name(), e));
            }
        }
        if failures.len() == self.engines.len() {
            return Err(VoxlineError::ModelLoadFailed {
                message: failures.join("; "),
            });
        }
        Ok(())
    }

    async fn unload(&mut self) -> Result<()> {
        for engine in &mut self.engines {
            engine.unload().await?;
        }
        Ok(())
    }

    async fn transcribe(
        &self,
        samples: &[f32],
        language: &str,
        ctx: &ChunkContext,
    ) -> Result<Vec<TranscriptSegment>> {
        let mut failures = Vec::new();

        for (index, engine) in self.engines.iter().enumerate() {
            if !engine.is_ready() {
                failures.push(format!("{}: not loaded", engine.name()));
                continue;
            }
            match engine.transcribe(samples, language, ctx).await {
                Ok(segments) => {
                    self.active.store(index, Ordering::SeqCst);
                    return Ok(segments);
                }
                Err(e) => failures.push(format!("{}: {}", engine.name(), e)),
            }
        }

        Err(VoxlineError::AllEnginesFailed {
            message: failures.join("; "),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn reported_language(&self) -> Option<String> {
        self.engines
            .get(self.active_index())
            .and_then(|e| e.reported_language())
    }

    fn is_fallback(&self) -> bool {
        self.active_index() > 0
    }

    fn is_ready(&self) -> bool {
        self.engines.iter().any(|e| e.is_ready())
    }
}
