//! Whisper-based recognition engine.
//!
//! Implements [`RecognitionEngine`] on top of whisper-rs. Requires the
//! `whisper` feature and cmake to build:
//!
//! ```bash
//! cargo build --features whisper
//! ```
//!
//! Without the feature a stub with the same surface is compiled; its `load`
//! explains how to enable real transcription.

#[cfg(feature = "whisper")]
use crate::defaults;
use crate::error::{Result, VoxlineError};
use crate::stt::engine::{ChunkContext, RecognitionEngine, TranscriptSegment};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::RwLock;

#[cfg(feature = "whisper")]
use std::sync::{Arc, Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for the Whisper engine.
#[derive(Debug, Clone)]
pub struct WhisperEngineConfig {
    /// Path to the ggml model file.
    pub model_path: PathBuf,
    /// Number of inference threads (None = whisper.cpp default).
    pub threads: Option<usize>,
}

impl Default for WhisperEngineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            threads: None,
        }
    }
}

/// Whisper implementation of [`RecognitionEngine`].
///
/// The loaded context is an exclusive resource; a `Mutex` serializes state
/// creation, and the orchestrator additionally serializes whole requests.
pub struct WhisperEngine {
    config: WhisperEngineConfig,
    model_name: String,
    detected_language: RwLock<Option<String>>,
    #[cfg(feature = "whisper")]
    context: Option<Arc<Mutex<WhisperContext>>>,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl WhisperEngine {
    /// Creates an unloaded engine; call [`RecognitionEngine::load`] before
    /// transcribing.
    pub fn new(config: WhisperEngineConfig) -> Self {
        let model_name = config
            .model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        Self {
            config,
            model_name,
            detected_language: RwLock::new(None),
            #[cfg(feature = "whisper")]
            context: None,
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &WhisperEngineConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
#[async_trait]
impl RecognitionEngine for WhisperEngine {
    async fn load(&mut self) -> Result<()> {
        // Suppress whisper.cpp's own stderr chatter (once per process)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !self.config.model_path.exists() {
            return Err(VoxlineError::FileNotFound {
                path: self.config.model_path.to_string_lossy().to_string(),
            });
        }

        let path = self
            .config
            .model_path
            .to_str()
            .ok_or_else(|| VoxlineError::ModelLoadFailed {
                message: "invalid UTF-8 in model path".to_string(),
            })?
            .to_string();

        // Model load takes seconds; keep it off the async runtime
        let context = tokio::task::spawn_blocking(move || {
            WhisperContext::new_with_params(&path, WhisperContextParameters::default())
        })
        .await
        .map_err(|e| VoxlineError::ModelLoadFailed {
            message: format!("model load task failed: {}", e),
        })?
        .map_err(|e| VoxlineError::ModelLoadFailed {
            message: format!("failed to load Whisper model: {}", e),
        })?;

        self.context = Some(Arc::new(Mutex::new(context)));
        Ok(())
    }

    async fn unload(&mut self) -> Result<()> {
        self.context = None;
        Ok(())
    }

    async fn transcribe(
        &self,
        samples: &[f32],
        language: &str,
        ctx: &ChunkContext,
    ) -> Result<Vec<TranscriptSegment>> {
        let context = self
            .context
            .clone()
            .ok_or_else(|| VoxlineError::ModelLoadFailed {
                message: "model not loaded".to_string(),
            })?;

        let samples = samples.to_vec();
        let language = language.to_string();
        let threads = self.config.threads;
        let cancel = ctx.cancel.clone();
        let progress = ctx.progress.clone();

        let (segments, detected) = tokio::task::spawn_blocking(move || {
            let context = context.lock().map_err(|_| VoxlineError::InferenceFailed {
                message: "whisper context lock poisoned".to_string(),
            })?;
            let mut state =
                context
                    .create_state()
                    .map_err(|e| VoxlineError::InferenceFailed {
                        message: format!("failed to create Whisper state: {}", e),
                    })?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            if language == defaults::AUTO_LANGUAGE {
                params.set_language(None);
            } else {
                params.set_language(Some(&language));
            }
            if let Some(threads) = threads {
                params.set_n_threads(threads as i32);
            }
            params.set_print_special(false);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);

            let cancel_flag = cancel.clone();
            params.set_abort_callback_safe(move || cancel_flag.is_cancelled());

            if let Some(sink) = progress {
                params.set_progress_callback_safe(move |percent: i32| {
                    sink((percent as f32 / 100.0).clamp(0.0, 1.0), None);
                });
            }

            state
                .full(params, &samples)
                .map_err(|e| VoxlineError::InferenceFailed {
                    message: format!("Whisper inference failed: {}", e),
                })?;

            let mut segments = Vec::new();
            for segment in state.as_iter() {
                // whisper reports timestamps in centiseconds
                let start_secs = segment.start_timestamp() as f64 / 100.0;
                let end_secs = segment.end_timestamp() as f64 / 100.0;
                let text = segment.to_string().trim().to_string();
                if text.is_empty() {
                    continue;
                }
                let confidence = (1.0 - segment.no_speech_probability()).clamp(0.0, 1.0);
                segments.push(TranscriptSegment {
                    start_secs,
                    end_secs,
                    text,
                    confidence: Some(confidence),
                });
            }

            let lang_id = state.full_lang_id_from_state();
            let detected = whisper_rs::get_lang_str(lang_id).map(str::to_string);
            Ok::<_, VoxlineError>((segments, detected))
        })
        .await
        .map_err(|e| VoxlineError::InferenceFailed {
            message: format!("inference task failed: {}", e),
        })??;

        if let Ok(mut slot) = self.detected_language.write() {
            *slot = detected;
        }

        Ok(segments)
    }

    fn name(&self) -> &str {
        &self.model_name
    }

    fn reported_language(&self) -> Option<String> {
        self.detected_language.read().ok().and_then(|l| l.clone())
    }

    fn is_ready(&self) -> bool {
        self.context.is_some()
    }
}

#[cfg(not(feature = "whisper"))]
#[async_trait]
impl RecognitionEngine for WhisperEngine {
    async fn load(&mut self) -> Result<()> {
        Err(VoxlineError::ModelLoadFailed {
            message: concat!(
                "whisper feature not enabled; this build has no speech recognition.\n",
                "To fix: cargo build --features whisper\n",
                "If the build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }

    async fn transcribe(
        &self,
        _samples: &[f32],
        _language: &str,
        _ctx: &ChunkContext,
    ) -> Result<Vec<TranscriptSegment>> {
        Err(VoxlineError::InferenceFailed {
            message: "whisper feature not enabled".to_string(),
        })
    }

    fn name(&self) -> &str {
        &self.model_name
    }

    fn reported_language(&self) -> Option<String> {
        self.detected_language.read().ok().and_then(|l| l.clone())
    }

    fn is_ready(&self) -> bool {
        false
    }
}
