//! Configuration loading: TOML file + environment overrides.

use crate::audio::vad::VadConfig;
use crate::chunk::ChunkerConfig;
use crate::defaults;
use crate::error::{Result, VoxlineError};
use crate::pipeline::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub stt: SttConfig,
    pub vad: VadSection,
    pub chunker: ChunkerSection,
    pub pipeline: PipelineSection,
}

/// Speech-to-text engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Path to the recognition model file
    pub model: String,
    /// Language code, "auto" for detection
    pub language: String,
    /// Inference threads (None = engine default)
    pub threads: Option<usize>,
}

/// Voice activity detection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VadSection {
    pub energy_threshold_db: f32,
    pub min_silence_secs: f32,
    pub min_speech_secs: f32,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkerSection {
    pub max_chunk_secs: f64,
    pub overlap_secs: f64,
    pub min_chunk_secs: f64,
}

/// Pipeline behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PipelineSection {
    /// Drop silence before chunking (changes absolute timestamps)
    pub skip_silence: bool,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "models/ggml-base.bin".to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

impl Default for VadSection {
    fn default() -> Self {
        Self {
            energy_threshold_db: defaults::ENERGY_THRESHOLD_DB,
            min_silence_secs: defaults::MIN_SILENCE_SECS,
            min_speech_secs: defaults::MIN_SPEECH_SECS,
        }
    }
}

impl Default for ChunkerSection {
    fn default() -> Self {
        Self {
            max_chunk_secs: defaults::MAX_CHUNK_SECS,
            overlap_secs: defaults::OVERLAP_SECS,
            min_chunk_secs: defaults::MIN_CHUNK_SECS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, or defaults if the file is missing.
    ///
    /// Invalid TOML is still an error; only a missing file falls back.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(VoxlineError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXLINE_MODEL → stt.model
    /// - VOXLINE_LANGUAGE → stt.language
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("VOXLINE_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(language) = std::env::var("VOXLINE_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        self
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunker.max_chunk_secs <= 0.0 {
            return Err(VoxlineError::ConfigInvalidValue {
                key: "chunker.max_chunk_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.chunker.overlap_secs < 0.0 || self.chunker.overlap_secs >= self.chunker.max_chunk_secs
        {
            return Err(VoxlineError::ConfigInvalidValue {
                key: "chunker.overlap_secs".to_string(),
                message: "must be in [0, max_chunk_secs)".to_string(),
            });
        }
        if self.chunker.min_chunk_secs < 0.0 {
            return Err(VoxlineError::ConfigInvalidValue {
                key: "chunker.min_chunk_secs".to_string(),
                message: "must not be negative".to_string(),
            });
        }
        if self.vad.min_silence_secs < 0.0 || self.vad.min_speech_secs < 0.0 {
            return Err(VoxlineError::ConfigInvalidValue {
                key: "vad".to_string(),
                message: "durations must not be negative".to_string(),
            });
        }
        Ok(())
    }

    /// VAD configuration with this file's overrides applied.
    pub fn vad_config(&self) -> VadConfig {
        VadConfig {
            energy_threshold_db: self.vad.energy_threshold_db,
            min_silence_secs: self.vad.min_silence_secs,
            min_speech_secs: self.vad.min_speech_secs,
            ..Default::default()
        }
    }

    /// Chunker configuration with this file's overrides applied.
    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            max_chunk_secs: self.chunker.max_chunk_secs,
            overlap_secs: self.chunker.overlap_secs,
            min_chunk_secs: self.chunker.min_chunk_secs,
            ..Default::default()
        }
    }

    /// Orchestrator configuration assembled from all sections.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            vad: self.vad_config(),
            chunker: self.chunker_config(),
            skip_silence: self.pipeline.skip_silence,
            language: self.stt.language.clone(),
        }
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxline/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> std::path::PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("voxline")
            .join("config.toml")
    }
}
