//! Audio preprocessing: decode, downmix, and resample to canonical PCM.
//!
//! Every downstream stage assumes mono f32 samples at 16kHz. This module is
//! the only place that ever sees the source container format.

use crate::defaults;
use crate::error::{Result, VoxlineError};
use std::io::Read;
use std::path::Path;

/// Decoded audio in the canonical format: mono f32 PCM at the target rate.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedAudio {
    /// Mono samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (always the preprocessor's target rate).
    pub sample_rate: u32,
}

impl ProcessedAudio {
    /// Returns the duration of this buffer in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Returns true if the buffer contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decodes WAV audio of arbitrary rate and channel count down to mono
/// 16kHz f32, the format the recognition engine requires.
///
/// Stateless; decoding the same input always produces the same output.
#[derive(Debug, Clone, Copy)]
pub struct AudioPreprocessor {
    target_rate: u32,
}

impl Default for AudioPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPreprocessor {
    /// Creates a preprocessor targeting the canonical 16kHz rate.
    pub fn new() -> Self {
        Self {
            target_rate: defaults::SAMPLE_RATE,
        }
    }

    /// Returns the target sample rate in Hz.
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Decodes a WAV file into canonical PCM.
    ///
    /// # Errors
    /// `FileNotFound` if the path does not exist, `ReadFailed` if the
    /// container cannot be parsed, `InvalidFormat` for unsupported sample
    /// encodings, `ConversionFailed` if downmixing is impossible.
    pub fn process(&self, path: &Path) -> Result<ProcessedAudio> {
        if !path.exists() {
            return Err(VoxlineError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }
        let file = std::fs::File::open(path)?;
        self.process_reader(std::io::BufReader::new(file))
    }

    /// Decodes a WAV file and slices the result to `[start_secs, end_secs)`.
    ///
    /// The file is fully decoded first, then sliced by sample index; the end
    /// is clamped to the buffer length.
    ///
    /// # Errors
    /// Same as [`process`](Self::process), plus `AudioTooShort` when the
    /// requested range contains no samples.
    pub fn process_range(
        &self,
        path: &Path,
        start_secs: f64,
        end_secs: f64,
    ) -> Result<ProcessedAudio> {
        let full = self.process(path)?;
        let rate = full.sample_rate as f64;
        let start = (start_secs.max(0.0) * rate).floor() as usize;
        let end = ((end_secs * rate).floor() as usize).min(full.samples.len());
        if start >= end {
            return Err(VoxlineError::AudioTooShort {
                duration_secs: 0.0,
            });
        }
        Ok(ProcessedAudio {
            samples: full.samples[start..end].to_vec(),
            sample_rate: full.sample_rate,
        })
    }

    /// Decodes WAV data from any reader (pipe mode, in-memory fixtures).
    pub fn process_reader(&self, reader: impl Read) -> Result<ProcessedAudio> {
        let mut wav_reader =
            hound::WavReader::new(reader).map_err(|e| VoxlineError::ReadFailed {
                message: format!("failed to parse WAV container: {}", e),
            })?;

        let spec = wav_reader.spec();
        if spec.channels == 0 {
            return Err(VoxlineError::ConversionFailed {
                message: "WAV header declares zero channels".to_string(),
            });
        }

        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => wav_reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| VoxlineError::ReadFailed {
                    message: format!("failed to read WAV samples: {}", e),
                })?,
            (hound::SampleFormat::Int, 32) => wav_reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2_147_483_648.0))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| VoxlineError::ReadFailed {
                    message: format!("failed to read WAV samples: {}", e),
                })?,
            (hound::SampleFormat::Float, 32) => wav_reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| VoxlineError::ReadFailed {
                    message: format!("failed to read WAV samples: {}", e),
                })?,
            (format, bits) => {
                return Err(VoxlineError::InvalidFormat {
                    message: format!("unsupported sample encoding: {:?} {}-bit", format, bits),
                });
            }
        };

        let mono = downmix(&interleaved, spec.channels as usize);
        let samples = if spec.sample_rate != self.target_rate {
            resample(&mono, spec.sample_rate, self.target_rate)
        } else {
            mono
        };

        Ok(ProcessedAudio {
            samples,
            sample_rate: self.target_rate,
        })
    }
}

/// Averages interleaved frames down to a single channel.
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Simple linear interpolation resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = (source_pos - source_idx as f64) as f32;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx];
                let right = samples[source_idx + 1];
                left + (right - left) * fraction
            }
        })
        .collect()
}
