//! Voice Activity Detection (VAD) module.
//!
//! Detects speech activity in a sample buffer using frame-level RMS energy
//! thresholding in dB, collapsing frame classifications into speech segments.
//!
//! Deliberately simple: the point is to avoid spending expensive neural
//! inference on silence, not to compete with statistical VAD models.

use crate::defaults;

/// Floor applied to RMS before the dB conversion so all-zero frames map to
/// -200 dB instead of negative infinity.
const RMS_FLOOR: f32 = 1e-10;

/// Configuration for Voice Activity Detection.
#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// Energy threshold in dBFS; frames above this are speech.
    pub energy_threshold_db: f32,
    /// Silence duration in seconds that closes an open speech segment.
    pub min_silence_secs: f32,
    /// Minimum duration in seconds for a segment to be emitted.
    pub min_speech_secs: f32,
    /// Analysis window size in samples.
    pub frame_size: usize,
    /// Step between consecutive windows in samples.
    pub hop_size: usize,
    /// Sample rate in Hz (used for time conversions).
    pub sample_rate: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold_db: defaults::ENERGY_THRESHOLD_DB,
            min_silence_secs: defaults::MIN_SILENCE_SECS,
            min_speech_secs: defaults::MIN_SPEECH_SECS,
            frame_size: defaults::VAD_FRAME_SIZE,
            hop_size: defaults::VAD_HOP_SIZE,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

/// A detected span of speech, relative to the analyzed buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechSegment {
    /// Start of the span in seconds; always `< end_secs`.
    pub start_secs: f32,
    /// End of the span in seconds.
    pub end_secs: f32,
}

impl SpeechSegment {
    /// Returns the span duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        self.end_secs - self.start_secs
    }
}

/// Result of analyzing a buffer for speech activity.
#[derive(Debug, Clone, PartialEq)]
pub struct VadAnalysis {
    /// Detected speech spans in buffer order.
    pub segments: Vec<SpeechSegment>,
    /// Fraction of the buffer covered by speech, 0 for an empty buffer.
    pub speech_ratio: f32,
    /// Total detected speech duration in seconds.
    pub total_speech_secs: f32,
}

/// Frame-level energy-based voice activity detector.
///
/// All operations are pure functions over the input buffer; there is no
/// internal state and no failure path. Empty input yields zero segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct VadFilter {
    config: VadConfig,
}

impl VadFilter {
    /// Creates a detector with the given configuration.
    pub fn new(config: VadConfig) -> Self {
        Self { config }
    }

    /// Returns the detector configuration.
    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    /// Detects speech spans in the buffer.
    ///
    /// Frames of `frame_size` samples are classified every `hop_size`
    /// samples; a segment opens at the first speech frame, survives silence
    /// runs shorter than `min_silence_secs`, and is emitted if it lasted at
    /// least `min_speech_secs`. The trailing in-progress segment is flushed
    /// with the same minimum-duration test.
    pub fn analyze(&self, samples: &[f32]) -> VadAnalysis {
        let total_secs = samples.len() as f32 / self.config.sample_rate as f32;
        let frame_secs = self.config.hop_size as f32 / self.config.sample_rate as f32;
        let min_silence_frames = self.frames_for(self.config.min_silence_secs);
        let min_speech_frames = self.frames_for(self.config.min_speech_secs);

        let mut segments = Vec::new();
        // Frame index where the open segment started, if any.
        let mut seg_start: Option<usize> = None;
        // One past the last speech frame of the open segment.
        let mut seg_end = 0usize;
        let mut silence_run = 0usize;

        let mut frame_idx = 0usize;
        let mut pos = 0usize;
        while pos + self.config.frame_size <= samples.len() {
            let frame = &samples[pos..pos + self.config.frame_size];
            let is_speech = frame_energy_db(frame) > self.config.energy_threshold_db;

            if is_speech {
                if seg_start.is_none() {
                    seg_start = Some(frame_idx);
                }
                seg_end = frame_idx + 1;
                silence_run = 0;
            } else if let Some(start) = seg_start {
                silence_run += 1;
                if silence_run >= min_silence_frames {
                    if seg_end - start >= min_speech_frames {
                        segments.push(SpeechSegment {
                            start_secs: start as f32 * frame_secs,
                            end_secs: seg_end as f32 * frame_secs,
                        });
                    }
                    seg_start = None;
                    silence_run = 0;
                }
            }

            pos += self.config.hop_size;
            frame_idx += 1;
        }

        // Flush the trailing in-progress segment.
        if let Some(start) = seg_start
            && seg_end - start >= min_speech_frames
        {
            segments.push(SpeechSegment {
                start_secs: start as f32 * frame_secs,
                end_secs: seg_end as f32 * frame_secs,
            });
        }

        let total_speech_secs: f32 = segments.iter().map(SpeechSegment::duration_secs).sum();
        let speech_ratio = if total_secs > 0.0 {
            total_speech_secs / total_secs
        } else {
            0.0
        };

        VadAnalysis {
            segments,
            speech_ratio,
            total_speech_secs,
        }
    }

    /// Concatenates the sample ranges belonging to detected speech segments.
    ///
    /// The output is a new owned buffer; timestamps computed from it no
    /// longer line up with the original recording.
    pub fn filter_silence(&self, samples: &[f32]) -> Vec<f32> {
        let analysis = self.analyze(samples);
        let rate = self.config.sample_rate as f32;
        let mut out = Vec::new();
        for segment in &analysis.segments {
            let start = (segment.start_secs * rate) as usize;
            let end = ((segment.end_secs * rate) as usize).min(samples.len());
            if start < end {
                out.extend_from_slice(&samples[start..end]);
            }
        }
        out
    }

    /// Returns true if less than `threshold` of the buffer is speech.
    pub fn is_mostly_silence(&self, samples: &[f32], threshold: f32) -> bool {
        self.analyze(samples).speech_ratio < threshold
    }

    /// Converts a duration to a frame count, rounding up, minimum one frame.
    fn frames_for(&self, secs: f32) -> usize {
        let frame_secs = self.config.hop_size as f32 / self.config.sample_rate as f32;
        ((secs / frame_secs).ceil() as usize).max(1)
    }
}

/// RMS energy of one frame in dBFS.
pub fn frame_energy_db(frame: &[f32]) -> f32 {
    20.0 * rms(frame).max(RMS_FLOOR).log10()
}

/// Root mean square of a sample slice; 0 for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}
