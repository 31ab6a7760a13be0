//! Chunking and segment merging for long recordings.
//!
//! The recognition engine accepts a bounded window of audio per call, so a
//! long buffer is split into overlapping windows and the per-window segment
//! lists are merged back into one absolute-timestamped transcript. The
//! overlap keeps words spoken at a window boundary intact in at least one
//! window; the merge drops the duplicate reading from the other side.

use crate::defaults;
use crate::stt::TranscriptSegment;

/// Configuration for the chunk processor.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Maximum chunk duration in seconds (engine context window).
    pub max_chunk_secs: f64,
    /// Overlap between consecutive chunks in seconds.
    pub overlap_secs: f64,
    /// Minimum chunk duration in seconds; a shorter trailing sliver is
    /// dropped when a prior chunk already covers it.
    pub min_chunk_secs: f64,
    /// Sample rate for time/index conversions.
    pub sample_rate: u32,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_secs: defaults::MAX_CHUNK_SECS,
            overlap_secs: defaults::OVERLAP_SECS,
            min_chunk_secs: defaults::MIN_CHUNK_SECS,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

/// A bounded window of audio sized for one inference call.
///
/// Times are absolute, relative to the original buffer. Chunks are produced
/// in increasing index order; consecutive chunks overlap by exactly the
/// configured overlap, except the final chunk which may be shorter.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Position in the chunk sequence.
    pub index: usize,
    /// Absolute start time in seconds.
    pub start_secs: f64,
    /// Absolute end time in seconds (exclusive).
    pub end_secs: f64,
    /// Owned copy of the samples in `[start_secs, end_secs)`.
    pub samples: Vec<f32>,
    /// True for exactly one chunk per buffer: the one covering the tail.
    pub is_last: bool,
}

impl AudioChunk {
    /// Returns the chunk duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Returns true if the absolute time `t` falls inside this chunk.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_secs && t < self.end_secs
    }
}

/// Splits sample buffers into overlapping windows and merges per-window
/// segment lists back into one deduplicated transcript.
///
/// Both operations are pure and total over well-formed input; malformed
/// input (negative durations, mismatched list lengths) is a caller bug and
/// is guarded upstream by the orchestrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkProcessor {
    config: ChunkerConfig,
}

impl ChunkProcessor {
    /// Creates a processor with the given configuration.
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Returns the processor configuration.
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Splits `samples` into overlapping chunks covering the whole buffer.
    ///
    /// Windows advance by `max_chunk_secs - overlap_secs`. A buffer no
    /// longer than one window yields a single chunk. A trailing sliver
    /// shorter than `min_chunk_secs` is dropped when a prior chunk exists
    /// (its content is already inside the previous chunk's tail), and the
    /// previous chunk takes over the `is_last` flag. An empty buffer yields
    /// no chunks.
    pub fn create_chunks(&self, samples: &[f32]) -> Vec<AudioChunk> {
        if samples.is_empty() {
            return Vec::new();
        }

        let rate = self.config.sample_rate as f64;
        let total_secs = samples.len() as f64 / rate;
        let step = self.config.max_chunk_secs - self.config.overlap_secs;

        let mut chunks: Vec<AudioChunk> = Vec::new();
        let mut start = 0.0f64;
        let mut index = 0usize;

        loop {
            let end = (start + self.config.max_chunk_secs).min(total_secs);
            let is_last = end >= total_secs;

            if is_last && end - start < self.config.min_chunk_secs && !chunks.is_empty() {
                // Pure-overlap sliver; the previous chunk already covers it.
                if let Some(prev) = chunks.last_mut() {
                    prev.is_last = true;
                }
                break;
            }

            let start_idx = (start * rate).floor() as usize;
            let end_idx = ((end * rate).floor() as usize).min(samples.len());
            chunks.push(AudioChunk {
                index,
                start_secs: start,
                end_secs: end,
                samples: samples[start_idx..end_idx].to_vec(),
                is_last,
            });

            if is_last {
                break;
            }
            start += step;
            index += 1;
        }

        chunks
    }

    /// Returns the number of chunks `create_chunks` would produce for a
    /// buffer of the given duration, without materializing them.
    ///
    /// Used to size progress reporting before processing begins.
    pub fn chunk_count(&self, total_secs: f64) -> usize {
        if total_secs <= 0.0 {
            return 0;
        }
        if total_secs <= self.config.max_chunk_secs {
            return 1;
        }

        let step = self.config.max_chunk_secs - self.config.overlap_secs;
        let naive = ((total_secs - self.config.overlap_secs) / step).ceil() as usize;

        // The walk's final window may be a dropped sliver.
        let last_start = step * (naive - 1) as f64;
        if naive > 1 && total_secs - last_start < self.config.min_chunk_secs {
            naive - 1
        } else {
            naive
        }
    }

    /// Merges per-chunk segment lists into one absolute-timestamped,
    /// deduplicated sequence.
    ///
    /// Each chunk's segments are shifted from chunk-relative to absolute
    /// time, then appended in chunk order. A candidate whose absolute start
    /// lies more than half the overlap before the last appended segment's
    /// end is a re-reading of the overlap region and is dropped.
    ///
    /// Greedy and order-preserving; no text-level stitching of words split
    /// across a boundary. `per_chunk` may be shorter than `chunks` (a
    /// cancelled request merges only the completed prefix).
    pub fn merge_segments(
        &self,
        per_chunk: Vec<Vec<TranscriptSegment>>,
        chunks: &[AudioChunk],
    ) -> Vec<TranscriptSegment> {
        let half_overlap = self.config.overlap_secs / 2.0;
        let mut merged: Vec<TranscriptSegment> = Vec::new();

        for (chunk, segments) in chunks.iter().zip(per_chunk) {
            for seg in segments {
                let start_secs = seg.start_secs + chunk.start_secs;
                let end_secs = seg.end_secs + chunk.start_secs;

                if let Some(last) = merged.last()
                    && start_secs < last.end_secs - half_overlap
                {
                    // Duplicate produced by the overlap region.
                    continue;
                }

                merged.push(TranscriptSegment {
                    start_secs,
                    end_secs,
                    ..seg
                });
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16000;

    fn processor() -> ChunkProcessor {
        ChunkProcessor::new(ChunkerConfig::default())
    }

    fn make_buffer(secs: f64) -> Vec<f32> {
        vec![0.1; (secs * RATE as f64) as usize]
    }

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start_secs: start,
            end_secs: end,
            text: text.to_string(),
            confidence: None,
        }
    }

    #[test]
    fn short_buffer_yields_single_chunk() {
        let chunks = processor().create_chunks(&make_buffer(10.0));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].start_secs, 0.0);
        assert!((chunks[0].end_secs - 10.0).abs() < 1e-9);
        assert!(chunks[0].is_last);
    }

    #[test]
    fn exact_window_yields_single_chunk() {
        let chunks = processor().create_chunks(&make_buffer(30.0));
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_last);
        assert!((chunks[0].duration_secs() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn empty_buffer_yields_no_chunks() {
        assert!(processor().create_chunks(&[]).is_empty());
        assert_eq!(processor().chunk_count(0.0), 0);
    }

    #[test]
    fn sixty_five_second_buffer_yields_three_chunks() {
        // step = 29s: [0,30), [29,59), [58,65)
        let chunks = processor().create_chunks(&make_buffer(65.0));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start_secs, 0.0);
        assert_eq!(chunks[1].start_secs, 29.0);
        assert_eq!(chunks[2].start_secs, 58.0);
        assert!((chunks[2].end_secs - 65.0).abs() < 1e-9);
        assert!((chunks[2].duration_secs() - 7.0).abs() < 1e-9);
        assert!(!chunks[0].is_last);
        assert!(!chunks[1].is_last);
        assert!(chunks[2].is_last);
    }

    #[test]
    fn chunks_cover_buffer_without_gaps() {
        for secs in [5.0, 29.0, 30.0, 31.0, 58.0, 59.0, 65.0, 120.0, 300.5] {
            let chunks = processor().create_chunks(&make_buffer(secs));
            let total = make_buffer(secs).len() as f64 / RATE as f64;

            assert_eq!(chunks[0].start_secs, 0.0, "duration {}", secs);
            assert!(
                (chunks.last().unwrap().end_secs - total).abs() < 1e-6,
                "duration {}: last end {}",
                secs,
                chunks.last().unwrap().end_secs
            );
            for pair in chunks.windows(2) {
                assert!(
                    pair[1].start_secs < pair[0].end_secs,
                    "gap between chunks at duration {}",
                    secs
                );
                // Consecutive chunks overlap by exactly the configured overlap
                assert!(
                    (pair[0].end_secs - pair[1].start_secs - 1.0).abs() < 1e-9,
                    "overlap mismatch at duration {}",
                    secs
                );
            }
            // Every chunk except the last has the full window duration
            for chunk in &chunks[..chunks.len() - 1] {
                assert!((chunk.duration_secs() - 30.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn chunk_indices_are_sequential() {
        let chunks = processor().create_chunks(&make_buffer(120.0));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
        assert_eq!(chunks.iter().filter(|c| c.is_last).count(), 1);
    }

    #[test]
    fn chunk_samples_match_time_range() {
        let samples: Vec<f32> = (0..RATE as usize * 65).map(|i| i as f32).collect();
        let chunks = processor().create_chunks(&samples);

        for chunk in &chunks {
            let expected_start = (chunk.start_secs * RATE as f64) as usize;
            assert_eq!(chunk.samples[0], expected_start as f32, "chunk {}", chunk.index);
            let expected_len = ((chunk.end_secs - chunk.start_secs) * RATE as f64).round() as usize;
            assert_eq!(chunk.samples.len(), expected_len, "chunk {}", chunk.index);
        }
    }

    #[test]
    fn chunk_count_matches_create_chunks() {
        let p = processor();
        for secs in [
            0.4, 1.0, 29.0, 29.5, 30.0, 30.001, 31.0, 58.0, 58.9, 59.0, 59.1, 65.0, 87.0, 88.0,
            120.0, 299.5, 300.0,
        ] {
            let buffer = make_buffer(secs);
            let actual_secs = buffer.len() as f64 / RATE as f64;
            assert_eq!(
                p.chunk_count(actual_secs),
                p.create_chunks(&buffer).len(),
                "mismatch at duration {}",
                secs
            );
        }
    }

    #[test]
    fn trailing_sliver_is_dropped() {
        // step = 9.8s with a 0.5s minimum: a 19.9s buffer's third window
        // would span [19.6, 19.9), pure overlap, and is dropped.
        let p = ChunkProcessor::new(ChunkerConfig {
            max_chunk_secs: 10.0,
            overlap_secs: 0.2,
            min_chunk_secs: 0.5,
            sample_rate: RATE,
        });
        let buffer = make_buffer(19.9);
        let total = buffer.len() as f64 / RATE as f64;

        let chunks = p.create_chunks(&buffer);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].is_last, "previous chunk takes over the last flag");
        assert_eq!(p.chunk_count(total), 2);

        // The naive count formula would have said 3.
        let step = 10.0 - 0.2;
        let naive = ((total - 0.2) / step).ceil() as usize;
        assert_eq!(naive, 3);
    }

    #[test]
    fn sliver_kept_when_it_is_the_only_chunk() {
        let p = ChunkProcessor::new(ChunkerConfig {
            max_chunk_secs: 10.0,
            overlap_secs: 0.2,
            min_chunk_secs: 0.5,
            sample_rate: RATE,
        });
        // 0.3s buffer: below min_chunk_secs but there is no prior chunk
        let chunks = p.create_chunks(&make_buffer(0.3));
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_last);
        assert_eq!(p.chunk_count(0.3), 1);
    }

    #[test]
    fn merge_shifts_timestamps_to_absolute() {
        let p = processor();
        let chunks = p.create_chunks(&make_buffer(65.0));

        let per_chunk = vec![
            vec![seg(0.5, 4.0, "first"), seg(5.0, 10.0, "second")],
            vec![seg(2.0, 6.0, "third")],
            vec![seg(1.0, 3.0, "fourth")],
        ];

        let merged = p.merge_segments(per_chunk, &chunks);
        assert_eq!(merged.len(), 4);
        assert_eq!(merged[0].start_secs, 0.5);
        assert_eq!(merged[1].start_secs, 5.0);
        assert_eq!(merged[2].start_secs, 31.0); // 29 + 2
        assert_eq!(merged[3].start_secs, 59.0); // 58 + 1
        assert_eq!(merged[2].text, "third");
    }

    #[test]
    fn merge_output_is_monotone() {
        let p = processor();
        let chunks = p.create_chunks(&make_buffer(120.0));

        // Sorted per-chunk lists with segments crowding the boundaries
        let per_chunk: Vec<Vec<TranscriptSegment>> = chunks
            .iter()
            .map(|c| {
                let dur = c.duration_secs();
                vec![
                    seg(0.2, dur.min(6.0), "a"),
                    seg(dur * 0.4, dur * 0.6, "b"),
                    seg(dur * 0.8, dur, "c"),
                ]
            })
            .collect();

        let merged = p.merge_segments(per_chunk, &chunks);
        for pair in merged.windows(2) {
            assert!(
                pair[1].start_secs >= pair[0].start_secs,
                "start order violated: {} then {}",
                pair[0].start_secs,
                pair[1].start_secs
            );
        }
    }

    #[test]
    fn merge_drops_overlap_duplicates() {
        let p = processor();
        let chunks = p.create_chunks(&make_buffer(59.0)); // [0,30), [29,59)

        // Chunk 1's last segment runs to its end (absolute 30.0). Chunk 2
        // re-emits the overlap words as a segment starting at relative 0.2
        // (absolute 29.2), well before 30.0 - 0.5.
        let per_chunk = vec![
            vec![seg(0.0, 28.0, "body"), seg(28.0, 30.0, "tail words")],
            vec![seg(0.2, 1.0, "tail words"), seg(1.6, 10.0, "fresh content")],
        ];

        let merged = p.merge_segments(per_chunk, &chunks);
        let texts: Vec<&str> = merged.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["body", "tail words", "fresh content"]);
        // The kept re-reading starts at 29 + 1.6 = 30.6
        assert!((merged[2].start_secs - 30.6).abs() < 1e-9);
    }

    #[test]
    fn merge_keeps_candidate_at_exact_threshold() {
        let p = processor();
        let chunks = p.create_chunks(&make_buffer(59.0));

        // Candidate starting exactly at last.end - overlap/2 is kept
        let per_chunk = vec![
            vec![seg(0.0, 30.0, "body")],
            vec![seg(0.5, 4.0, "boundary")], // absolute 29.5 = 30.0 - 0.5
        ];

        let merged = p.merge_segments(per_chunk, &chunks);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].text, "boundary");
    }

    #[test]
    fn merge_with_partial_chunk_results() {
        // A cancelled request merges only the completed prefix.
        let p = processor();
        let chunks = p.create_chunks(&make_buffer(65.0));

        let per_chunk = vec![vec![seg(0.0, 29.0, "only chunk done")]];
        let merged = p.merge_segments(per_chunk, &chunks);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "only chunk done");
    }

    #[test]
    fn merge_empty_lists_yield_empty_transcript() {
        let p = processor();
        let chunks = p.create_chunks(&make_buffer(65.0));
        let merged = p.merge_segments(vec![vec![], vec![], vec![]], &chunks);
        assert!(merged.is_empty());
    }

    #[test]
    fn absolute_time_recovers_producing_chunk() {
        let p = processor();
        let chunks = p.create_chunks(&make_buffer(65.0));

        // Shift a chunk-relative time into absolute time, then look up which
        // chunk contains it.
        for chunk in &chunks {
            let t = chunk.start_secs + chunk.duration_secs() / 2.0;
            let owner = chunks.iter().find(|c| c.contains(t)).unwrap();
            assert!(owner.contains(t));
            // Mid-chunk times in the non-overlap region map back uniquely
            if t >= chunk.start_secs + 1.0 && t < chunk.end_secs - 1.0 {
                assert_eq!(owner.index, chunk.index);
            }
        }
    }
}
