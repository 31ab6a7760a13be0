//! End-to-end pipeline tests with a mock recognition engine.
//!
//! The real engine is deliberately absent: these tests exercise the
//! preprocess → VAD → chunk → engine → merge flow and its cancellation and
//! failure semantics, which must hold for any engine.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use voxline::{
    AudioPreprocessor, CancelToken, ChunkProcessor, ChunkerConfig, CompletionStatus, MockEngine,
    Orchestrator, OrchestratorConfig, ProcessedAudio, ProgressEvent, Stage,
};

const RATE: usize = 16000;

fn audio_secs(secs: f64) -> ProcessedAudio {
    ProcessedAudio {
        samples: vec![0.1; (secs * RATE as f64) as usize],
        sample_rate: RATE as u32,
    }
}

fn wav_bytes(samples: &[i16]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE as u32,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
    cursor.into_inner()
}

/// 65s buffer, 30s windows, 1s overlap → chunks [0,30), [29,59), [58,65);
/// one stub segment per chunk merges to absolute starts 0, 29, 58 with no
/// drops.
#[tokio::test]
async fn sixty_five_second_scenario() {
    let engine = MockEngine::new("stub")
        .with_text("text")
        .with_segment_cap_secs(29.0);
    let orchestrator = Orchestrator::new(Box::new(engine), OrchestratorConfig::default());

    let transcript = orchestrator
        .transcribe_samples(audio_secs(65.0))
        .await
        .unwrap();

    assert!(transcript.status.is_complete());
    assert_eq!(transcript.segments.len(), 3);

    let starts: Vec<f64> = transcript.segments.iter().map(|s| s.start_secs).collect();
    assert_eq!(starts, vec![0.0, 29.0, 58.0]);
    for segment in &transcript.segments {
        assert_eq!(segment.text, "text");
    }
    // The last chunk is 7s, kept because it exceeds the 0.5s minimum
    let last = transcript.segments.last().unwrap();
    assert!((last.end_secs - 65.0).abs() < 1e-9);
}

/// Cancelling after chunk 1 of 3 returns exactly chunk 1's segments with a
/// Cancelled status: never an empty result, never later chunks' content.
#[tokio::test]
async fn cancellation_returns_partial_transcript() {
    let token_slot: Arc<Mutex<Option<CancelToken>>> = Arc::new(Mutex::new(None));
    let hook_slot = token_slot.clone();

    let engine = MockEngine::new("stub")
        .with_text("first chunk words")
        .with_segment_cap_secs(29.0)
        .with_call_hook(Arc::new(move |call| {
            if call == 0 {
                if let Some(token) = hook_slot.lock().unwrap().as_ref() {
                    token.cancel();
                }
            }
        }));
    let orchestrator = Orchestrator::new(Box::new(engine), OrchestratorConfig::default());
    *token_slot.lock().unwrap() = Some(orchestrator.cancel_token());

    let transcript = orchestrator
        .transcribe_samples(audio_secs(65.0))
        .await
        .unwrap();

    assert!(transcript.status.is_cancelled());
    assert_eq!(transcript.segments.len(), 1);
    assert_eq!(transcript.segments[0].start_secs, 0.0);
    assert_eq!(transcript.text(), "first chunk words");
}

/// A chunk failure surfaces as Failed with the chunk index, and earlier
/// chunks' segments are preserved rather than discarded.
#[tokio::test]
async fn chunk_failure_preserves_prior_results() {
    let engine = MockEngine::new("stub")
        .with_text("kept")
        .with_segment_cap_secs(29.0)
        .with_failure_on_call(2);
    let orchestrator = Orchestrator::new(Box::new(engine), OrchestratorConfig::default());

    let transcript = orchestrator
        .transcribe_samples(audio_secs(65.0))
        .await
        .unwrap();

    match &transcript.status {
        CompletionStatus::Failed { chunk_index, .. } => assert_eq!(*chunk_index, 2),
        other => panic!("expected Failed, got {:?}", other),
    }
    assert_eq!(transcript.segments.len(), 2);
    let starts: Vec<f64> = transcript.segments.iter().map(|s| s.start_secs).collect();
    assert_eq!(starts, vec![0.0, 29.0]);
}

/// Chunk coverage and count agree for a spread of durations and configs.
#[test]
fn chunk_count_formula_matches_materialized_chunks() {
    let configs = [
        ChunkerConfig::default(),
        ChunkerConfig {
            max_chunk_secs: 10.0,
            overlap_secs: 0.2,
            min_chunk_secs: 0.5,
            sample_rate: RATE as u32,
        },
        ChunkerConfig {
            max_chunk_secs: 5.0,
            overlap_secs: 2.0,
            min_chunk_secs: 0.5,
            sample_rate: RATE as u32,
        },
    ];

    for config in configs {
        let processor = ChunkProcessor::new(config);
        for halves in 1..200usize {
            let secs = halves as f64 / 2.0; // 0.5 .. 99.5 in 0.5s steps
            let buffer = vec![0.0f32; (secs * RATE as f64) as usize];
            let total_secs = buffer.len() as f64 / RATE as f64;

            let chunks = processor.create_chunks(&buffer);
            assert_eq!(
                processor.chunk_count(total_secs),
                chunks.len(),
                "count mismatch at {}s with max={}",
                secs,
                config.max_chunk_secs
            );

            // Coverage: first starts at zero, no gaps between consecutive
            // chunks, and the tail reaches the buffer end except when a
            // dropped sub-minimum sliver shortens it.
            assert_eq!(chunks[0].start_secs, 0.0);
            let tail_gap = total_secs - chunks.last().unwrap().end_secs;
            assert!(
                tail_gap > -1e-6 && tail_gap < config.min_chunk_secs + 1e-6,
                "tail gap {} at {}s with max={}",
                tail_gap,
                secs,
                config.max_chunk_secs
            );
            for pair in chunks.windows(2) {
                assert!(pair[1].start_secs < pair[0].end_secs);
            }
            assert_eq!(chunks.iter().filter(|c| c.is_last).count(), 1);
        }
    }
}

/// Full file path: WAV bytes on disk through decode, chunking, and merge.
#[tokio::test]
async fn wav_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.wav");
    // 3 seconds of audible tone
    std::fs::write(&path, wav_bytes(&vec![6000i16; RATE * 3])).unwrap();

    let engine = MockEngine::new("stub").with_text("the quick brown fox");
    let orchestrator = Orchestrator::new(Box::new(engine), OrchestratorConfig::default());

    let transcript = orchestrator.transcribe_file(&path).await.unwrap();
    assert!(transcript.status.is_complete());
    assert_eq!(transcript.text(), "the quick brown fox");
    assert!((transcript.duration_secs - 3.0).abs() < 1e-6);
}

/// Progress fractions never regress across the whole request and finish at
/// 1.0, ending on the Completed stage.
#[tokio::test]
async fn progress_reporting_is_monotone_end_to_end() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let engine = MockEngine::new("stub").with_text("t").with_segment_cap_secs(29.0);
    let orchestrator =
        Orchestrator::new(Box::new(engine), OrchestratorConfig::default()).with_progress_sender(tx);

    orchestrator
        .transcribe_samples(audio_secs(95.0))
        .await
        .unwrap();

    let events: Vec<ProgressEvent> = rx.try_iter().collect();
    assert!(events.len() >= 4, "too few events: {:?}", events);

    let mut last = 0.0f32;
    for event in &events {
        assert!(event.fraction >= last, "regressed at {:?}", event);
        last = event.fraction;
    }
    assert_eq!(events.last().unwrap().stage, Stage::Completed);
    assert!((last - 1.0).abs() < 1e-6);
}

/// Silence skipping feeds the engine a shorter buffer; a recording that is
/// pure silence produces an empty but Complete transcript.
#[tokio::test]
async fn silence_skipping_end_to_end() {
    let config = OrchestratorConfig {
        skip_silence: true,
        ..Default::default()
    };
    let engine = MockEngine::new("stub").with_text("speech");
    let orchestrator = Orchestrator::new(Box::new(engine), config);

    // 31s: 1s speech, 30s silence. Without filtering this would be two
    // chunks; filtered it collapses to one short chunk.
    let mut samples = vec![0.3f32; RATE];
    samples.extend(vec![0.0f32; RATE * 30]);
    let transcript = orchestrator
        .transcribe_samples(ProcessedAudio {
            samples,
            sample_rate: RATE as u32,
        })
        .await
        .unwrap();

    assert!(transcript.status.is_complete());
    assert_eq!(transcript.segments.len(), 1);
    assert!(transcript.segments[0].end_secs < 2.0);
}

/// The preprocessor's ranged decode slices before the pipeline ever runs.
#[tokio::test]
async fn ranged_decode_feeds_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("long.wav");
    std::fs::write(&path, wav_bytes(&vec![4000i16; RATE * 10])).unwrap();

    let audio = AudioPreprocessor::new()
        .process_range(&path, 2.0, 7.0)
        .unwrap();
    assert!((audio.duration_secs() - 5.0).abs() < 1e-6);

    let engine = MockEngine::new("stub").with_text("excerpt");
    let orchestrator = Orchestrator::new(Box::new(engine), OrchestratorConfig::default());
    let transcript = orchestrator.transcribe_samples(audio).await.unwrap();

    assert!(transcript.status.is_complete());
    assert_eq!(transcript.text(), "excerpt");
    // Timestamps are relative to the excerpt
    assert!((transcript.segments[0].end_secs - 5.0).abs() < 1e-6);
}
