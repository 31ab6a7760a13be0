//! Command-line driver: transcribe a WAV file and print timestamped segments.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use voxline::{
    Config, Orchestrator, ProgressEvent, RecognitionEngine, Stage, Transcript, WhisperEngine,
    WhisperEngineConfig,
};

/// Offline chunked transcription for long recordings
#[derive(Parser, Debug)]
#[command(name = "voxline", version)]
struct Cli {
    /// WAV file to transcribe
    file: PathBuf,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Recognition model file (overrides config)
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// Language code (default: auto-detect). Examples: auto, en, de, es, fr
    #[arg(long, value_name = "LANG")]
    language: Option<String>,

    /// Drop silence before chunking (timestamps become approximate)
    #[arg(long)]
    skip_silence: bool,

    /// Emit the transcript as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    }
    .with_env_overrides();

    let mut orch_config = config.orchestrator_config();
    if let Some(language) = &cli.language {
        orch_config.language = language.clone();
    }
    if cli.skip_silence {
        orch_config.skip_silence = true;
        if !cli.quiet {
            eprintln!("voxline: silence skipping enabled — timestamps are approximate");
        }
    }

    let model_path = cli
        .model
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.stt.model));
    let engine: Box<dyn RecognitionEngine> = Box::new(WhisperEngine::new(WhisperEngineConfig {
        model_path,
        threads: config.stt.threads,
    }));

    let (progress_tx, progress_rx) = crossbeam_channel::unbounded();
    let orchestrator = Arc::new(
        Orchestrator::new(engine, orch_config).with_progress_sender(progress_tx),
    );

    // Ctrl-C requests cooperative cancellation; partial results still print.
    let canceller = orchestrator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\rvoxline: cancelling…");
            canceller.cancel();
        }
    });

    let printer = (!cli.quiet).then(|| std::thread::spawn(move || print_progress(progress_rx)));

    let transcript = orchestrator.transcribe_file(&cli.file).await?;

    if let Some(handle) = printer
        && handle.join().is_err()
    {
        eprintln!("voxline: progress printer panicked");
    }

    if cli.json {
        print_json(&transcript)?;
    } else {
        print_text(&transcript);
    }

    if transcript.degraded {
        eprintln!(
            "voxline: served by fallback engine '{}'",
            transcript.engine
        );
    }

    match &transcript.status {
        voxline::CompletionStatus::Complete => Ok(()),
        voxline::CompletionStatus::Cancelled => {
            eprintln!("voxline: cancelled — partial transcript above");
            Ok(())
        }
        voxline::CompletionStatus::Failed { chunk_index, error } => {
            anyhow::bail!("inference failed at chunk {}: {}", chunk_index, error)
        }
    }
}

/// Renders progress events to stderr until the request reaches a terminal
/// stage.
fn print_progress(rx: crossbeam_channel::Receiver<ProgressEvent>) {
    for event in rx {
        match event.stage {
            Stage::Preparing => eprint!("\rdecoding audio…{:25}", ""),
            Stage::Transcribing { index, total } => {
                eprint!(
                    "\rtranscribing chunk {}/{} ({:3.0}%){:10}",
                    index + 1,
                    total,
                    event.fraction * 100.0,
                    ""
                );
            }
            Stage::Merging => eprint!("\rmerging segments…{:22}", ""),
            Stage::Completed | Stage::Failed | Stage::Cancelled => {
                eprint!("\r{:40}\r", "");
                break;
            }
            Stage::Idle => {}
        }
    }
}

fn print_text(transcript: &Transcript) {
    for segment in &transcript.segments {
        println!(
            "[{:>8.2} → {:>8.2}]  {}",
            segment.start_secs, segment.end_secs, segment.text
        );
    }
}

fn print_json(transcript: &Transcript) -> Result<()> {
    let status = match &transcript.status {
        voxline::CompletionStatus::Complete => "complete",
        voxline::CompletionStatus::Cancelled => "cancelled",
        voxline::CompletionStatus::Failed { .. } => "failed",
    };
    let value = serde_json::json!({
        "engine": transcript.engine,
        "language": transcript.language,
        "degraded": transcript.degraded,
        "duration_secs": transcript.duration_secs,
        "status": status,
        "segments": transcript
            .segments
            .iter()
            .map(|s| {
                serde_json::json!({
                    "start": s.start_secs,
                    "end": s.end_secs,
                    "text": s.text,
                    "confidence": s.confidence,
                })
            })
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
