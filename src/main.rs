use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use talkback::audio::{CpalPlayer, CpalRecorder};
use talkback::pipeline::{ArtifactValidator, MIN_ARTIFACT_BYTES};
use talkback::{
    AlwaysGranted, CaptureConfig, CaptureSession, Config, PipelineController, PipelineState,
    PlaybackSession,
};

/// Talkback - push-to-talk voice client
#[derive(Parser)]
#[command(name = "talkback", version, about)]
struct Cli {
    /// Processing server host (bare `host:port` or full URL)
    #[arg(long, env = "TALKBACK_HOST")]
    host: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,talkback=info",
        1 => "info,talkback=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
        };
    }

    let config = Config::load(cli.host.as_deref())?;
    tracing::info!(host = %config.server_host, "starting talkback");

    let recorder = CpalRecorder::new();
    let player = Arc::new(CpalPlayer::new());
    let (mut controller, mut events) =
        PipelineController::with_receiver(recorder, player, &config, Box::new(AlwaysGranted))?;

    // UI collaborator: reflect state changes and show the transcript.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Some(text) = event.transcript {
                println!("\n>>> {text}\n");
            }
            match &event.state {
                PipelineState::Failed(reason) => {
                    println!("[failed] {reason} (press Enter to dismiss)");
                }
                state => println!("[{state}]"),
            }
        }
    });

    println!("Press Enter to start recording, Enter again to stop. Ctrl-D quits.");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(_line) = lines.next_line().await? {
        match controller.state().clone() {
            PipelineState::Idle => {
                let _ = controller.user_start();
            }
            PipelineState::Recording => {
                let _ = controller.user_stop().await;
            }
            PipelineState::Failed(_) => controller.acknowledge(),
            busy => println!("busy ({busy}), hold on"),
        }
    }

    Ok(())
}

/// Record for a few seconds and check the artifact would pass the gate
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Recording for {duration} seconds... speak into your microphone!");

    let dir = tempfile::tempdir()?;
    let config = CaptureConfig::in_dir(dir.path());
    let mut session = CaptureSession::new(CpalRecorder::new(), config);

    session.start()?;
    tokio::time::sleep(Duration::from_secs(duration)).await;
    let artifact = session.stop()?;

    println!("Recorded {} bytes to {}", artifact.len, artifact.path.display());

    let player = Arc::new(CpalPlayer::new());
    match ArtifactValidator::new(player).validate(&artifact) {
        Ok(()) => println!("Artifact passes the upload gate (> {MIN_ARTIFACT_BYTES} bytes, decodable)"),
        Err(e) => println!("Artifact would be rejected: {e}"),
    }

    Ok(())
}

/// Play a 440 Hz tone through the playback path
async fn test_speaker() -> anyhow::Result<()> {
    println!("You should hear a 440 Hz tone for 2 seconds");

    let sample_rate = 16_000u32;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        #[allow(clippy::cast_precision_loss)]
        for i in 0..(sample_rate * 2) {
            let t = i as f32 / sample_rate as f32;
            let sample = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.3;
            #[allow(clippy::cast_possible_truncation)]
            writer.write_sample((sample * 32767.0) as i16)?;
        }
        writer.finalize()?;
    }

    let session = PlaybackSession::new(Arc::new(CpalPlayer::new()));
    session.play(&cursor.into_inner()).await?;

    println!("If you heard the tone, your speakers are working!");
    Ok(())
}
