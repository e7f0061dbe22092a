/// Wake-word detection service binary
///
/// Runs the listener standalone against the microphone or a WAV file and
/// prints each wake event as a JSON line. Useful for tuning the threshold
/// and cooldown before wiring the detector to the lights.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use wakeword_detector::{
    init_logging, list_input_devices, spawn_listener, AudioSource, EnergyScorer, ListenerConfig,
    MicrophoneSource, SourceError, WavFileSource, FRAME_SIZE,
};

/// A silent device can keep the listener blocked in a read; don't wait forever
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "wakeword-service")]
#[command(about = "Listen for the wake word and print detections", long_about = None)]
struct Cli {
    /// Replay a 16-bit WAV file instead of capturing from a device
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Input device name (substring match); default input device if omitted
    #[arg(long)]
    device: Option<String>,

    /// Detection threshold (0.0 - 1.0)
    #[arg(long, default_value_t = 0.5)]
    threshold: f32,

    /// Minimum seconds between detections
    #[arg(long, default_value_t = 3.0)]
    cooldown: f64,

    /// Milliseconds the score must stay above threshold
    #[arg(long, default_value_t = 160)]
    dwell_ms: u64,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();

    if cli.list_devices {
        for device in list_input_devices().context("Failed to list input devices")? {
            println!("{}", serde_json::to_string(&device)?);
        }
        return Ok(());
    }

    let config = ListenerConfig {
        threshold: cli.threshold,
        cooldown_seconds: cli.cooldown,
        dwell_ms: cli.dwell_ms,
        ..Default::default()
    };

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let wav = cli.wav.clone();
    let device = cli.device.clone();

    let handle = spawn_listener(
        config,
        Box::new(EnergyScorer::default()),
        move || -> Result<Box<dyn AudioSource>, SourceError> {
            match wav {
                Some(path) => Ok(Box::new(WavFileSource::open(path, FRAME_SIZE)?)),
                None => Ok(Box::new(MicrophoneSource::open(device.as_deref(), FRAME_SIZE)?)),
            }
        },
        move |event| {
            let _ = event_tx.send(event);
        },
    )
    .context("Failed to start wake-word listener")?;

    info!("Wake-word listener running");

    // Event loop
    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(event) => println!("{}", serde_json::to_string(&event)?),
                None => {
                    info!("Event channel closed, shutting down");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping listener");
                break;
            }
        }
    }

    let stats = tokio::task::spawn_blocking(move || handle.join_timeout(STOP_TIMEOUT)).await?;
    match stats {
        Ok(stats) => info!(
            frames = stats.frames_processed,
            wake_events = stats.wake_events,
            scorer_failures = stats.scorer_failures,
            capture_overruns = stats.capture_overruns,
            "Wake-word detection service stopped"
        ),
        Err(e) => warn!("Listener ended with error: {}", e),
    }

    Ok(())
}
