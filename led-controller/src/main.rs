//! LED controller service binary
//!
//! Wires the command serializer, scene engine, render loop, wake-word
//! listener and HTTP API together and runs until interrupted.

use anyhow::Context;
use clap::{Parser, Subcommand};
use led_controller::{
    api, init_logging, spawn_controller, spawn_render_loop, spawn_scene_engine, AppConfig,
    Command, ControllerHandle, SimulatedRenderer,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use wakeword_detector::{
    list_input_devices, spawn_listener, AudioSource, EnergyScorer, ListenerHandle,
    MicrophoneSource, SourceError,
};

/// Upper bound on waiting for a listener stuck in a blocking read
const LISTENER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "led-service")]
#[command(about = "LED strip controller with wake-word trigger", long_about = None)]
struct Cli {
    /// Path to config.yaml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run without the wake-word listener
    #[arg(long)]
    no_wake_word: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List audio input devices
    Devices,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();

    if let Some(Commands::Devices) = cli.command {
        for device in list_input_devices().context("Failed to list input devices")? {
            println!(
                "{}{} ({} Hz, {} ch)",
                device.name,
                if device.is_default { " [default]" } else { "" },
                device.default_sample_rate,
                device.channels
            );
        }
        return Ok(());
    }

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    let (controller, _serializer) =
        spawn_controller(config.controller_config(), config.scene_library())
            .context("Failed to start command serializer")?;

    let _engine = spawn_scene_engine(controller.clone(), config.led.scene_fps);

    let renderer = SimulatedRenderer::new(config.led.count);
    let render_loop =
        spawn_render_loop(controller.clone(), Box::new(renderer), config.led.render_fps);

    let listener = if cli.no_wake_word || !config.wake_word.enabled {
        info!("Wake-word listener disabled");
        None
    } else {
        start_listener(&config, controller.clone())
    };

    let address = config.bind_address();
    let tcp = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!(address = %address, leds = config.led.count, "LED controller listening");

    axum::serve(tcp, api::router(controller.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutting down");

    if let Some(listener) = listener {
        match tokio::task::spawn_blocking(move || listener.join_timeout(LISTENER_STOP_TIMEOUT))
            .await?
        {
            Ok(stats) => info!(
                frames = stats.frames_processed,
                wake_events = stats.wake_events,
                scorer_failures = stats.scorer_failures,
                capture_overruns = stats.capture_overruns,
                "Wake-word listener stopped"
            ),
            Err(e) => warn!("Wake-word listener ended with error: {}", e),
        }
    }

    // Leave the strip dark
    if let Err(e) = controller.submit(Command::ActivateScene("off".to_string())).await {
        error!("Failed to turn strip off: {}", e);
    }
    tokio::time::sleep(Duration::from_secs_f64(2.0 / config.led.render_fps as f64)).await;
    render_loop.abort();

    Ok(())
}

fn start_listener(config: &AppConfig, controller: ControllerHandle) -> Option<ListenerHandle> {
    if let Some(path) = &config.wake_word.model_path {
        warn!(path = %path, "No model runtime linked, using energy scorer");
    }

    let device = config.audio.device.clone();
    let chunk_size = config.audio.chunk_size;

    let result = spawn_listener(
        config.listener_config(),
        Box::new(EnergyScorer::default()),
        move || -> Result<Box<dyn AudioSource>, SourceError> {
            Ok(Box::new(MicrophoneSource::open(device.as_deref(), chunk_size)?))
        },
        move |event| {
            info!(confidence = event.confidence, "Wake word detected");
            if let Err(e) = controller.submit_nowait(Command::WakeTriggered) {
                warn!("Dropped wake event: {}", e);
            }
        },
    );

    match result {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!("Wake-word listener unavailable: {}", e);
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
