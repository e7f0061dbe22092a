/// Wake-word detector library
///
/// Audio capture, opaque wake-word scoring and a debounced detection state
/// machine that emits discrete wake events for the LED controller.

pub mod audio_buffer;
pub mod debouncer;
pub mod listener;
pub mod scorer;
pub mod source;

// Re-export main types
pub use audio_buffer::{AudioBuffer, AudioBufferError, AudioSample, FRAME_SIZE, SAMPLE_RATE};
pub use debouncer::{DebounceConfig, DebounceError, Debouncer, Detection, DetectionSession, Phase};
pub use listener::{
    spawn_listener, ListenerConfig, ListenerError, ListenerHandle, ListenerStats, WakeEvent,
    WakeWordListener,
};
pub use scorer::{EnergyScorer, ScorerError, WakeWordScorer};
pub use source::{
    list_input_devices, AudioSource, ChunkResampler, InputDeviceInfo, MicrophoneSource,
    SourceError, WavFileSource,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wakeword_detector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
