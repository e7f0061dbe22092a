/// Wake-word listener
///
/// Audio source -> frame assembly -> scorer -> debouncer -> wake events.
/// The debouncer is clocked by audio time (samples consumed), so a replayed
/// recording and a live microphone see identical cooldown behaviour.

use crate::audio_buffer::{AudioBuffer, AudioSample, BUFFER_SIZE, FRAME_SIZE, SAMPLE_RATE};
use crate::debouncer::{DebounceConfig, DebounceError, Debouncer, Phase};
use crate::scorer::WakeWordScorer;
use crate::source::{AudioSource, SourceError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Debouncer error: {0}")]
    Debounce(#[from] DebounceError),

    #[error("Audio source error: {0}")]
    Source(#[from] SourceError),

    #[error("Listener thread failed: {0}")]
    Thread(String),

    #[error("Listener did not stop within {0:?}")]
    StopTimeout(Duration),
}

/// Wake-word detection result
#[derive(Debug, Clone, Serialize)]
pub struct WakeEvent {
    /// Wall-clock time of detection (microseconds since epoch)
    pub timestamp: i64,

    /// Peak score over the confirming run (0.0 - 1.0)
    pub confidence: f32,

    /// Offset into the audio stream (milliseconds)
    pub stream_offset_ms: u64,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Detection threshold (0.0 - 1.0)
    pub threshold: f32,

    /// Minimum time between detections
    pub cooldown_seconds: f64,

    /// Time the score must stay above threshold before a detection fires
    pub dwell_ms: u64,

    /// Samples per scorer frame (1280 = 80ms at 16kHz)
    pub frame_size: usize,

    /// Model file handed to the scorer; opaque to the listener
    pub model_path: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            cooldown_seconds: 3.0,
            dwell_ms: 160,
            frame_size: FRAME_SIZE,
            model_path: None,
        }
    }
}

impl ListenerConfig {
    pub fn debounce(&self) -> DebounceConfig {
        DebounceConfig {
            threshold: self.threshold,
            cooldown_seconds: self.cooldown_seconds,
            dwell_ms: self.dwell_ms,
        }
    }

    pub fn validate(&self) -> Result<(), ListenerError> {
        self.debounce().validate()?;

        if self.frame_size == 0 || self.frame_size > BUFFER_SIZE {
            return Err(ListenerError::InvalidConfig(format!(
                "frame_size must be between 1 and {}, got {}",
                BUFFER_SIZE, self.frame_size
            )));
        }

        Ok(())
    }
}

/// Listener statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListenerStats {
    pub frames_processed: u64,
    pub wake_events: u64,
    pub scorer_failures: u64,
    pub peak_score: f32,
    pub dropped_samples: u64,

    /// Capture chunks the audio source discarded before we read them
    pub capture_overruns: u64,
}

/// Scores audio frames and emits debounced wake events
pub struct WakeWordListener {
    scorer: Box<dyn WakeWordScorer>,
    debouncer: Debouncer,
    buffer: AudioBuffer,
    samples_consumed: u64,
    stats: ListenerStats,
}

impl WakeWordListener {
    pub fn new(config: ListenerConfig, scorer: Box<dyn WakeWordScorer>) -> Result<Self, ListenerError> {
        config.validate()?;

        info!(
            scorer = %scorer.name(),
            threshold = config.threshold,
            cooldown_seconds = config.cooldown_seconds,
            dwell_ms = config.dwell_ms,
            "Initializing wake-word listener"
        );
        if let Some(model) = &config.model_path {
            info!("Model: {}", model);
        }

        let buffer = AudioBuffer::with_frame_size(config.frame_size, BUFFER_SIZE)
            .map_err(|e| ListenerError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            scorer,
            debouncer: Debouncer::new(config.debounce())?,
            buffer,
            samples_consumed: 0,
            stats: ListenerStats::default(),
        })
    }

    /// Feed captured samples; returns the wake events they completed
    pub fn process_audio(&mut self, samples: &[AudioSample]) -> Vec<WakeEvent> {
        self.buffer.write(samples);
        self.stats.dropped_samples = self.buffer.dropped_samples();

        let mut events = Vec::new();

        while let Some(frame) = self.buffer.next_frame() {
            self.samples_consumed += frame.len() as u64;
            let at = self.stream_time();

            // A failed frame counts as silence so errors never trigger
            let score = match self.scorer.score(&frame) {
                Ok(score) => score,
                Err(e) => {
                    warn!("Scorer error: {}", e);
                    self.stats.scorer_failures += 1;
                    0.0
                }
            };

            self.stats.frames_processed += 1;
            if score > self.stats.peak_score {
                self.stats.peak_score = score;
            }

            if let Some(detection) = self.debouncer.process(score, at) {
                self.stats.wake_events += 1;
                events.push(WakeEvent {
                    timestamp: current_timestamp_micros(),
                    confidence: detection.confidence,
                    stream_offset_ms: detection.at.as_millis() as u64,
                });
            }

            if self.stats.frames_processed % 1000 == 0 {
                debug!(
                    "Processed {} frames, detected {} wake-words",
                    self.stats.frames_processed, self.stats.wake_events
                );
            }
        }

        events
    }

    /// Pull audio from `source` until it ends or `stop` is raised
    pub fn run<F>(
        &mut self,
        source: &mut dyn AudioSource,
        stop: &AtomicBool,
        mut on_wake: F,
    ) -> Result<(), ListenerError>
    where
        F: FnMut(WakeEvent),
    {
        info!("Listening on {}", source.describe());

        while !stop.load(Ordering::Relaxed) {
            match source.next_chunk()? {
                Some(chunk) => {
                    for event in self.process_audio(&chunk) {
                        on_wake(event);
                    }

                    let overruns = source.overruns();
                    if overruns > self.stats.capture_overruns {
                        warn!(
                            lost = overruns - self.stats.capture_overruns,
                            total = overruns,
                            "Capture overrun, listener is falling behind"
                        );
                        self.stats.capture_overruns = overruns;
                    }
                }
                None => {
                    info!("Audio source ended");
                    break;
                }
            }
        }

        Ok(())
    }

    fn stream_time(&self) -> Duration {
        Duration::from_micros(self.samples_consumed * 1_000_000 / SAMPLE_RATE as u64)
    }

    pub fn stats(&self) -> &ListenerStats {
        &self.stats
    }

    pub fn phase(&self) -> Phase {
        self.debouncer.phase()
    }

    /// Reset buffered audio, scorer and debouncer state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scorer.reset();
        self.debouncer.reset();
        self.samples_consumed = 0;
        self.stats = ListenerStats::default();
        info!("Listener reset");
    }
}

/// Handle to a listener running on its own thread
pub struct ListenerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<ListenerStats, ListenerError>>>,
}

impl ListenerHandle {
    /// Ask the listener to stop after its current chunk
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stop and wait for the thread, returning its final statistics
    pub fn join(self) -> Result<ListenerStats, ListenerError> {
        self.stop();
        self.wait()
    }

    /// Stop and wait at most `timeout` for the thread
    ///
    /// The stop flag is only seen between chunks, so a source blocked on a
    /// silent device can hold the thread indefinitely. On timeout the thread
    /// is left detached and `StopTimeout` is returned.
    pub fn join_timeout(self, timeout: Duration) -> Result<ListenerStats, ListenerError> {
        self.stop();

        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                warn!(?timeout, "Wake-word listener did not stop, detaching");
                return Err(ListenerError::StopTimeout(timeout));
            }
            std::thread::sleep(JOIN_POLL_INTERVAL);
        }

        self.wait()
    }

    /// Wait for the source to run dry without raising the stop flag
    pub fn wait(mut self) -> Result<ListenerStats, ListenerError> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| ListenerError::Thread("listener thread panicked".to_string()))?,
            None => Ok(ListenerStats::default()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run a listener on a dedicated thread
///
/// The source is opened inside the thread because capture streams are not
/// always `Send`. The thread blocks only on audio availability; `on_wake`
/// runs on it and must not block.
pub fn spawn_listener<S, F>(
    config: ListenerConfig,
    scorer: Box<dyn WakeWordScorer>,
    open_source: S,
    mut on_wake: F,
) -> Result<ListenerHandle, ListenerError>
where
    S: FnOnce() -> Result<Box<dyn AudioSource>, SourceError> + Send + 'static,
    F: FnMut(WakeEvent) + Send + 'static,
{
    let mut listener = WakeWordListener::new(config, scorer)?;
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let thread = std::thread::Builder::new()
        .name("wake-listener".into())
        .spawn(move || {
            let mut source = open_source().map_err(|e| {
                error!("Failed to open audio source: {}", e);
                ListenerError::from(e)
            })?;

            let result = listener.run(source.as_mut(), &stop_flag, &mut on_wake);
            if let Err(e) = &result {
                error!("Wake-word listener stopped: {}", e);
            }
            result.map(|()| listener.stats().clone())
        })
        .map_err(|e| ListenerError::Thread(e.to_string()))?;

    Ok(ListenerHandle {
        stop,
        thread: Some(thread),
    })
}

fn current_timestamp_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}
