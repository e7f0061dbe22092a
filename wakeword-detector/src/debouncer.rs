/// Detection debouncer
///
/// Turns the raw per-frame score stream into discrete wake events with an
/// explicit state machine:
///
/// ```text
/// Idle --score>=threshold--> Armed --dwell satisfied--> Triggered --> Cooldown
///  ^                           |                                        |
///  +------score<threshold------+                                        |
///  +--------------------cooldown elapsed since trigger------------------+
/// ```
///
/// At most one event is emitted per cooldown window no matter how long the
/// scorer stays above threshold. Time is supplied by the caller as an offset
/// into the audio stream, so the machine can be driven by synthetic input.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum DebounceError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Debounce parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Minimum score counted as "above threshold" (0.0 - 1.0, inclusive)
    pub threshold: f32,

    /// Minimum time between consecutive wake events
    pub cooldown_seconds: f64,

    /// How long the score must stay above threshold before triggering
    pub dwell_ms: u64,
}

impl DebounceConfig {
    pub fn validate(&self) -> Result<(), DebounceError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(DebounceError::InvalidConfig(format!(
                "threshold must be between 0.0 and 1.0, got {}",
                self.threshold
            )));
        }

        if !self.cooldown_seconds.is_finite() || self.cooldown_seconds <= 0.0 {
            return Err(DebounceError::InvalidConfig(format!(
                "cooldown_seconds must be greater than 0, got {}",
                self.cooldown_seconds
            )));
        }

        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_seconds)
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

/// Debouncer phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Score below threshold
    Idle,

    /// Above threshold, waiting for the dwell window
    Armed,

    /// Emitting an event; passes straight through to Cooldown
    Triggered,

    /// Ignoring scores until the cooldown has elapsed
    Cooldown,
}

/// Ephemeral debouncer state
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSession {
    pub phase: Phase,

    /// Stream time of the last emitted event
    pub last_trigger: Option<Duration>,

    /// Stream time the current run above threshold started
    pub armed_at: Option<Duration>,

    /// Accumulated above-threshold time of the current run
    pub above_threshold: Duration,

    /// Highest score seen in the current run
    pub peak_score: f32,
}

impl DetectionSession {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            last_trigger: None,
            armed_at: None,
            above_threshold: Duration::ZERO,
            peak_score: 0.0,
        }
    }
}

/// A debounced wake event
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Stream time the event fired
    pub at: Duration,

    /// Peak score over the confirming run
    pub confidence: f32,

    /// How long the score was held above threshold before firing
    pub dwell: Duration,
}

/// Threshold + dwell + cooldown state machine
pub struct Debouncer {
    config: DebounceConfig,
    session: DetectionSession,
}

impl Debouncer {
    pub fn new(config: DebounceConfig) -> Result<Self, DebounceError> {
        config.validate()?;

        debug!(
            threshold = config.threshold,
            cooldown_seconds = config.cooldown_seconds,
            dwell_ms = config.dwell_ms,
            "Initializing debouncer"
        );

        Ok(Self {
            config,
            session: DetectionSession::new(),
        })
    }

    /// Feed one frame's score observed at stream time `at`
    ///
    /// Returns the wake event when this frame completes a confirmed run.
    /// NaN and out-of-range scores are treated as 0 and clamped respectively.
    pub fn process(&mut self, score: f32, at: Duration) -> Option<Detection> {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };

        if self.session.phase == Phase::Cooldown {
            let since_trigger = self
                .session
                .last_trigger
                .map(|t| at.saturating_sub(t))
                .unwrap_or(Duration::MAX);

            if since_trigger < self.config.cooldown() {
                return None;
            }
            self.transition(Phase::Idle);
        }

        let above = score >= self.config.threshold;

        match self.session.phase {
            Phase::Idle => {
                if !above {
                    return None;
                }
                self.session.armed_at = Some(at);
                self.session.peak_score = score;
                self.transition(Phase::Armed);
            }
            Phase::Armed => {
                if !above {
                    self.clear_run();
                    self.transition(Phase::Idle);
                    return None;
                }
                self.session.peak_score = self.session.peak_score.max(score);
            }
            Phase::Triggered | Phase::Cooldown => return None,
        }

        let armed_at = self.session.armed_at.unwrap_or(at);
        let dwell = at.saturating_sub(armed_at);
        self.session.above_threshold = dwell;

        if dwell < self.config.dwell() {
            return None;
        }

        self.transition(Phase::Triggered);
        let detection = Detection {
            at,
            confidence: self.session.peak_score,
            dwell,
        };
        self.session.last_trigger = Some(at);
        self.clear_run();
        self.transition(Phase::Cooldown);

        info!(
            confidence = detection.confidence,
            at_ms = at.as_millis() as u64,
            "Wake event"
        );

        Some(detection)
    }

    fn clear_run(&mut self) {
        self.session.armed_at = None;
        self.session.above_threshold = Duration::ZERO;
        self.session.peak_score = 0.0;
    }

    fn transition(&mut self, next: Phase) {
        debug!("State: {:?} -> {:?}", self.session.phase, next);
        self.session.phase = next;
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn session(&self) -> &DetectionSession {
        &self.session
    }

    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    /// Back to Idle with no trigger history
    pub fn reset(&mut self) {
        self.session = DetectionSession::new();
    }
}
