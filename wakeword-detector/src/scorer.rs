/// Wake-word scorer boundary
///
/// The neural wake-word model is opaque to the rest of the pipeline: given one
/// frame of 16kHz PCM it returns a confidence in [0, 1]. Anything that can do
/// that plugs in through [`WakeWordScorer`].

use crate::audio_buffer::AudioSample;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Model inference failed: {0}")]
    Inference(String),
}

/// Per-frame wake-word confidence
#[cfg_attr(test, mockall::automock)]
pub trait WakeWordScorer: Send {
    /// Score one frame. Higher means more confident the phrase was spoken.
    fn score(&mut self, frame: &[AudioSample]) -> Result<f32, ScorerError>;

    /// Human-readable identifier for logs
    fn name(&self) -> String;

    /// Drop any state carried between frames
    fn reset(&mut self) {}
}

/// Energy-based stand-in scorer used when no model runtime is linked
///
/// Maps frame RMS linearly from `floor` (score 0) to `ceiling` (score 1).
/// Loud speech near the microphone will trigger it; it is meant for bench
/// testing the lighting pipeline, not for real phrase recognition.
#[derive(Debug, Clone)]
pub struct EnergyScorer {
    floor: f32,
    ceiling: f32,
}

impl EnergyScorer {
    pub fn new(floor: f32, ceiling: f32) -> Self {
        Self { floor, ceiling }
    }

    fn rms(frame: &[AudioSample]) -> f32 {
        let sum_squares: f64 = frame
            .iter()
            .map(|&s| {
                let normalized = s as f64 / i16::MAX as f64;
                normalized * normalized
            })
            .sum();

        (sum_squares / frame.len() as f64).sqrt() as f32
    }
}

impl Default for EnergyScorer {
    fn default() -> Self {
        Self::new(0.02, 0.3)
    }
}

impl WakeWordScorer for EnergyScorer {
    fn score(&mut self, frame: &[AudioSample]) -> Result<f32, ScorerError> {
        if frame.is_empty() {
            return Err(ScorerError::MalformedFrame("empty frame".to_string()));
        }
        if self.ceiling <= self.floor {
            return Err(ScorerError::Inference(format!(
                "ceiling {} must exceed floor {}",
                self.ceiling, self.floor
            )));
        }

        let rms = Self::rms(frame);
        let score = ((rms - self.floor) / (self.ceiling - self.floor)).clamp(0.0, 1.0);
        trace!(rms, score, "Energy score");

        Ok(score)
    }

    fn name(&self) -> String {
        "energy".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_silence_scores_zero() {
        let mut scorer = EnergyScorer::default();
        let score = scorer.score(&[0; 1280]).unwrap();
        assert_relative_eq!(score, 0.0);
    }

    #[test]
    fn test_loud_frame_saturates() {
        let mut scorer = EnergyScorer::default();
        let frame: Vec<i16> = (0..1280)
            .map(|i| if i % 2 == 0 { i16::MAX } else { -i16::MAX })
            .collect();

        let score = scorer.score(&frame).unwrap();
        assert_relative_eq!(score, 1.0);
    }

    #[test]
    fn test_empty_frame_is_malformed() {
        let mut scorer = EnergyScorer::default();
        assert!(matches!(
            scorer.score(&[]),
            Err(ScorerError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_inverted_range_fails() {
        let mut scorer = EnergyScorer::new(0.5, 0.1);
        assert!(matches!(scorer.score(&[1; 10]), Err(ScorerError::Inference(_))));
    }
}
