//! Strip State
//!
//! Colors are stored logical (unscaled). Brightness is a separate scalar
//! applied only when a frame is handed to the renderer.

use crate::color::{Color, OFF};
use crate::error::ControllerError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StripState {
    leds: Vec<Color>,
    brightness: f32,
}

impl StripState {
    /// All-off strip of `count` LEDs
    pub fn new(count: usize, brightness: f32) -> Self {
        Self {
            leds: vec![OFF; count],
            brightness: brightness.clamp(0.0, 1.0),
        }
    }

    pub fn len(&self) -> usize {
        self.leds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leds.is_empty()
    }

    pub fn leds(&self) -> &[Color] {
        &self.leds
    }

    pub fn get(&self, index: usize) -> Result<Color, ControllerError> {
        self.leds
            .get(index)
            .copied()
            .ok_or(ControllerError::OutOfRange {
                index,
                count: self.leds.len(),
            })
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    pub(crate) fn set(&mut self, index: usize, color: Color) -> Result<(), ControllerError> {
        let count = self.leds.len();
        let led = self
            .leds
            .get_mut(index)
            .ok_or(ControllerError::OutOfRange { index, count })?;
        *led = color;
        Ok(())
    }

    pub(crate) fn fill(&mut self, color: Color) {
        self.leds.fill(color);
    }

    /// Replace every LED from a full frame
    ///
    /// Short frames are padded with off, long frames truncated.
    pub(crate) fn paint(&mut self, colors: &[Color]) {
        for (i, led) in self.leds.iter_mut().enumerate() {
            *led = colors.get(i).copied().unwrap_or(OFF);
        }
    }

    pub(crate) fn set_brightness(&mut self, brightness: f32) -> Result<(), ControllerError> {
        if !(0.0..=1.0).contains(&brightness) {
            return Err(ControllerError::InvalidValue(format!(
                "brightness must be between 0.0 and 1.0, got {}",
                brightness
            )));
        }
        self.brightness = brightness;
        Ok(())
    }

    /// Brightness-scaled copy of the colors for the hardware
    pub fn scaled_frame(&self) -> Vec<Color> {
        self.leds.iter().map(|c| c.scaled(self.brightness)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{BLUE, RED};

    #[test]
    fn test_new_strip_is_off() {
        let strip = StripState::new(5, 1.0);
        assert_eq!(strip.len(), 5);
        assert!(strip.leds().iter().all(|c| *c == OFF));
    }

    #[test]
    fn test_set_out_of_range_is_noop() {
        let mut strip = StripState::new(3, 1.0);
        let before = strip.clone();

        let err = strip.set(3, RED).unwrap_err();
        assert_eq!(err, ControllerError::OutOfRange { index: 3, count: 3 });
        assert_eq!(strip, before);
    }

    #[test]
    fn test_brightness_does_not_touch_colors() {
        let mut strip = StripState::new(2, 1.0);
        strip.fill(RED);
        strip.set_brightness(0.5).unwrap();

        assert_eq!(strip.leds(), &[RED, RED]);
        assert_eq!(strip.scaled_frame(), vec![Color::new(128, 0, 0); 2]);

        strip.set_brightness(1.0).unwrap();
        assert_eq!(strip.scaled_frame(), vec![RED; 2]);
    }

    #[test]
    fn test_invalid_brightness_rejected() {
        let mut strip = StripState::new(2, 0.8);
        assert!(strip.set_brightness(1.01).is_err());
        assert!(strip.set_brightness(-0.1).is_err());
        assert!(strip.set_brightness(f32::NAN).is_err());
        assert_eq!(strip.brightness(), 0.8);
    }

    #[test]
    fn test_paint_pads_and_truncates() {
        let mut strip = StripState::new(3, 1.0);
        strip.paint(&[BLUE]);
        assert_eq!(strip.leds(), &[BLUE, OFF, OFF]);

        strip.paint(&[RED; 10]);
        assert_eq!(strip.leds(), &[RED; 3]);
    }
}
