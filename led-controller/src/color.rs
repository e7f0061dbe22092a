//! RGB colors and color math

use crate::error::ControllerError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical (unscaled) RGB color of one LED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "ColorInput")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const OFF: Color = Color::new(0, 0, 0);
pub const RED: Color = Color::new(255, 0, 0);
pub const GREEN: Color = Color::new(0, 255, 0);
pub const BLUE: Color = Color::new(0, 0, 255);
pub const YELLOW: Color = Color::new(255, 255, 0);
pub const WHITE: Color = Color::new(255, 255, 255);
pub const CYAN: Color = Color::new(0, 255, 255);
pub const MAGENTA: Color = Color::new(255, 0, 255);
pub const ORANGE: Color = Color::new(255, 165, 0);
pub const PURPLE: Color = Color::new(128, 0, 128);

// Temperature-based whites
pub const WARM_WHITE: Color = Color::new(255, 244, 229); // ~2700K
pub const COOL_WHITE: Color = Color::new(255, 255, 255); // ~6500K
pub const DAYLIGHT: Color = Color::new(255, 250, 244); // ~5000K

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` or `RRGGBB`
    pub fn from_hex(hex: &str) -> Result<Self, ControllerError> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ControllerError::InvalidValue(format!("invalid hex color: {}", hex)));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| ControllerError::InvalidValue(format!("invalid hex color: {}", hex)))
        };

        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Brightness-scaled copy, as handed to the hardware
    pub fn scaled(&self, brightness: f32) -> Self {
        let factor = brightness.clamp(0.0, 1.0);
        let scale = |c: u8| (c as f32 * factor).round() as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }

    /// Linear blend towards `other`; `t` is clamped to [0, 1]
    pub fn lerp(&self, other: &Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t) as u8;
        Self::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    /// Rainbow color for a position on a 256-step wheel
    pub fn wheel(pos: u8) -> Self {
        match pos {
            0..=84 => Self::new(pos * 3, 255 - pos * 3, 0),
            85..=169 => {
                let p = pos - 85;
                Self::new(255 - p * 3, 0, p * 3)
            }
            _ => {
                let p = pos - 170;
                Self::new(0, p * 3, 255 - p * 3)
            }
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Color as accepted from clients and config files
///
/// Channels are wide integers so out-of-range values surface as
/// `InvalidValue` instead of a deserialization failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ColorInput {
    Rgb { r: i64, g: i64, b: i64 },
    Hex { hex: String },
    HexString(String),
}

impl TryFrom<ColorInput> for Color {
    type Error = ControllerError;

    fn try_from(input: ColorInput) -> Result<Self, Self::Error> {
        match input {
            ColorInput::Rgb { r, g, b } => {
                let channel = |name: &str, value: i64| {
                    u8::try_from(value).map_err(|_| {
                        ControllerError::InvalidValue(format!(
                            "{} must be between 0 and 255, got {}",
                            name, value
                        ))
                    })
                };
                Ok(Color::new(channel("r", r)?, channel("g", g)?, channel("b", b)?))
            }
            ColorInput::Hex { hex } | ColorInput::HexString(hex) => Color::from_hex(&hex),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_hex_round_trip() {
        assert_eq!(Color::from_hex("#FF8000").unwrap(), Color::new(255, 128, 0));
        assert_eq!(Color::from_hex("00ff00").unwrap(), GREEN);
        assert_eq!(ORANGE.to_hex(), "#FFA500");
    }

    #[test_case("#FFF" ; "too short")]
    #[test_case("#GG0000" ; "not hex")]
    #[test_case("#ÿÿÿ" ; "non ascii")]
    #[test_case("" ; "empty")]
    fn test_bad_hex_rejected(input: &str) {
        assert!(matches!(
            Color::from_hex(input),
            Err(ControllerError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_scaled_does_not_touch_original() {
        let color = Color::new(200, 100, 50);
        assert_eq!(color.scaled(0.5), Color::new(100, 50, 25));
        assert_eq!(color.scaled(0.0), OFF);
        assert_eq!(color.scaled(3.0), color);
        assert_eq!(color, Color::new(200, 100, 50));
    }

    #[test]
    fn test_lerp_endpoints() {
        assert_eq!(RED.lerp(&BLUE, 0.0), RED);
        assert_eq!(RED.lerp(&BLUE, 1.0), BLUE);
        assert_eq!(OFF.lerp(&WHITE, 0.5), Color::new(127, 127, 127));
        assert_eq!(RED.lerp(&BLUE, -1.0), RED);
    }

    #[test]
    fn test_wheel_segments() {
        assert_eq!(Color::wheel(0), GREEN);
        assert_eq!(Color::wheel(85), RED);
        assert_eq!(Color::wheel(170), BLUE);
    }

    #[test]
    fn test_color_input_validation() {
        let ok: Color = serde_json::from_str(r#"{"r": 1, "g": 2, "b": 3}"#).unwrap();
        assert_eq!(ok, Color::new(1, 2, 3));

        let hex: Color = serde_json::from_str(r##""#0000FF""##).unwrap();
        assert_eq!(hex, BLUE);

        let input: ColorInput = serde_json::from_str(r#"{"r": 300, "g": 0, "b": 0}"#).unwrap();
        assert!(matches!(
            Color::try_from(input),
            Err(ControllerError::InvalidValue(_))
        ));
    }
}
