//! Commands accepted by the serializer

use crate::color::Color;
use serde::Serialize;

/// A mutation request for the strip or the active scene
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetLed { index: usize, color: Color },
    SetAll(Color),
    SetBrightness(f32),

    /// Switch scene playback; `"none"` stops it
    ActivateScene(String),

    /// Activate the configured wake scene
    WakeTriggered,

    /// One computed frame of the active scene
    SceneTick { generation: u64, colors: Vec<Color> },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::SetLed { .. } => "set_led",
            Command::SetAll(_) => "set_all",
            Command::SetBrightness(_) => "set_brightness",
            Command::ActivateScene(_) => "activate_scene",
            Command::WakeTriggered => "wake_triggered",
            Command::SceneTick { .. } => "scene_tick",
        }
    }
}

/// Acknowledgement of an applied command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ack {
    /// Position in the total order of applied commands
    pub seq: u64,
}
