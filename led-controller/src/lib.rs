//! LED controller library
//!
//! Single-writer command serializer for the strip, scenes and the engine
//! that plays them, the renderer boundary, and the HTTP API in front of it.

pub mod api;
pub mod color;
pub mod command;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod renderer;
pub mod scene;
pub mod strip;

// Re-export main types
pub use color::{Color, ColorInput};
pub use command::{Ack, Command};
pub use config::{AppConfig, ConfigError};
pub use controller::{spawn_controller, ActiveScene, ControllerConfig, ControllerHandle};
pub use engine::spawn_scene_engine;
pub use error::ControllerError;
pub use renderer::{spawn_render_loop, RenderError, Renderer, SimulatedRenderer};
pub use scene::{Fill, Scene, SceneFrame, SceneKind, SceneLibrary, NO_SCENE};
pub use strip::StripState;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "led_controller=info,wakeword_detector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
