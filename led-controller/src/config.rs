//! Service configuration
//!
//! Loaded from YAML, then overridden from the environment. Every field has a
//! default so a missing or empty file still yields a working setup.

use crate::controller::ControllerConfig;
use crate::error::ControllerError;
use crate::scene::{Scene, SceneLibrary};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use wakeword_detector::ListenerConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config format: {0}")]
    InvalidFormat(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Invalid scene: {0}")]
    Scene(#[from] ControllerError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedConfig {
    pub count: usize,
    pub brightness: f32,
    pub render_fps: u32,
    pub scene_fps: u32,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            count: 120,
            brightness: 1.0,
            render_fps: 30,
            scene_fps: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name substring; default input when unset
    pub device: Option<String>,
    pub chunk_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            chunk_size: wakeword_detector::FRAME_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeWordConfig {
    pub enabled: bool,
    pub threshold: f32,
    pub cooldown_seconds: f64,
    pub dwell_ms: u64,
    pub model_path: Option<String>,

    /// Scene activated on a wake event
    pub scene: String,
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.5,
            cooldown_seconds: 3.0,
            dwell_ms: 160,
            model_path: None,
            scene: "idea".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub ack_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            ack_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub led: LedConfig,
    pub audio: AudioConfig,
    pub wake_word: WakeWordConfig,
    pub api: ApiConfig,

    /// User scenes, added to the presets
    pub scenes: Vec<Scene>,
}

impl AppConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects an empty document for a struct
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read `path` if given, apply environment overrides, validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "Loading config");
                Self::from_yaml(&std::fs::read_to_string(path)?)?
            }
            None => {
                debug!("No config file, using defaults");
                Self::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (the process environment in production)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv {
                    key: key.to_string(),
                    value,
                })
        }

        if let Some(v) = lookup("LED_COUNT") {
            self.led.count = parse("LED_COUNT", v)?;
        }
        if let Some(v) = lookup("LED_BRIGHTNESS") {
            self.led.brightness = parse("LED_BRIGHTNESS", v)?;
        }
        if let Some(v) = lookup("WAKEWORD_THRESHOLD") {
            self.wake_word.threshold = parse("WAKEWORD_THRESHOLD", v)?;
        }
        if let Some(v) = lookup("WAKEWORD_COOLDOWN_SECONDS") {
            self.wake_word.cooldown_seconds = parse("WAKEWORD_COOLDOWN_SECONDS", v)?;
        }
        if let Some(v) = lookup("WAKEWORD_MODEL_PATH") {
            self.wake_word.model_path = Some(v);
        }
        if let Some(v) = lookup("API_HOST") {
            self.api.host = v;
        }
        if let Some(v) = lookup("API_PORT") {
            self.api.port = parse("API_PORT", v)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.led.count == 0 {
            return Err(ConfigError::Invalid("led.count must be greater than 0".into()));
        }
        if !(0.0..=1.0).contains(&self.led.brightness) {
            return Err(ConfigError::Invalid(format!(
                "led.brightness must be between 0.0 and 1.0, got {}",
                self.led.brightness
            )));
        }
        if self.led.render_fps == 0 || self.led.scene_fps == 0 {
            return Err(ConfigError::Invalid("fps must be greater than 0".into()));
        }
        if self.audio.chunk_size == 0 {
            return Err(ConfigError::Invalid("audio.chunk_size must be greater than 0".into()));
        }

        self.listener_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let mut seen = HashSet::new();
        for scene in &self.scenes {
            scene.validate()?;
            if !seen.insert(scene.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate scene name '{}'",
                    scene.name
                )));
            }
        }

        if !self.scene_library().contains(&self.wake_word.scene) {
            return Err(ConfigError::Invalid(format!(
                "wake_word.scene '{}' is not a known scene",
                self.wake_word.scene
            )));
        }

        Ok(())
    }

    /// Presets plus user scenes; user scenes win on name clashes
    pub fn scene_library(&self) -> SceneLibrary {
        let mut library = SceneLibrary::with_builtins();
        for scene in &self.scenes {
            if library.insert(scene.clone()).is_some() {
                debug!(scene = %scene.name, "User scene overrides preset");
            }
        }
        library
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            led_count: self.led.count,
            brightness: self.led.brightness,
            wake_scene: self.wake_word.scene.clone(),
            ack_timeout: Duration::from_millis(self.api.ack_timeout_ms),
        }
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            threshold: self.wake_word.threshold,
            cooldown_seconds: self.wake_word.cooldown_seconds,
            dwell_ms: self.wake_word.dwell_ms,
            frame_size: wakeword_detector::FRAME_SIZE,
            model_path: self.wake_word.model_path.clone(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::RED;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_yaml("").unwrap();
        assert_eq!(config.led.count, 120);
        assert_eq!(config.wake_word.threshold, 0.5);
        assert_eq!(config.wake_word.cooldown_seconds, 3.0);
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml("led:\n  count: 30\n").unwrap();
        assert_eq!(config.led.count, 30);
        assert_eq!(config.led.brightness, 1.0);
        assert_eq!(config.api.port, 5000);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("LED_COUNT", "60"),
                ("WAKEWORD_THRESHOLD", "0.7"),
                ("API_PORT", "8080"),
                ("WAKEWORD_MODEL_PATH", "/opt/model.onnx"),
            ]))
            .unwrap();

        assert_eq!(config.led.count, 60);
        assert_relative_eq!(config.wake_word.threshold, 0.7);
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.wake_word.model_path.as_deref(), Some("/opt/model.onnx"));
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = AppConfig::default();
        let err = config.apply_env(env(&[("LED_COUNT", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.led.brightness = 1.2;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.wake_word.cooldown_seconds = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.wake_word.scene = "missing".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scenes = vec![Scene::solid("dup", RED), Scene::solid("dup", RED)];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scenes = vec![Scene::solid("none", RED)];
        assert!(matches!(config.validate(), Err(ConfigError::Scene(_))));
    }

    #[test]
    fn test_user_scenes_in_library() {
        let yaml = r##"
wake_word:
  scene: solid-red
scenes:
  - name: solid-red
    kind: static
    fill:
      type: solid
      color: "#FF0000"
"##;
        let config = AppConfig::from_yaml(yaml).unwrap();
        config.validate().unwrap();

        let library = config.scene_library();
        assert!(library.contains("solid-red"));
        assert!(library.contains("idea"));
        assert_eq!(config.controller_config().wake_scene, "solid-red");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "led:\n  count: 8\n  brightness: 0.25\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.led.count, 8);
        assert_relative_eq!(config.led.brightness, 0.25);
    }
}
