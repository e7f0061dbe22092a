//! Scenes
//!
//! A scene is a named, read-only rendering procedure. Given the time since
//! activation and the strip length it produces one full frame of logical
//! colors. Static scenes return the same frame forever; frame lists loop;
//! waves blend a color cycle that drifts along the strip.

use crate::color::{self, Color};
use crate::error::ControllerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Reserved scene name that stops scene playback
pub const NO_SCENE: &str = "none";

/// How one frame assigns colors to the strip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fill {
    Solid { color: Color },

    /// Colors repeated along the strip
    Pattern { colors: Vec<Color> },

    /// Full color wheel spread across the strip
    Rainbow,
}

impl Fill {
    pub fn render(&self, led_count: usize) -> Vec<Color> {
        match self {
            Fill::Solid { color } => vec![*color; led_count],
            Fill::Pattern { colors } if colors.is_empty() => vec![color::OFF; led_count],
            Fill::Pattern { colors } => colors.iter().copied().cycle().take(led_count).collect(),
            Fill::Rainbow => (0..led_count)
                .map(|i| Color::wheel((i * 256 / led_count) as u8))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFrame {
    pub fill: Fill,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SceneKind {
    Static { fill: Fill },

    /// Frames shown in order, looped until superseded
    Frames { frames: Vec<SceneFrame> },

    /// Flowing blend through `colors`
    ///
    /// One pass through the colors takes `cycle_seconds`; `spread` is the
    /// fraction of the cycle visible across the strip at once.
    Wave {
        colors: Vec<Color>,
        cycle_seconds: f64,
        #[serde(default = "default_spread")]
        spread: f32,
    },
}

fn default_spread() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,

    #[serde(flatten)]
    pub kind: SceneKind,
}

impl Scene {
    pub fn solid(name: &str, color: Color) -> Self {
        Self::with_fill(name, Fill::Solid { color })
    }

    pub fn with_fill(name: &str, fill: Fill) -> Self {
        Self {
            name: name.to_string(),
            kind: SceneKind::Static { fill },
        }
    }

    /// Whether the output changes over time
    pub fn is_animated(&self) -> bool {
        match &self.kind {
            SceneKind::Static { .. } => false,
            SceneKind::Frames { frames } => frames.len() > 1,
            SceneKind::Wave { colors, .. } => colors.len() > 1,
        }
    }

    /// Frame for `elapsed` time since activation
    pub fn render(&self, elapsed: Duration, led_count: usize) -> Vec<Color> {
        match &self.kind {
            SceneKind::Static { fill } => fill.render(led_count),
            SceneKind::Frames { frames } => {
                let total: u64 = frames.iter().map(|f| f.duration_ms).sum();
                if total == 0 {
                    return frames
                        .first()
                        .map(|f| f.fill.render(led_count))
                        .unwrap_or_else(|| vec![color::OFF; led_count]);
                }

                let mut position = (elapsed.as_millis() % total as u128) as u64;
                for frame in frames {
                    if position < frame.duration_ms {
                        return frame.fill.render(led_count);
                    }
                    position -= frame.duration_ms;
                }
                vec![color::OFF; led_count]
            }
            SceneKind::Wave {
                colors,
                cycle_seconds,
                spread,
            } => wave(colors, *cycle_seconds, *spread, elapsed, led_count),
        }
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        let invalid = |reason: &str| {
            Err(ControllerError::InvalidValue(format!(
                "scene '{}': {}",
                self.name, reason
            )))
        };

        if self.name.trim().is_empty() {
            return invalid("name must not be empty");
        }
        if self.name == NO_SCENE {
            return invalid("name is reserved");
        }

        match &self.kind {
            SceneKind::Static { fill } => validate_fill(fill).or_else(|r| invalid(r)),
            SceneKind::Frames { frames } => {
                if frames.is_empty() {
                    return invalid("frame list must not be empty");
                }
                for frame in frames {
                    if frame.duration_ms == 0 {
                        return invalid("frame durations must be positive");
                    }
                    validate_fill(&frame.fill).or_else(|r| invalid(r))?;
                }
                Ok(())
            }
            SceneKind::Wave {
                colors,
                cycle_seconds,
                spread,
            } => {
                if colors.is_empty() {
                    return invalid("wave needs at least one color");
                }
                if !cycle_seconds.is_finite() || *cycle_seconds <= 0.0 {
                    return invalid("cycle_seconds must be positive");
                }
                if !spread.is_finite() || *spread < 0.0 {
                    return invalid("spread must not be negative");
                }
                Ok(())
            }
        }
    }
}

fn validate_fill(fill: &Fill) -> Result<(), &'static str> {
    match fill {
        Fill::Pattern { colors } if colors.is_empty() => Err("pattern needs at least one color"),
        _ => Ok(()),
    }
}

fn wave(
    colors: &[Color],
    cycle_seconds: f64,
    spread: f32,
    elapsed: Duration,
    led_count: usize,
) -> Vec<Color> {
    let color_count = colors.len();
    if color_count == 0 {
        return vec![color::OFF; led_count];
    }

    let n = color_count as f64;
    let base = (elapsed.as_secs_f64() % cycle_seconds) / cycle_seconds * n;

    (0..led_count)
        .map(|i| {
            let offset = (i as f64 / led_count as f64) * spread as f64 * n;
            let position = (base + offset) % n;
            let index = position as usize % color_count;
            let next = (index + 1) % color_count;
            colors[index].lerp(&colors[next], (position - index as f64) as f32)
        })
        .collect()
}

/// Every scene known to the controller, keyed by name
#[derive(Debug, Clone)]
pub struct SceneLibrary {
    scenes: BTreeMap<String, Scene>,
}

impl Default for SceneLibrary {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl SceneLibrary {
    pub fn empty() -> Self {
        Self {
            scenes: BTreeMap::new(),
        }
    }

    /// Library preloaded with the preset scenes
    pub fn with_builtins() -> Self {
        let mut library = Self::empty();

        for scene in [
            Scene::solid("off", color::OFF),
            Scene::solid("all_red", color::RED),
            Scene::solid("all_green", color::GREEN),
            Scene::solid("all_blue", color::BLUE),
            Scene::solid("all_yellow", color::YELLOW),
            Scene::solid("all_white", color::WHITE),
            Scene::solid("warm_white", color::WARM_WHITE),
            Scene::solid("cool_white", color::COOL_WHITE),
            Scene::with_fill("rainbow", Fill::Rainbow),
            Scene::solid("idea", color::YELLOW),
            Scene {
                name: "dreamy".to_string(),
                kind: SceneKind::Wave {
                    colors: vec![
                        Color::new(70, 130, 230),  // soft blue
                        Color::new(138, 43, 226),  // blue violet
                        Color::new(255, 105, 180), // hot pink
                        Color::new(186, 85, 211),  // medium orchid
                    ],
                    cycle_seconds: 12.0,
                    spread: 0.5,
                },
            },
            Scene {
                name: "flash".to_string(),
                kind: SceneKind::Frames {
                    frames: vec![
                        SceneFrame {
                            fill: Fill::Solid { color: color::YELLOW },
                            duration_ms: 250,
                        },
                        SceneFrame {
                            fill: Fill::Solid { color: color::OFF },
                            duration_ms: 250,
                        },
                    ],
                },
            },
        ] {
            library.insert(scene);
        }

        library
    }

    /// Add a scene, replacing any with the same name
    pub fn insert(&mut self, scene: Scene) -> Option<Scene> {
        self.scenes.insert(scene.name.clone(), scene)
    }

    pub fn get(&self, name: &str) -> Result<&Scene, ControllerError> {
        self.scenes.get(name).ok_or_else(|| ControllerError::NotFound {
            name: name.to_string(),
            available: self.names(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scenes.contains_key(name)
    }

    /// Sorted scene names
    pub fn names(&self) -> Vec<String> {
        self.scenes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}
