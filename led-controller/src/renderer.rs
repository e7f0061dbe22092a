//! Hardware Renderer boundary
//!
//! The physical bus write is an external collaborator. The render loop reads
//! the latest snapshot at a fixed rate, applies brightness, and hands the
//! frame to a [`Renderer`]. Failures are logged and never retried; the next
//! change simply produces a new frame.

use crate::color::Color;
use crate::controller::ControllerHandle;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Frame has {got} LEDs, strip has {expected}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Bus write failed: {0}")]
    Bus(String),
}

/// Writes brightness-scaled frames to the strip
pub trait Renderer: Send {
    fn render(&mut self, frame: &[Color]) -> Result<(), RenderError>;

    fn name(&self) -> String;
}

/// Renderer used when no bus driver is linked
///
/// Records the last frame it was given. Clones share the same record.
#[derive(Debug, Clone)]
pub struct SimulatedRenderer {
    led_count: usize,
    last_frame: Arc<Mutex<Vec<Color>>>,
    frames: Arc<AtomicU64>,
}

impl SimulatedRenderer {
    pub fn new(led_count: usize) -> Self {
        Self {
            led_count,
            last_frame: Arc::new(Mutex::new(Vec::new())),
            frames: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn last_frame(&self) -> Vec<Color> {
        self.last_frame.lock().clone()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl Renderer for SimulatedRenderer {
    fn render(&mut self, frame: &[Color]) -> Result<(), RenderError> {
        if frame.len() != self.led_count {
            return Err(RenderError::LengthMismatch {
                expected: self.led_count,
                got: frame.len(),
            });
        }

        *self.last_frame.lock() = frame.to_vec();
        self.frames.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> String {
        "simulated".to_string()
    }
}

/// Push snapshots to `renderer` at `fps`, skipping unchanged ones
pub fn spawn_render_loop(
    handle: ControllerHandle,
    mut renderer: Box<dyn Renderer>,
    fps: u32,
) -> JoinHandle<()> {
    let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
    let mut rx = handle.subscribe();
    // Drop our sender reference so the loop ends with the serializer
    drop(handle);

    tokio::spawn(async move {
        info!(renderer = %renderer.name(), fps, "Render loop started");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        rx.mark_changed();

        loop {
            ticker.tick().await;

            match rx.has_changed() {
                Ok(true) => {}
                Ok(false) => continue,
                Err(_) => break,
            }

            let snapshot = rx.borrow_and_update().clone();
            if let Err(e) = renderer.render(&snapshot.scaled_frame()) {
                error!(error = %e, "Render failed");
            }
        }

        debug!("Render loop stopped");
    })
}
