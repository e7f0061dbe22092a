//! Scene Engine tick

use crate::command::Command;
use crate::controller::ControllerHandle;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Periodically re-render the active scene into the strip
///
/// Each tick computes the frame for the active scene and submits it fire
/// and forget, which overwrites any direct LED writes made since the last
/// tick. Frames identical to the current snapshot are not resubmitted.
pub fn spawn_scene_engine(handle: ControllerHandle, fps: u32) -> JoinHandle<()> {
    let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
    tokio::spawn(run(handle, period))
}

async fn run(handle: ControllerHandle, period: Duration) {
    info!(period_ms = period.as_millis() as u64, "Scene engine started");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(active) = handle.active_scene() else {
            continue;
        };

        let snapshot = handle.snapshot();
        let colors = active
            .scene
            .render(active.started_at.elapsed(), snapshot.len());
        if colors.as_slice() == snapshot.leds() {
            continue;
        }

        let command = Command::SceneTick {
            generation: active.generation,
            colors,
        };
        if handle.submit_nowait(command).is_err() {
            debug!("Serializer gone, stopping scene engine");
            break;
        }
    }
}
