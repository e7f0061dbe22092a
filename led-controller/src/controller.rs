//! Command Serializer
//!
//! A single task owns the Strip State and applies commands one at a time in
//! arrival order. Writers hold a cloneable [`ControllerHandle`] and either
//! await an acknowledgement or fire and forget. Every applied command
//! publishes a fresh immutable snapshot, so readers never see a half-applied
//! mutation and never block the writer.

use crate::command::{Ack, Command};
use crate::error::ControllerError;
use crate::scene::{Scene, SceneLibrary, NO_SCENE};
use crate::strip::StripState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type AckSender = oneshot::Sender<Result<Ack, ControllerError>>;

struct Envelope {
    command: Command,
    ack: Option<AckSender>,
}

/// Serializer settings
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub led_count: usize,
    pub brightness: f32,

    /// Scene activated by `WakeTriggered`
    pub wake_scene: String,

    /// How long `submit` waits for an acknowledgement
    pub ack_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            led_count: 120,
            brightness: 1.0,
            wake_scene: "idea".to_string(),
            ack_timeout: Duration::from_secs(2),
        }
    }
}

/// The scene currently driving the strip
#[derive(Debug, Clone)]
pub struct ActiveScene {
    pub scene: Arc<Scene>,

    /// Bumped on every activation; ticks from older generations are dropped
    pub generation: u64,

    pub started_at: Instant,
}

impl ActiveScene {
    pub fn name(&self) -> &str {
        &self.scene.name
    }

    pub fn is_animated(&self) -> bool {
        self.scene.is_animated()
    }
}

struct Serializer {
    state: StripState,
    library: Arc<SceneLibrary>,
    wake_scene: String,
    seq: u64,
    generation: u64,
    active: Option<ActiveScene>,
    state_tx: watch::Sender<Arc<StripState>>,
    scene_tx: watch::Sender<Option<ActiveScene>>,
}

impl Serializer {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Envelope>) {
        info!(
            led_count = self.state.len(),
            brightness = self.state.brightness(),
            "Command serializer started"
        );

        while let Some(Envelope { command, ack }) = rx.recv().await {
            let kind = command.kind();
            let result = self.apply(command).map(|()| {
                self.seq += 1;
                self.state_tx.send_replace(Arc::new(self.state.clone()));
                debug!(seq = self.seq, kind, "Applied command");
                Ack { seq: self.seq }
            });

            match (ack, result) {
                // Submitter may have timed out; the command still applied
                (Some(tx), result) => {
                    let _ = tx.send(result);
                }
                (None, Err(ControllerError::Superseded { generation })) => {
                    debug!(generation, "Dropped stale scene tick");
                }
                (None, Err(e)) => {
                    warn!(kind, error = %e, "Fire-and-forget command rejected");
                }
                (None, Ok(_)) => {}
            }
        }

        info!(applied = self.seq, "Command serializer stopped");
    }

    fn apply(&mut self, command: Command) -> Result<(), ControllerError> {
        match command {
            Command::SetLed { index, color } => self.state.set(index, color)?,
            Command::SetAll(color) => self.state.fill(color),
            Command::SetBrightness(value) => self.state.set_brightness(value)?,
            Command::ActivateScene(name) => self.activate(&name)?,
            Command::WakeTriggered => {
                let name = self.wake_scene.clone();
                info!(scene = %name, "Wake word triggered");
                self.activate(&name)?
            }
            Command::SceneTick { generation, colors } => {
                if self.active.as_ref().map(|a| a.generation) != Some(generation) {
                    return Err(ControllerError::Superseded { generation });
                }
                self.state.paint(&colors);
            }
        }
        Ok(())
    }

    fn activate(&mut self, name: &str) -> Result<(), ControllerError> {
        if name == NO_SCENE {
            if let Some(previous) = self.active.take() {
                info!(scene = previous.name(), "Scene playback stopped");
            }
            self.scene_tx.send_replace(None);
            return Ok(());
        }

        // Lookup first so an unknown name leaves the running scene alone
        let scene = Arc::new(self.library.get(name)?.clone());

        self.generation += 1;
        let active = ActiveScene {
            scene,
            generation: self.generation,
            started_at: Instant::now(),
        };
        self.state
            .paint(&active.scene.render(Duration::ZERO, self.state.len()));

        info!(
            scene = name,
            generation = self.generation,
            animated = active.is_animated(),
            "Scene activated"
        );

        self.active = Some(active.clone());
        self.scene_tx.send_replace(Some(active));
        Ok(())
    }
}

/// Cloneable submission and query handle for the serializer
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Envelope>,
    state_rx: watch::Receiver<Arc<StripState>>,
    scene_rx: watch::Receiver<Option<ActiveScene>>,
    library: Arc<SceneLibrary>,
    ack_timeout: Duration,
}

impl ControllerHandle {
    /// Submit and wait for the acknowledgement
    ///
    /// On `SubmissionTimeout` the command may still be applied later.
    pub async fn submit(&self, command: Command) -> Result<Ack, ControllerError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                command,
                ack: Some(ack_tx),
            })
            .map_err(|_| ControllerError::ChannelClosed)?;

        match tokio::time::timeout(self.ack_timeout, ack_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ControllerError::ChannelClosed),
            Err(_) => {
                warn!(timeout = ?self.ack_timeout, "Acknowledgement timed out");
                Err(ControllerError::SubmissionTimeout(self.ack_timeout))
            }
        }
    }

    /// Enqueue without waiting; never blocks
    ///
    /// Validation failures are logged by the serializer.
    pub fn submit_nowait(&self, command: Command) -> Result<(), ControllerError> {
        self.tx
            .send(Envelope { command, ack: None })
            .map_err(|_| ControllerError::ChannelClosed)
    }

    /// Last published strip state
    pub fn snapshot(&self) -> Arc<StripState> {
        self.state_rx.borrow().clone()
    }

    pub fn active_scene(&self) -> Option<ActiveScene> {
        self.scene_rx.borrow().clone()
    }

    /// Receiver notified on every applied command
    pub fn subscribe(&self) -> watch::Receiver<Arc<StripState>> {
        self.state_rx.clone()
    }

    pub fn library(&self) -> &SceneLibrary {
        &self.library
    }

    pub fn led_count(&self) -> usize {
        self.state_rx.borrow().len()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Start the serializer task
///
/// Must be called from inside a tokio runtime. The task ends once every
/// handle has been dropped.
pub fn spawn_controller(
    config: ControllerConfig,
    library: SceneLibrary,
) -> Result<(ControllerHandle, JoinHandle<()>), ControllerError> {
    if config.led_count == 0 {
        return Err(ControllerError::InvalidValue(
            "LED count must be greater than 0".to_string(),
        ));
    }
    library.get(&config.wake_scene)?;

    let mut state = StripState::new(config.led_count, 1.0);
    state.set_brightness(config.brightness)?;

    let library = Arc::new(library);
    let (tx, rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(Arc::new(state.clone()));
    let (scene_tx, scene_rx) = watch::channel(None);

    let serializer = Serializer {
        state,
        library: library.clone(),
        wake_scene: config.wake_scene,
        seq: 0,
        generation: 0,
        active: None,
        state_tx,
        scene_tx,
    };
    let task = tokio::spawn(serializer.run(rx));

    let handle = ControllerHandle {
        tx,
        state_rx,
        scene_rx,
        library,
        ack_timeout: config.ack_timeout,
    };

    Ok((handle, task))
}
