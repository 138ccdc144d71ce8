//! Async driver with statum state machine for the engine lifecycle
//!
//! Owns one [`Engine`] inside a tokio task. Commands arrive over an mpsc
//! channel; between commands the task sleeps until the engine's next timer
//! deadline so look ticks, thumb-click releases and calibration timeouts fire
//! on time without polling.
//!
//! # State Machine
//!
//! ```text
//! Initializing ──► Running ──► Stopping
//!                     │           │
//!               (commands,     teardown: release input,
//!                timers)       persist settings + mapping
//! ```

use super::{Engine, InputSnapshot};
use crate::config::SettingsOverlay;
use crate::error::EngineError;
use crate::input::{PhysicalInput, PointerEvent};
use crate::profile::store::SaveOutcome;
use crate::profile::ControlId;
use statum::{machine, state};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const COMMAND_BUFFER: usize = 256;

macro_rules! respond {
    ($response_tx:expr, $value:expr) => {
        if $response_tx.send($value).is_err() {
            warn!("Command caller went away before the response");
        }
    };
}

/// Everything the driver can be asked to do.
#[derive(Debug)]
pub enum EngineCommand {
    Pointer(PointerEvent),
    Physical {
        input: PhysicalInput,
        response_tx: Option<oneshot::Sender<bool>>,
    },
    Text {
        text: String,
        response_tx: oneshot::Sender<usize>,
    },
    Enable,
    Disable,
    SetProfile {
        id: String,
        response_tx: oneshot::Sender<Result<(), EngineError>>,
    },
    StartCalibration(ControlId),
    CancelCalibration,
    SaveCalibration {
        response_tx: oneshot::Sender<SaveOutcome>,
    },
    ResetCalibration {
        response_tx: oneshot::Sender<SaveOutcome>,
    },
    UpdateSettings {
        overlay: SettingsOverlay,
        response_tx: oneshot::Sender<Vec<String>>,
    },
    Snapshot {
        response_tx: oneshot::Sender<InputSnapshot>,
    },
    Feed {
        response_tx: oneshot::Sender<Vec<String>>,
    },
}

#[state]
#[derive(Debug, Clone)]
pub enum DriverState {
    Initializing,
    Running,
    Stopping,
}

#[machine]
pub struct EngineDriver<S: DriverState> {
    engine: Engine,
    rx: mpsc::Receiver<EngineCommand>,
    token: CancellationToken,
}

enum Wakeup {
    Shutdown,
    Command(Option<EngineCommand>),
    Timer,
}

impl EngineDriver<Initializing> {
    pub fn create(
        engine: Engine,
        rx: mpsc::Receiver<EngineCommand>,
        token: CancellationToken,
    ) -> Self {
        info!("Initializing engine driver");
        Self::new(engine, rx, token)
    }

    pub fn start(self) -> EngineDriver<Running> {
        info!(
            "Engine driver running (profile {})",
            self.engine.settings().active_profile
        );
        self.transition()
    }
}

impl EngineDriver<Running> {
    /// Processes commands and timers until cancelled or every sender is gone.
    pub async fn run_until_shutdown(mut self) -> EngineDriver<Stopping> {
        loop {
            let deadline = self.engine.next_deadline();
            let wakeup = tokio::select! {
                _ = self.token.cancelled() => Wakeup::Shutdown,
                command = self.rx.recv() => Wakeup::Command(command),
                _ = sleep_until_deadline(deadline) => Wakeup::Timer,
            };

            match wakeup {
                Wakeup::Shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                Wakeup::Command(None) => {
                    info!("All command senders dropped");
                    break;
                }
                Wakeup::Command(Some(command)) => self.handle(command),
                Wakeup::Timer => self.engine.advance(Instant::now()),
            }
        }

        info!("Transitioning to Stopping");
        self.transition()
    }

    fn handle(&mut self, command: EngineCommand) {
        let now = Instant::now();
        debug!("Handling {:?}", command);
        match command {
            EngineCommand::Pointer(event) => self.engine.handle_pointer(event, now),
            EngineCommand::Physical { input, response_tx } => {
                let consumed = self.engine.on_physical_input(input, now);
                if let Some(tx) = response_tx {
                    respond!(tx, consumed);
                }
            }
            EngineCommand::Text { text, response_tx } => {
                respond!(response_tx, self.engine.text_input(&text, now));
            }
            EngineCommand::Enable => self.engine.enable(now),
            EngineCommand::Disable => self.engine.disable(now),
            EngineCommand::SetProfile { id, response_tx } => {
                respond!(response_tx, self.engine.switch_profile(&id, now));
            }
            EngineCommand::StartCalibration(target) => self.engine.start_calibration(target, now),
            EngineCommand::CancelCalibration => self.engine.cancel_calibration(now),
            EngineCommand::SaveCalibration { response_tx } => {
                respond!(response_tx, self.engine.save_calibration(now));
            }
            EngineCommand::ResetCalibration { response_tx } => {
                respond!(response_tx, self.engine.reset_calibration(now));
            }
            EngineCommand::UpdateSettings {
                overlay,
                response_tx,
            } => {
                respond!(response_tx, self.engine.update_settings(&overlay, now));
            }
            EngineCommand::Snapshot { response_tx } => {
                respond!(response_tx, self.engine.snapshot());
            }
            EngineCommand::Feed { response_tx } => {
                respond!(response_tx, self.engine.visible_feed(now));
            }
        }
    }
}

impl EngineDriver<Stopping> {
    /// Releases all input and persists state.
    pub fn shutdown(mut self) -> SaveOutcome {
        info!("Stopping engine driver");
        self.engine.teardown(Instant::now())
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Handle for an engine running in a tokio task
#[derive(Debug)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
    token: CancellationToken,
    task_handle: Option<JoinHandle<SaveOutcome>>,
}

impl EngineHandle {
    /// Moves `engine` into a new task and starts driving it.
    pub fn spawn(engine: Engine) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let token = CancellationToken::new();
        let driver = EngineDriver::create(engine, rx, token.clone()).start();

        let task_handle = tokio::spawn(async move {
            let stopping = driver.run_until_shutdown().await;
            stopping.shutdown()
        });

        Self {
            tx,
            token,
            task_handle: Some(task_handle),
        }
    }

    pub fn sender(&self) -> mpsc::Sender<EngineCommand> {
        self.tx.clone()
    }

    pub async fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.tx.send(command).await.map_err(|e| {
            error!("Failed to send engine command: {}", e);
            EngineError::ChannelClosed
        })
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T, EngineError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(build(response_tx)).await?;
        response_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn pointer(&self, event: PointerEvent) -> Result<(), EngineError> {
        self.send(EngineCommand::Pointer(event)).await
    }

    /// Returns whether calibration consumed the input.
    pub async fn physical_input(&self, input: PhysicalInput) -> Result<bool, EngineError> {
        self.request(|response_tx| EngineCommand::Physical {
            input,
            response_tx: Some(response_tx),
        })
        .await
    }

    /// Returns the number of keystrokes typed.
    pub async fn text_input(&self, text: &str) -> Result<usize, EngineError> {
        let text = text.to_string();
        self.request(|response_tx| EngineCommand::Text { text, response_tx })
            .await
    }

    pub async fn switch_profile(&self, id: &str) -> Result<(), EngineError> {
        let id = id.to_string();
        self.request(|response_tx| EngineCommand::SetProfile { id, response_tx })
            .await?
    }

    pub async fn save_calibration(&self) -> Result<SaveOutcome, EngineError> {
        self.request(|response_tx| EngineCommand::SaveCalibration { response_tx })
            .await
    }

    pub async fn reset_calibration(&self) -> Result<SaveOutcome, EngineError> {
        self.request(|response_tx| EngineCommand::ResetCalibration { response_tx })
            .await
    }

    pub async fn update_settings(
        &self,
        overlay: SettingsOverlay,
    ) -> Result<Vec<String>, EngineError> {
        self.request(|response_tx| EngineCommand::UpdateSettings {
            overlay,
            response_tx,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<InputSnapshot, EngineError> {
        self.request(|response_tx| EngineCommand::Snapshot { response_tx })
            .await
    }

    pub async fn feed(&self) -> Result<Vec<String>, EngineError> {
        self.request(|response_tx| EngineCommand::Feed { response_tx })
            .await
    }

    /// Cancels the driver and waits for teardown to finish.
    pub async fn shutdown(&mut self) -> Result<SaveOutcome, EngineError> {
        debug!("Sending shutdown signal to engine driver");
        self.token.cancel();

        match self.task_handle.take() {
            Some(handle) => handle.await.map_err(|e| {
                error!("Engine task failed: {}", e);
                EngineError::TaskFailed(e.to_string())
            }),
            None => {
                debug!("Engine driver already shut down");
                Err(EngineError::ChannelClosed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{PointerId, PointerPhase};
    use crate::persistence::{KeyValueStore, MemoryStore, CONFIG_KEY};
    use crate::synth::{RecordingSink, SyntheticEvent};
    use std::time::Duration;

    fn spawn() -> (EngineHandle, RecordingSink, MemoryStore) {
        let sink = RecordingSink::new();
        let store = MemoryStore::new();
        let engine = Engine::load(
            Box::new(sink.clone()),
            Box::new(store.clone()),
            Instant::now(),
        );
        (EngineHandle::spawn(engine), sink, store)
    }

    #[tokio::test(start_paused = true)]
    async fn look_stick_ticks_while_held() {
        let (mut handle, sink, _) = spawn();
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.enabled);

        let layout = crate::controls::Layout::default();
        let c = layout.right_stick.center;
        handle
            .pointer(PointerEvent::new(
                PointerId::Touch(3),
                PointerPhase::Down,
                c.x + 40.0,
                c.y,
            ))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle
            .pointer(PointerEvent::new(PointerId::Touch(3), PointerPhase::Up, 0.0, 0.0))
            .await
            .unwrap();
        handle.snapshot().await.unwrap();

        let moves = sink
            .take()
            .into_iter()
            .filter(|e| matches!(e, SyntheticEvent::MouseMove { dx, .. } if *dx > 0.0))
            .count();
        assert!(moves >= 4, "only {moves} look ticks");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sink.take().is_empty());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn calibration_times_out_in_the_background() {
        let (mut handle, _, _) = spawn();
        handle
            .send(EngineCommand::StartCalibration(ControlId::ButtonA))
            .await
            .unwrap();
        assert_eq!(
            handle.snapshot().await.unwrap().calibrating,
            Some(ControlId::ButtonA)
        );

        tokio::time::sleep(Duration::from_millis(5001)).await;
        assert_eq!(handle.snapshot().await.unwrap().calibrating, None);
        assert!(!handle
            .physical_input(PhysicalInput::Key("k".into()))
            .await
            .unwrap());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_persists_settings_and_mapping() {
        let (mut handle, _, store) = spawn();
        handle.switch_profile("fps").await.unwrap();
        assert_eq!(handle.shutdown().await.unwrap(), SaveOutcome::Saved);

        let blob = store.get(CONFIG_KEY).unwrap().unwrap();
        assert!(blob.contains("active_profile = \"fps\""));
        assert!(store.get("touchcontroller_fps").unwrap().is_some());

        assert!(matches!(
            handle.snapshot().await,
            Err(EngineError::ChannelClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_profile_error_reaches_caller() {
        let (mut handle, _, _) = spawn();
        assert!(matches!(
            handle.switch_profile("doom").await,
            Err(EngineError::UnknownProfile(_))
        ));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn text_reaches_the_sink_until_disabled() {
        let (mut handle, sink, _) = spawn();
        assert_eq!(handle.text_input("ok").await.unwrap(), 2);
        assert_eq!(sink.take().len(), 4);

        handle.send(EngineCommand::Disable).await.unwrap();
        assert_eq!(handle.text_input("ok").await.unwrap(), 0);
        assert!(sink.take().is_empty());
        handle.shutdown().await.unwrap();
    }
}
