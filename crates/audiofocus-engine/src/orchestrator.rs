//! Command loop serving the focus service over channels.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use audiofocus_ipc::{
    ActionRecord, AudioScene, EngineCommand, EngineEvent, EngineState, StreamId,
};

use crate::dispatcher::SubscriptionId;
use crate::error::{FocusError, FocusResult};
use crate::service::FocusService;

const IDLE_POLL: Duration = Duration::from_millis(100);

/// The focus engine loop.
///
/// Commands are served one at a time in arrival order. Answers to commands
/// are sent with backpressure and never dropped; lifecycle and metrics
/// events are dropped when the event channel is full. Interrupt and volume
/// subscriptions are bridged onto the event channel from their delivery
/// threads.
pub struct Engine {
    service: Arc<FocusService>,
    command_rx: Receiver<EngineCommand>,
    event_tx: Sender<EngineEvent>,
    state: Arc<RwLock<EngineState>>,
    metrics_interval: Option<Duration>,
    interrupt_subscriptions: BTreeMap<StreamId, SubscriptionId>,
    volume_subscription: Option<SubscriptionId>,
}

impl Engine {
    /// Create a new engine.
    pub fn new(
        service: FocusService,
        command_rx: Receiver<EngineCommand>,
        event_tx: Sender<EngineEvent>,
    ) -> Self {
        Self {
            service: Arc::new(service),
            command_rx,
            event_tx,
            state: Arc::new(RwLock::new(EngineState::Idle)),
            metrics_interval: None,
            interrupt_subscriptions: BTreeMap::new(),
            volume_subscription: None,
        }
    }

    /// Emit metrics every `interval`, busy or not.
    pub fn with_metrics_interval(mut self, interval: Option<Duration>) -> Self {
        self.metrics_interval = interval;
        self
    }

    /// Shared service handle.
    pub fn service(&self) -> Arc<FocusService> {
        Arc::clone(&self.service)
    }

    /// Current engine state.
    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    /// Run the engine (blocking).
    #[instrument(name = "engine_run", skip(self))]
    pub fn run(&mut self) {
        info!("Engine starting");
        self.transition_to(EngineState::Serving);
        self.notify(EngineEvent::Ready);

        let mut next_metrics = self.metrics_interval.map(|interval| Instant::now() + interval);

        loop {
            let timeout = next_metrics
                .map(|at| at.saturating_duration_since(Instant::now()))
                .unwrap_or(IDLE_POLL);

            match self.command_rx.recv_timeout(timeout) {
                Ok(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Command channel disconnected, shutting down");
                    self.transition_to(EngineState::ShuttingDown);
                    break;
                }
            }

            if let (Some(interval), Some(at)) = (self.metrics_interval, next_metrics) {
                let now = Instant::now();
                if now >= at {
                    self.notify(EngineEvent::Metrics(self.service.metrics()));
                    next_metrics = Some(now + interval);
                }
            }
        }

        info!("Engine stopped");
    }

    /// Handle a command. Returns false if engine should stop.
    fn handle_command(&mut self, command: EngineCommand) -> bool {
        debug!(?command, "Handling command");
        let scene_before = self.service.scene();
        let request_id = command.request_id();
        let shutdown = matches!(command, EngineCommand::Shutdown);

        match self.execute(command) {
            Ok(Some(answer)) => self.reply(answer),
            Ok(None) => {}
            Err(e) => self.send_error(request_id, e),
        }

        if shutdown {
            return false;
        }
        self.report_scene_change(scene_before);
        true
    }

    /// Run one command, returning its answer if it has one.
    fn execute(&mut self, command: EngineCommand) -> FocusResult<Option<EngineEvent>> {
        let answer = match command {
            EngineCommand::Register {
                request_id,
                descriptor,
            } => {
                let stream = self.service.register(descriptor)?;
                EngineEvent::Registered { request_id, stream }
            }
            EngineCommand::Unregister { request_id, stream } => {
                self.service.unregister(stream)?;
                self.interrupt_subscriptions.remove(&stream);
                EngineEvent::Unregistered { request_id, stream }
            }
            EngineCommand::Activate {
                request_id,
                request,
            } => EngineEvent::Action {
                request_id,
                stream: request.stream,
                record: self.service.activate_audio_interrupt(request)?,
            },
            EngineCommand::Deactivate {
                request_id,
                request,
            } => {
                let released = self.service.deactivate_audio_interrupt(request)?;
                EngineEvent::Deactivated {
                    request_id,
                    stream: request.stream,
                    record: released.then(ActionRecord::deactivated),
                }
            }
            EngineCommand::SubscribeInterrupt { stream } => {
                self.subscribe_interrupt(stream)?;
                return Ok(None);
            }
            EngineCommand::UnsubscribeInterrupt { stream } => {
                self.interrupt_subscriptions.remove(&stream);
                self.service.off_interrupt(stream);
                return Ok(None);
            }
            EngineCommand::SubscribeVolume => {
                self.subscribe_volume();
                return Ok(None);
            }
            EngineCommand::UnsubscribeVolume => {
                if let Some(id) = self.volume_subscription.take() {
                    self.service.unsubscribe(id);
                }
                return Ok(None);
            }
            EngineCommand::SetScene { scene } => {
                self.service.set_scene(scene);
                return Ok(None);
            }
            EngineCommand::ConnectDevice { device } => {
                self.service.connect_device(device);
                return Ok(None);
            }
            EngineCommand::DisconnectDevice { device_type } => {
                self.service.disconnect_device(device_type);
                return Ok(None);
            }
            EngineCommand::SetDeviceActive {
                request_id,
                device_type,
                active,
            } => {
                self.service.set_device_active(device_type, active)?;
                EngineEvent::DeviceActiveChanged {
                    request_id,
                    device_type,
                    active,
                }
            }
            EngineCommand::SetVolume {
                request_id,
                volume_type,
                volume,
            } => {
                self.service.set_volume(volume_type, volume)?;
                EngineEvent::VolumeSet { request_id }
            }
            EngineCommand::GetFocusSnapshot { request_id } => EngineEvent::FocusSnapshot {
                request_id,
                streams: self.service.focus_snapshot(),
            },
            EngineCommand::GetMetrics => EngineEvent::Metrics(self.service.metrics()),
            EngineCommand::Shutdown => {
                self.transition_to(EngineState::ShuttingDown);
                EngineEvent::Shutdown
            }
        };
        Ok(Some(answer))
    }

    fn subscribe_interrupt(&mut self, stream: StreamId) -> FocusResult<()> {
        if self.interrupt_subscriptions.contains_key(&stream) {
            debug!(%stream, "Interrupts already subscribed, ignoring");
            return Ok(());
        }

        let event_tx = self.event_tx.clone();
        let id = self.service.on_interrupt(stream, move |event| {
            // Delivery thread: block rather than drop
            let _ = event_tx.send(EngineEvent::Interrupt { stream, event });
        })?;
        self.interrupt_subscriptions.insert(stream, id);
        Ok(())
    }

    fn subscribe_volume(&mut self) {
        if self.volume_subscription.is_some() {
            debug!("Volume already subscribed, ignoring");
            return;
        }

        let event_tx = self.event_tx.clone();
        let id = self.service.on_volume_change(move |event| {
            let _ = event_tx.send(EngineEvent::VolumeChanged(event));
        });
        self.volume_subscription = Some(id);
    }

    fn report_scene_change(&self, previous: AudioScene) {
        let current = self.service.scene();
        if current != previous {
            self.reply(EngineEvent::SceneChanged { previous, current });
        }
    }

    fn transition_to(&self, new_state: EngineState) {
        let previous = std::mem::replace(&mut *self.state.write(), new_state);

        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "State transition"
        );

        self.notify(EngineEvent::StateChanged {
            previous,
            current: new_state,
        });
    }

    fn send_error(&self, request_id: Option<u64>, error: FocusError) {
        warn!(?request_id, %error, "Command failed");
        self.reply(EngineEvent::Error {
            request_id,
            code: error.code(),
            message: error.to_string(),
        });
    }

    /// Send an answer, waiting for room in the event channel.
    fn reply(&self, event: EngineEvent) {
        if self.event_tx.send(event).is_err() {
            warn!("Event receiver gone, answer discarded");
        }
    }

    /// Send a status event, dropping it if the event channel is full.
    fn notify(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        for id in std::mem::take(&mut self.interrupt_subscriptions).into_values() {
            self.service.unsubscribe(id);
        }
        if let Some(id) = self.volume_subscription.take() {
            self.service.unsubscribe(id);
        }
    }
}
