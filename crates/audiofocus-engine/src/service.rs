//! Public focus service surface.

use std::sync::Arc;

use tracing::{info, instrument};

use audiofocus_ipc::{
    ActionRecord, AudioScene, DeviceDescriptor, DeviceFlag, DeviceType, FocusMetrics,
    InterruptEvent, InterruptRequest, StreamDescriptor, StreamId, StreamSnapshot, VolumeEvent,
    VolumeType,
};
use audiofocus_policy::PolicyTable;

use crate::arbiter::{ArbiterOptions, InterruptArbiter};
use crate::config::EngineConfig;
use crate::context::DeviceSceneContext;
use crate::dispatcher::{NotificationDispatcher, Subscription, SubscriptionId};
use crate::error::FocusResult;
use crate::metrics::MetricsCollector;
use crate::registry::StreamRegistry;
use crate::volume::VolumeManager;

/// The audio focus service.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct FocusService {
    registry: Arc<StreamRegistry>,
    context: Arc<DeviceSceneContext>,
    volume: Arc<VolumeManager>,
    dispatcher: Arc<NotificationDispatcher>,
    metrics: Arc<MetricsCollector>,
    arbiter: InterruptArbiter,
}

impl FocusService {
    /// Build a service from a configuration.
    pub fn new(config: &EngineConfig) -> FocusResult<Self> {
        let policy = config.policy.build()?;
        Ok(Self::with_policy(config, policy))
    }

    /// Build a service with an explicit policy table.
    pub fn with_policy(config: &EngineConfig, policy: PolicyTable) -> Self {
        let metrics = Arc::new(MetricsCollector::new());
        let registry = Arc::new(StreamRegistry::new());
        let context = Arc::new(DeviceSceneContext::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(Arc::clone(&metrics)));
        let volume = Arc::new(VolumeManager::new(&config.volume, Arc::clone(&dispatcher)));

        let arbiter = InterruptArbiter::new(
            Arc::clone(&registry),
            Arc::clone(&context),
            Arc::clone(&volume),
            Arc::clone(&dispatcher),
            Arc::clone(&metrics),
            policy,
            ArbiterOptions {
                duck_factor: config.duck_factor,
                auto_scene: config.auto_scene,
            },
        );

        info!(
            duck_factor = config.duck_factor,
            auto_scene = config.auto_scene,
            "Focus service created"
        );

        Self {
            registry,
            context,
            volume,
            dispatcher,
            metrics,
            arbiter,
        }
    }

    // Streams

    /// Register a stream.
    pub fn register(&self, descriptor: StreamDescriptor) -> FocusResult<StreamId> {
        self.registry.register(descriptor)
    }

    /// Unregister a stream, releasing its focus first.
    pub fn unregister(&self, stream: StreamId) -> FocusResult<()> {
        self.arbiter.unregister(stream)
    }

    /// Declared attributes of a stream.
    pub fn get(&self, stream: StreamId) -> FocusResult<StreamDescriptor> {
        self.registry.get(stream)
    }

    /// Every registered stream.
    pub fn snapshot(&self) -> Vec<StreamSnapshot> {
        self.registry.snapshot()
    }

    /// Streams holding focus, with their state.
    pub fn focus_snapshot(&self) -> Vec<StreamSnapshot> {
        self.registry.active_streams()
    }

    // Interrupts

    /// Request focus.
    #[instrument(name = "service_activate", skip(self))]
    pub fn activate_audio_interrupt(&self, request: InterruptRequest) -> FocusResult<ActionRecord> {
        self.arbiter.activate(request)
    }

    /// Release focus. Returns false if the stream held none.
    #[instrument(name = "service_deactivate", skip(self))]
    pub fn deactivate_audio_interrupt(&self, request: InterruptRequest) -> FocusResult<bool> {
        self.arbiter.deactivate(request)
    }

    /// Call `handler` for every interrupt event of `stream`.
    pub fn on_interrupt<F>(&self, stream: StreamId, handler: F) -> FocusResult<SubscriptionId>
    where
        F: Fn(InterruptEvent) + Send + 'static,
    {
        self.arbiter
            .with_registered(stream, || self.dispatcher.on_interrupt(stream, handler))
    }

    /// Queue interrupt events of `stream` for polling.
    pub fn subscribe_interrupt(
        &self,
        stream: StreamId,
    ) -> FocusResult<Subscription<InterruptEvent>> {
        self.arbiter
            .with_registered(stream, || self.dispatcher.subscribe_interrupt(stream))
    }

    /// Remove interrupt subscriptions of `stream`. Idempotent.
    pub fn off_interrupt(&self, stream: StreamId) {
        self.dispatcher.off_interrupt(stream);
    }

    /// Call `handler` for every volume event.
    pub fn on_volume_change<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(VolumeEvent) + Send + 'static,
    {
        self.dispatcher.on_volume_change(handler)
    }

    /// Queue volume events for polling.
    pub fn subscribe_volume(&self) -> Subscription<VolumeEvent> {
        self.dispatcher.subscribe_volume()
    }

    /// Remove volume subscriptions. Idempotent.
    pub fn off_volume_change(&self) {
        self.dispatcher.off_volume_change();
    }

    /// Remove one subscription. Idempotent.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.dispatcher.unsubscribe(id);
    }

    // Scene and devices

    /// Current scene.
    pub fn scene(&self) -> AudioScene {
        self.context.scene()
    }

    /// Set the scene, returning the previous one. Active streams keep their state.
    pub fn set_scene(&self, scene: AudioScene) -> AudioScene {
        self.context.set_scene(scene)
    }

    /// Connect a device.
    pub fn connect_device(&self, device: DeviceDescriptor) {
        self.context.connect_device(device);
    }

    /// Disconnect a device.
    pub fn disconnect_device(&self, device_type: DeviceType) -> Option<DeviceDescriptor> {
        self.context.disconnect_device(device_type)
    }

    /// Connected devices matching `flag`.
    pub fn devices(&self, flag: DeviceFlag) -> Vec<DeviceDescriptor> {
        self.context.get_devices(flag)
    }

    /// Activate or deactivate a communication device.
    pub fn set_device_active(&self, device_type: DeviceType, active: bool) -> FocusResult<()> {
        self.context.set_device_active(device_type, active)
    }

    /// Returns true if the device is active.
    pub fn is_device_active(&self, device_type: DeviceType) -> bool {
        self.context.is_device_active(device_type)
    }

    // Volume

    /// Volume collaborator.
    pub fn volume(&self) -> &VolumeManager {
        &self.volume
    }

    /// Set a volume level.
    pub fn set_volume(&self, volume_type: VolumeType, volume: i32) -> FocusResult<()> {
        self.volume.set_volume(volume_type, volume)
    }

    /// Current volume level.
    pub fn get_volume(&self, volume_type: VolumeType) -> i32 {
        self.volume.volume(volume_type)
    }

    // Metrics

    /// Counters plus the number of streams holding focus.
    pub fn metrics(&self) -> FocusMetrics {
        self.metrics
            .snapshot(self.registry.active_streams().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FocusError;
    use audiofocus_ipc::{ContentType, InterruptHint, StreamState, StreamUsage};
    use std::sync::mpsc;
    use std::time::Duration;

    fn service() -> FocusService {
        FocusService::new(&EngineConfig::default()).unwrap()
    }

    fn register(service: &FocusService, volume_type: VolumeType) -> InterruptRequest {
        let descriptor = match volume_type {
            VolumeType::VoiceCall => StreamDescriptor::new(
                StreamUsage::VoiceCommunication,
                ContentType::Speech,
                volume_type,
            ),
            _ => StreamDescriptor::new(StreamUsage::Media, ContentType::Music, VolumeType::Media),
        };
        let id = service.register(descriptor).unwrap();
        InterruptRequest::new(id, volume_type)
    }

    #[test]
    fn test_handler_receives_pause() {
        let service = service();
        let media = register(&service, VolumeType::Media);
        let call = register(&service, VolumeType::VoiceCall);
        let (tx, rx) = mpsc::channel();

        service
            .on_interrupt(media.stream, move |event| {
                let _ = tx.send(event.hint_type);
            })
            .unwrap();

        service.activate_audio_interrupt(media).unwrap();
        service.activate_audio_interrupt(call).unwrap();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            InterruptHint::Pause
        );
        let focus = service.focus_snapshot();
        assert_eq!(focus.len(), 2);
        assert_eq!(focus[0].state, StreamState::Paused);
    }

    #[test]
    fn test_subscribe_unknown_stream() {
        let service = service();
        assert!(matches!(
            service.subscribe_interrupt(StreamId(77)),
            Err(FocusError::UnknownStream(_))
        ));
        service.off_interrupt(StreamId(77));
    }

    #[test]
    fn test_subscription_never_outlives_concurrent_unregister() {
        let service = Arc::new(service());

        for _ in 0..50 {
            let media = register(&service, VolumeType::Media);
            let unregister = {
                let service = Arc::clone(&service);
                std::thread::spawn(move || service.unregister(media.stream).unwrap())
            };
            let subscribed = service.on_interrupt(media.stream, |_| {});
            unregister.join().unwrap();

            if let Err(e) = subscribed {
                assert!(matches!(e, FocusError::UnknownStream(_)));
            }
            assert!(!service.dispatcher.has_interrupt_subscribers(media.stream));
        }
    }

    #[test]
    fn test_metrics_count_grants_and_denials() {
        let service = service();
        let call = register(&service, VolumeType::VoiceCall);
        let media = register(&service, VolumeType::Media);

        service.activate_audio_interrupt(call).unwrap();
        service.activate_audio_interrupt(media).unwrap();
        service.deactivate_audio_interrupt(call).unwrap();

        let metrics = service.metrics();
        assert_eq!(metrics.activations_granted, 1);
        assert_eq!(metrics.activations_denied, 1);
        assert_eq!(metrics.deactivations, 1);
        assert_eq!(metrics.active_streams, 0);
    }

    #[test]
    fn test_invalid_policy_config_fails_construction() {
        let mut config = EngineConfig::default();
        config.policy.extend_built_in = false;
        config.policy.fallback = None;

        assert!(matches!(
            FocusService::new(&config),
            Err(FocusError::Policy(_))
        ));
    }
}
