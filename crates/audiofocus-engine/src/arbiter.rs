//! Interrupt arbitration.
//!
//! All activate and deactivate calls pass through one lock and are served in
//! the order they acquire it. Every stream keeps the set of streams that
//! currently suppress it; its state is derived from that set:
//!
//! - any pause → `Paused`
//! - otherwise any duck → `Ducked`
//! - otherwise → `Running`
//!
//! A stream leaves every suppressor set only when it goes inactive, which is
//! what drives the wake-up sweep.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use audiofocus_ipc::{
    ActionRecord, AudioScene, InterruptEvent, InterruptForceType, InterruptHint, InterruptRequest,
    InterruptType, StreamDescriptor, StreamId, StreamState, VolumeType,
};
use audiofocus_policy::{ActionTarget, Outcome, PolicyTable, Treatment};

use crate::context::DeviceSceneContext;
use crate::dispatcher::NotificationDispatcher;
use crate::error::{FocusError, FocusResult};
use crate::metrics::MetricsCollector;
use crate::registry::StreamRegistry;
use crate::volume::VolumeManager;

/// Arbitration settings.
#[derive(Debug, Clone, Copy)]
pub struct ArbiterOptions {
    /// Fraction of the normalized volume reported to ducked streams.
    pub duck_factor: f32,

    /// Raise and lower the scene from the active streams.
    pub auto_scene: bool,
}

#[derive(Default)]
struct Suppressors {
    by_target: BTreeMap<StreamId, BTreeMap<StreamId, Treatment>>,
}

impl Suppressors {
    fn suppress(&mut self, target: StreamId, by: StreamId, treatment: Treatment) {
        self.by_target.entry(target).or_default().insert(by, treatment);
    }

    /// Forget what suppressed `target`.
    fn clear(&mut self, target: StreamId) {
        self.by_target.remove(&target);
    }

    fn is_suppressed_by(&self, target: StreamId, by: StreamId) -> bool {
        self.by_target
            .get(&target)
            .is_some_and(|set| set.contains_key(&by))
    }

    /// Drop `departed` from every set, returning the streams it suppressed.
    fn release(&mut self, departed: StreamId) -> Vec<StreamId> {
        let mut affected = Vec::new();
        for (target, by) in self.by_target.iter_mut() {
            if by.remove(&departed).is_some() {
                affected.push(*target);
            }
        }
        self.by_target.retain(|_, by| !by.is_empty());
        affected
    }

    fn state_of(&self, target: StreamId) -> StreamState {
        let Some(by) = self.by_target.get(&target) else {
            return StreamState::Running;
        };

        if by.values().any(|t| *t == Treatment::Pause) {
            StreamState::Paused
        } else if by.values().any(|t| *t == Treatment::Duck) {
            StreamState::Ducked
        } else {
            StreamState::Running
        }
    }
}

/// Notifications collected during one arbitration.
type Pending = Vec<(StreamId, InterruptEvent)>;

/// Decides winners and losers for every activation and deactivation.
pub struct InterruptArbiter {
    registry: Arc<StreamRegistry>,
    context: Arc<DeviceSceneContext>,
    volume: Arc<VolumeManager>,
    dispatcher: Arc<NotificationDispatcher>,
    metrics: Arc<MetricsCollector>,
    policy: PolicyTable,
    options: ArbiterOptions,
    focus: Mutex<Suppressors>,
}

impl InterruptArbiter {
    /// Create an arbiter over shared registry and context.
    pub fn new(
        registry: Arc<StreamRegistry>,
        context: Arc<DeviceSceneContext>,
        volume: Arc<VolumeManager>,
        dispatcher: Arc<NotificationDispatcher>,
        metrics: Arc<MetricsCollector>,
        policy: PolicyTable,
        options: ArbiterOptions,
    ) -> Self {
        Self {
            registry,
            context,
            volume,
            dispatcher,
            metrics,
            policy,
            options,
            focus: Mutex::new(Suppressors::default()),
        }
    }

    /// Policy table in use.
    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    /// Request focus for a stream.
    ///
    /// The requester never receives an event for its own request; the
    /// returned record is its answer. When the record is `Interrupted`
    /// nothing changed. Paused streams count as active here, both as
    /// blockers and as streams to suppress.
    #[instrument(name = "activate_interrupt", skip(self), fields(stream = %request.stream))]
    pub fn activate(&self, request: InterruptRequest) -> FocusResult<ActionRecord> {
        let mut focus = self.focus.lock();
        let id = request.stream;
        let descriptor = self.checked_descriptor(&request)?;

        match self.registry.state(id)? {
            StreamState::Running | StreamState::Ducked => {
                debug!("Stream already active");
                return Ok(ActionRecord::activated());
            }
            StreamState::Paused => {
                debug!("Stream already active but paused");
                return Ok(ActionRecord::interrupted(InterruptHint::Pause));
            }
            StreamState::Inactive => {}
        }

        let scene = self.context.scene();
        let decisions = self
            .registry
            .active_streams()
            .into_iter()
            .filter(|other| other.id != id && !descriptor.shares_focus_with(&other.descriptor))
            .map(|other| {
                let outcome = self.policy.decide(&descriptor, &other.descriptor, scene);
                (other, outcome)
            })
            .collect::<Vec<_>>();

        for (other, outcome) in &decisions {
            let outcome = Outcome {
                treatment: effective(outcome.treatment, outcome.is_forced(), &descriptor),
                ..*outcome
            };
            if outcome.rejects_incoming() {
                self.metrics.record_denied();
                info!(
                    blocked_by = %other.id,
                    treatment = ?outcome.treatment,
                    ?scene,
                    "Activation denied"
                );
                return Ok(ActionRecord::interrupted(outcome.treatment.hint()));
            }
        }

        let mut pending = Pending::new();
        let mut record = ActionRecord::activated();
        let mut suppressed = Vec::new();
        let mut stopped = Vec::new();

        for (other, outcome) in decisions {
            if outcome.is_allow() {
                continue;
            }

            match outcome.target {
                ActionTarget::Incoming => {
                    // Only ducks survive the rejection pass
                    if outcome.is_forced() {
                        focus.suppress(id, other.id, Treatment::Duck);
                    }
                    record.hint = InterruptHint::Duck;
                }
                ActionTarget::Active if !outcome.is_forced() => {
                    if other.state.is_audible() {
                        let event = self.notification(
                            InterruptType::Begin,
                            InterruptForceType::Share,
                            outcome.treatment.hint(),
                            other.descriptor.volume_type,
                        );
                        pending.push((other.id, event));
                    }
                }
                ActionTarget::Active => {
                    match effective(outcome.treatment, true, &other.descriptor) {
                        Treatment::Stop => stopped.push(other.id),
                        treatment => {
                            focus.suppress(other.id, id, treatment);
                            suppressed.push(other.id);
                        }
                    }
                }
            }
        }

        self.registry.set_state(id, focus.state_of(id))?;

        for target in suppressed {
            self.apply(&focus, target, &mut pending)?;
        }
        for target in stopped {
            self.stop(&mut focus, target, &mut pending)?;
        }

        self.metrics.record_granted();
        info!(
            state = self.registry.state(id)?.name(),
            notified = pending.len(),
            "Activation granted"
        );

        self.publish(pending);
        if self.options.auto_scene {
            self.raise_scene();
        }

        Ok(record)
    }

    /// Release a stream's focus and wake the streams it suppressed.
    ///
    /// Returns false, with no side effects, when the stream held no focus.
    #[instrument(name = "deactivate_interrupt", skip(self), fields(stream = %request.stream))]
    pub fn deactivate(&self, request: InterruptRequest) -> FocusResult<bool> {
        let mut focus = self.focus.lock();
        let id = request.stream;
        self.checked_descriptor(&request)?;

        if !self.registry.state(id)?.is_active() {
            debug!("Stream not active, nothing to release");
            return Ok(false);
        }

        let mut pending = Pending::new();
        self.release(&mut focus, id, &mut pending)?;

        info!(woken = pending.len(), "Focus released");
        self.publish(pending);
        if self.options.auto_scene {
            self.lower_scene();
        }

        Ok(true)
    }

    /// Run `f` while `stream` is known to stay registered.
    ///
    /// Holds the focus lock, so an `unregister` cannot slip in between the
    /// check and whatever `f` attaches to the stream.
    pub fn with_registered<T>(&self, stream: StreamId, f: impl FnOnce() -> T) -> FocusResult<T> {
        let _focus = self.focus.lock();
        if !self.registry.contains(stream) {
            return Err(FocusError::UnknownStream(stream));
        }
        Ok(f())
    }

    /// Release focus if held, then remove the stream and its subscriptions.
    #[instrument(name = "unregister_stream", skip(self))]
    pub fn unregister(&self, id: StreamId) -> FocusResult<()> {
        let mut focus = self.focus.lock();
        let mut pending = Pending::new();

        if self.registry.state(id)?.is_active() {
            self.release(&mut focus, id, &mut pending)?;
        }

        self.registry.unregister(id)?;
        self.dispatcher.off_interrupt(id);
        self.publish(pending);

        if self.options.auto_scene {
            self.lower_scene();
        }
        Ok(())
    }

    fn checked_descriptor(&self, request: &InterruptRequest) -> FocusResult<StreamDescriptor> {
        let descriptor = self.registry.get(request.stream)?;
        if descriptor.volume_type != request.volume_type {
            return Err(FocusError::ParameterValue(format!(
                "stream {} has volume type {:?}, request names {:?}",
                request.stream, descriptor.volume_type, request.volume_type
            )));
        }
        Ok(descriptor)
    }

    fn release(
        &self,
        focus: &mut Suppressors,
        id: StreamId,
        pending: &mut Pending,
    ) -> FocusResult<()> {
        self.registry.set_state(id, StreamState::Inactive)?;
        focus.clear(id);
        self.sweep(focus, id, pending)?;
        self.metrics.record_deactivation();
        Ok(())
    }

    /// Forced stop of another stream.
    fn stop(
        &self,
        focus: &mut Suppressors,
        target: StreamId,
        pending: &mut Pending,
    ) -> FocusResult<()> {
        let previous = self.registry.set_state(target, StreamState::Inactive)?;
        self.notify_transition(target, previous, StreamState::Inactive, pending)?;
        focus.clear(target);
        self.sweep(focus, target, pending)
    }

    /// Recompute every stream `departed` suppressed.
    fn sweep(
        &self,
        focus: &mut Suppressors,
        departed: StreamId,
        pending: &mut Pending,
    ) -> FocusResult<()> {
        for target in focus.release(departed) {
            // A nested stop may already have ended it
            if !self.registry.state(target)?.is_active() {
                continue;
            }
            if self.reassess(focus, target)? {
                self.stop(focus, target, pending)?;
            } else {
                self.apply(focus, target, pending)?;
            }
        }
        Ok(())
    }

    /// Weigh a woken stream as if it were requesting focus against every
    /// stream that does not already suppress it.
    ///
    /// Forced ducks and pauses are recorded as suppressors. Returns true
    /// when a forced stop applies, meaning the stream must end.
    fn reassess(&self, focus: &mut Suppressors, target: StreamId) -> FocusResult<bool> {
        let descriptor = self.registry.get(target)?;
        let scene = self.context.scene();

        for other in self.registry.active_streams() {
            if other.id == target
                || focus.is_suppressed_by(target, other.id)
                || descriptor.shares_focus_with(&other.descriptor)
            {
                continue;
            }

            let outcome = self.policy.decide(&descriptor, &other.descriptor, scene);
            if outcome.target != ActionTarget::Incoming || !outcome.is_forced() {
                continue;
            }
            match effective(outcome.treatment, true, &descriptor) {
                Treatment::Stop => {
                    debug!(stream = %target, by = %other.id, "Woken stream stopped");
                    return Ok(true);
                }
                treatment @ (Treatment::Duck | Treatment::Pause) => {
                    debug!(
                        stream = %target,
                        by = %other.id,
                        ?treatment,
                        "Woken stream still suppressed"
                    );
                    focus.suppress(target, other.id, treatment);
                }
                Treatment::Allow => {}
            }
        }
        Ok(false)
    }

    fn apply(
        &self,
        focus: &Suppressors,
        target: StreamId,
        pending: &mut Pending,
    ) -> FocusResult<()> {
        let next = focus.state_of(target);
        let previous = self.registry.set_state(target, next)?;
        self.notify_transition(target, previous, next, pending)
    }

    fn notify_transition(
        &self,
        target: StreamId,
        previous: StreamState,
        next: StreamState,
        pending: &mut Pending,
    ) -> FocusResult<()> {
        let hints = previous.transition_hints(next);
        if hints.is_empty() {
            return Ok(());
        }

        let volume_type = self.registry.get(target)?.volume_type;
        for (event_type, hint) in hints {
            let event = self.notification(event_type, InterruptForceType::Force, hint, volume_type);
            pending.push((target, event));
        }
        Ok(())
    }

    fn notification(
        &self,
        event_type: InterruptType,
        force_type: InterruptForceType,
        hint: InterruptHint,
        volume_type: VolumeType,
    ) -> InterruptEvent {
        let event = match event_type {
            InterruptType::Begin => InterruptEvent::begin(force_type, hint),
            InterruptType::End => InterruptEvent::end(force_type, hint),
        };

        if hint == InterruptHint::Duck {
            event.with_duck_volume(self.options.duck_factor * self.volume.normalized(volume_type))
        } else {
            event
        }
    }

    /// Hand collected events to the dispatcher while the focus lock is held.
    fn publish(&self, pending: Pending) {
        for (target, event) in pending {
            debug!(
                target = %target,
                event_type = ?event.event_type,
                force = ?event.force_type,
                hint = ?event.hint_type,
                "Interrupt notification"
            );
            self.dispatcher.publish_interrupt(target, event);
        }
    }

    fn implied_scene(&self) -> AudioScene {
        self.registry
            .active_streams()
            .iter()
            .map(|s| s.descriptor.volume_type.implied_scene())
            .max_by_key(|scene| scene.priority())
            .unwrap_or_default()
    }

    fn raise_scene(&self) {
        let implied = self.implied_scene();
        if implied.priority() > self.context.scene().priority() {
            self.context.set_scene(implied);
        }
    }

    fn lower_scene(&self) {
        let implied = self.implied_scene();
        if implied.priority() < self.context.scene().priority() {
            self.context.set_scene(implied);
        }
    }
}

/// Forced ducks on a pause-when-ducked stream are applied as pauses.
fn effective(treatment: Treatment, forced: bool, target: &StreamDescriptor) -> Treatment {
    if forced && treatment == Treatment::Duck && target.pause_when_ducked {
        Treatment::Pause
    } else {
        treatment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VolumeConfig;
    use crate::dispatcher::Subscription;
    use audiofocus_ipc::{ActionType, ContentType, InterruptMode, StreamUsage};
    use audiofocus_policy::{Outcome, PolicyRule};
    use std::time::Duration;

    struct Fixture {
        registry: Arc<StreamRegistry>,
        context: Arc<DeviceSceneContext>,
        dispatcher: Arc<NotificationDispatcher>,
        arbiter: InterruptArbiter,
    }

    fn fixture_with(policy: PolicyTable, auto_scene: bool) -> Fixture {
        let metrics = Arc::new(MetricsCollector::new());
        let registry = Arc::new(StreamRegistry::new());
        let context = Arc::new(DeviceSceneContext::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(Arc::clone(&metrics)));
        let volume = Arc::new(VolumeManager::new(
            &VolumeConfig::default(),
            Arc::clone(&dispatcher),
        ));
        let arbiter = InterruptArbiter::new(
            Arc::clone(&registry),
            Arc::clone(&context),
            volume,
            Arc::clone(&dispatcher),
            metrics,
            policy,
            ArbiterOptions {
                duck_factor: 0.2,
                auto_scene,
            },
        );

        Fixture {
            registry,
            context,
            dispatcher,
            arbiter,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(PolicyTable::built_in(), false)
    }

    fn descriptor(volume_type: VolumeType) -> StreamDescriptor {
        match volume_type {
            VolumeType::Media => {
                StreamDescriptor::new(StreamUsage::Media, ContentType::Music, volume_type)
            }
            VolumeType::VoiceCall => StreamDescriptor::new(
                StreamUsage::VoiceCommunication,
                ContentType::Speech,
                volume_type,
            ),
            VolumeType::Ringtone => StreamDescriptor::new(
                StreamUsage::NotificationRingtone,
                ContentType::Ringtone,
                volume_type,
            ),
            VolumeType::VoiceAssistant => {
                StreamDescriptor::new(StreamUsage::VoiceAssistant, ContentType::Speech, volume_type)
            }
        }
    }

    impl Fixture {
        fn stream(
            &self,
            volume_type: VolumeType,
        ) -> (InterruptRequest, Subscription<InterruptEvent>) {
            self.stream_with(descriptor(volume_type))
        }

        fn stream_with(
            &self,
            descriptor: StreamDescriptor,
        ) -> (InterruptRequest, Subscription<InterruptEvent>) {
            let volume_type = descriptor.volume_type;
            let id = self.registry.register(descriptor).unwrap();
            let events = self.dispatcher.subscribe_interrupt(id);
            (InterruptRequest::new(id, volume_type), events)
        }

        fn state(&self, request: InterruptRequest) -> StreamState {
            self.registry.state(request.stream).unwrap()
        }
    }

    fn next(events: &Subscription<InterruptEvent>) -> InterruptEvent {
        events.recv_timeout(Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_call_pauses_media_and_sweep_resumes_it() {
        let f = fixture();
        let (media, media_events) = f.stream(VolumeType::Media);
        let (call, call_events) = f.stream(VolumeType::VoiceCall);

        assert!(f.arbiter.activate(media).unwrap().is_granted());
        assert!(f.arbiter.activate(call).unwrap().is_granted());
        assert_eq!(f.state(media), StreamState::Paused);
        assert_eq!(f.state(call), StreamState::Running);
        assert!(next(&media_events).is(
            InterruptType::Begin,
            InterruptForceType::Force,
            InterruptHint::Pause
        ));

        assert!(f.arbiter.deactivate(call).unwrap());
        assert_eq!(f.state(media), StreamState::Running);
        assert!(next(&media_events).is(
            InterruptType::End,
            InterruptForceType::Force,
            InterruptHint::Resume
        ));
        assert!(media_events.try_recv().is_none());
        assert!(call_events.try_recv().is_none());
    }

    #[test]
    fn test_media_rejected_during_call() {
        let f = fixture();
        let (call, call_events) = f.stream(VolumeType::VoiceCall);
        let (media, media_events) = f.stream(VolumeType::Media);

        f.arbiter.activate(call).unwrap();
        let record = f.arbiter.activate(media).unwrap();

        assert_eq!(record.action_type, ActionType::Interrupted);
        assert_eq!(record.hint, InterruptHint::Pause);
        assert_eq!(f.state(media), StreamState::Inactive);
        assert_eq!(f.state(call), StreamState::Running);
        assert!(call_events.try_recv().is_none());
        assert!(media_events.try_recv().is_none());
    }

    #[test]
    fn test_ringtone_ducks_media_when_ringing() {
        let f = fixture();
        f.context.set_scene(AudioScene::Ringing);
        let (media, media_events) = f.stream(VolumeType::Media);
        let (ring, _) = f.stream(VolumeType::Ringtone);

        f.arbiter.activate(media).unwrap();
        assert!(f.arbiter.activate(ring).unwrap().is_granted());
        assert_eq!(f.state(media), StreamState::Ducked);

        let duck = next(&media_events);
        assert!(duck.is(InterruptType::Begin, InterruptForceType::Force, InterruptHint::Duck));
        let expected = 0.2 * 5.0 / 15.0;
        assert!((duck.duck_volume.unwrap() - expected).abs() < 1e-6);

        f.arbiter.deactivate(ring).unwrap();
        assert_eq!(f.state(media), StreamState::Running);
        assert!(next(&media_events).is(
            InterruptType::End,
            InterruptForceType::Force,
            InterruptHint::Unduck
        ));
    }

    #[test]
    fn test_share_outcome_only_hints() {
        let f = fixture();
        let (media, media_events) = f.stream(VolumeType::Media);
        let (ring, _) = f.stream(VolumeType::Ringtone);

        f.arbiter.activate(media).unwrap();
        f.arbiter.activate(ring).unwrap();

        assert_eq!(f.state(media), StreamState::Running);
        assert!(next(&media_events).is(
            InterruptType::Begin,
            InterruptForceType::Share,
            InterruptHint::Duck
        ));
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let f = fixture();
        let (media, media_events) = f.stream(VolumeType::Media);

        assert!(!f.arbiter.deactivate(media).unwrap());
        f.arbiter.activate(media).unwrap();
        assert!(f.arbiter.deactivate(media).unwrap());
        assert!(!f.arbiter.deactivate(media).unwrap());
        assert!(media_events.try_recv().is_none());
    }

    #[test]
    fn test_unknown_stream_changes_nothing() {
        let f = fixture();
        let (media, _) = f.stream(VolumeType::Media);
        f.arbiter.activate(media).unwrap();
        let before = f.registry.snapshot();

        let ghost = InterruptRequest::new(StreamId(999), VolumeType::Media);
        assert!(matches!(
            f.arbiter.deactivate(ghost),
            Err(FocusError::UnknownStream(_))
        ));
        assert!(matches!(
            f.arbiter.activate(ghost),
            Err(FocusError::UnknownStream(_))
        ));
        assert_eq!(f.registry.snapshot(), before);
    }

    #[test]
    fn test_volume_type_mismatch_is_parameter_error() {
        let f = fixture();
        let (media, _) = f.stream(VolumeType::Media);
        let wrong = InterruptRequest::new(media.stream, VolumeType::Ringtone);

        assert!(matches!(
            f.arbiter.activate(wrong),
            Err(FocusError::ParameterValue(_))
        ));
        assert_eq!(f.state(media), StreamState::Inactive);
    }

    #[test]
    fn test_reactivation_reports_current_standing() {
        let f = fixture();
        let (media, media_events) = f.stream(VolumeType::Media);
        let (call, _) = f.stream(VolumeType::VoiceCall);

        f.arbiter.activate(media).unwrap();
        assert!(f.arbiter.activate(media).unwrap().is_granted());

        f.arbiter.activate(call).unwrap();
        let _ = next(&media_events);
        let record = f.arbiter.activate(media).unwrap();
        assert_eq!(record.action_type, ActionType::Interrupted);
        assert!(media_events.try_recv().is_none());
    }

    #[test]
    fn test_stop_releases_stopped_streams_suppression() {
        let f = fixture();
        f.context.set_scene(AudioScene::Ringing);
        let (media, media_events) = f.stream(VolumeType::Media);
        let (ring, ring_events) = f.stream(VolumeType::Ringtone);
        let (call, _) = f.stream(VolumeType::VoiceCall);

        f.arbiter.activate(media).unwrap();
        f.arbiter.activate(ring).unwrap();
        let _ = next(&media_events);

        // The call stops the ringtone and pauses media on top of the duck
        f.arbiter.activate(call).unwrap();
        assert_eq!(f.state(ring), StreamState::Inactive);
        assert_eq!(f.state(media), StreamState::Paused);
        assert!(next(&ring_events).is(
            InterruptType::Begin,
            InterruptForceType::Force,
            InterruptHint::Stop
        ));
        assert!(next(&media_events).is(
            InterruptType::Begin,
            InterruptForceType::Force,
            InterruptHint::Pause
        ));

        f.arbiter.deactivate(call).unwrap();
        assert_eq!(f.state(media), StreamState::Running);
        assert!(next(&media_events).is(
            InterruptType::End,
            InterruptForceType::Force,
            InterruptHint::Resume
        ));
        assert!(media_events.try_recv().is_none());
    }

    #[test]
    fn test_held_call_stays_paused_while_another_call_runs() {
        let f = fixture();
        let (first, _) = f.stream(VolumeType::VoiceCall);
        let (second, _) = f.stream(VolumeType::VoiceCall);
        let (third, _) = f.stream(VolumeType::VoiceCall);

        f.arbiter.activate(first).unwrap();
        f.arbiter.activate(second).unwrap();
        f.arbiter.activate(third).unwrap();
        assert_eq!(f.state(first), StreamState::Paused);
        assert_eq!(f.state(second), StreamState::Paused);

        f.arbiter.deactivate(second).unwrap();
        assert_eq!(f.state(first), StreamState::Paused);
        assert_eq!(f.state(third), StreamState::Running);

        f.arbiter.deactivate(third).unwrap();
        assert_eq!(f.state(first), StreamState::Running);
    }

    #[test]
    fn test_pause_when_ducked() {
        let f = fixture();
        let (media, media_events) =
            f.stream_with(descriptor(VolumeType::Media).with_pause_when_ducked(true));
        let (assistant, _) = f.stream(VolumeType::VoiceAssistant);

        f.arbiter.activate(media).unwrap();
        f.arbiter.activate(assistant).unwrap();

        assert_eq!(f.state(media), StreamState::Paused);
        assert!(next(&media_events).is(
            InterruptType::Begin,
            InterruptForceType::Force,
            InterruptHint::Pause
        ));
    }

    #[test]
    fn test_incoming_duck_starts_ducked() {
        let f = fixture();
        let (call, call_events) = f.stream(VolumeType::VoiceCall);
        let (ring, ring_events) = f.stream(VolumeType::Ringtone);

        f.arbiter.activate(call).unwrap();
        let record = f.arbiter.activate(ring).unwrap();

        assert!(record.is_granted());
        assert_eq!(record.hint, InterruptHint::Duck);
        assert_eq!(f.state(ring), StreamState::Ducked);
        assert_eq!(f.state(call), StreamState::Running);
        assert!(ring_events.try_recv().is_none());
        assert!(call_events.try_recv().is_none());

        f.arbiter.deactivate(call).unwrap();
        assert_eq!(f.state(ring), StreamState::Running);
        assert!(next(&ring_events).is(
            InterruptType::End,
            InterruptForceType::Force,
            InterruptHint::Unduck
        ));
    }

    #[test]
    fn test_same_owner_share_streams_are_not_arbitrated() {
        let f = fixture();
        let owned = |t| descriptor(t).with_owner(300, InterruptMode::Share);
        let (media, media_events) = f.stream_with(owned(VolumeType::Media));
        let (call, _) = f.stream_with(owned(VolumeType::VoiceCall));

        f.arbiter.activate(media).unwrap();
        f.arbiter.activate(call).unwrap();

        assert_eq!(f.state(media), StreamState::Running);
        assert_eq!(f.state(call), StreamState::Running);
        assert!(media_events.try_recv().is_none());
    }

    #[test]
    fn test_unregister_runs_wake_up_sweep() {
        let f = fixture();
        let (media, media_events) = f.stream(VolumeType::Media);
        let (call, _) = f.stream(VolumeType::VoiceCall);

        f.arbiter.activate(media).unwrap();
        f.arbiter.activate(call).unwrap();
        let _ = next(&media_events);

        f.arbiter.unregister(call.stream).unwrap();
        assert!(!f.registry.contains(call.stream));
        assert!(!f.dispatcher.has_interrupt_subscribers(call.stream));
        assert_eq!(f.state(media), StreamState::Running);
        assert_eq!(next(&media_events).hint_type, InterruptHint::Resume);
    }

    #[test]
    fn test_auto_scene_raises_and_lowers() {
        let f = fixture_with(PolicyTable::built_in(), true);
        let (ring, _) = f.stream(VolumeType::Ringtone);
        let (media, _) = f.stream(VolumeType::Media);

        f.arbiter.activate(media).unwrap();
        assert_eq!(f.context.scene(), AudioScene::Default);

        f.arbiter.activate(ring).unwrap();
        assert_eq!(f.context.scene(), AudioScene::Ringing);

        f.arbiter.deactivate(ring).unwrap();
        assert_eq!(f.context.scene(), AudioScene::Default);
    }

    #[test]
    fn test_scene_change_does_not_rearbitrate() {
        let f = fixture();
        let (media, media_events) = f.stream(VolumeType::Media);
        let (ring, _) = f.stream(VolumeType::Ringtone);

        f.arbiter.activate(media).unwrap();
        f.arbiter.activate(ring).unwrap();
        let _ = next(&media_events);

        f.context.set_scene(AudioScene::Ringing);
        assert_eq!(f.state(media), StreamState::Running);
        assert!(media_events.try_recv().is_none());
    }

    #[test]
    fn test_custom_policy_stop_on_active() {
        let rules = vec![PolicyRule::any_scene(
            VolumeType::Media,
            VolumeType::Media,
            Outcome::on_active(Treatment::Stop, InterruptForceType::Force),
        )];
        let f = fixture_with(PolicyTable::with_fallback(&rules, Outcome::ALLOW_SHARE), false);
        let (first, first_events) = f.stream(VolumeType::Media);
        let (second, _) = f.stream(VolumeType::Media);

        f.arbiter.activate(first).unwrap();
        f.arbiter.activate(second).unwrap();

        assert_eq!(f.state(first), StreamState::Inactive);
        assert_eq!(next(&first_events).hint_type, InterruptHint::Stop);
        assert!(!f.arbiter.deactivate(first).unwrap());
    }

    #[test]
    fn test_woken_media_ducked_by_ringtone_that_arrived_while_paused() {
        let f = fixture();
        let (media, media_events) = f.stream(VolumeType::Media);
        let (call, _) = f.stream(VolumeType::VoiceCall);
        let (ring, _) = f.stream(VolumeType::Ringtone);

        f.arbiter.activate(media).unwrap();
        f.arbiter.activate(call).unwrap();
        assert!(f.arbiter.activate(ring).unwrap().is_granted());
        assert_eq!(next(&media_events).hint_type, InterruptHint::Pause);

        f.arbiter.deactivate(call).unwrap();
        assert_eq!(f.state(media), StreamState::Ducked);
        assert_eq!(f.state(ring), StreamState::Running);
        assert!(next(&media_events).is(
            InterruptType::End,
            InterruptForceType::Force,
            InterruptHint::Resume
        ));
        let duck = next(&media_events);
        assert!(duck.is(
            InterruptType::Begin,
            InterruptForceType::Force,
            InterruptHint::Duck
        ));
        assert!(duck.duck_volume.is_some());

        f.arbiter.deactivate(ring).unwrap();
        assert_eq!(f.state(media), StreamState::Running);
        assert_eq!(next(&media_events).hint_type, InterruptHint::Unduck);
        assert!(media_events.try_recv().is_none());
    }

    #[test]
    fn test_woken_stream_stopped_by_stream_that_arrived_while_paused() {
        use InterruptForceType::Force;

        let rules = vec![
            PolicyRule::any_scene(
                VolumeType::VoiceCall,
                VolumeType::Media,
                Outcome::on_active(Treatment::Pause, Force),
            ),
            PolicyRule::any_scene(
                VolumeType::Media,
                VolumeType::VoiceAssistant,
                Outcome::on_incoming(Treatment::Stop, Force),
            ),
        ];
        let f = fixture_with(PolicyTable::with_fallback(&rules, Outcome::ALLOW_SHARE), false);
        let (media, media_events) = f.stream(VolumeType::Media);
        let (call, _) = f.stream(VolumeType::VoiceCall);
        let (assistant, _) = f.stream(VolumeType::VoiceAssistant);

        f.arbiter.activate(media).unwrap();
        f.arbiter.activate(call).unwrap();
        f.arbiter.activate(assistant).unwrap();
        assert_eq!(next(&media_events).hint_type, InterruptHint::Pause);

        f.arbiter.deactivate(call).unwrap();
        assert_eq!(f.state(media), StreamState::Inactive);
        assert_eq!(f.state(assistant), StreamState::Running);
        assert!(next(&media_events).is(
            InterruptType::Begin,
            InterruptForceType::Force,
            InterruptHint::Stop
        ));
        assert!(media_events.try_recv().is_none());
    }

    #[test]
    fn test_with_registered_refuses_unregistered_stream() {
        let f = fixture();
        let (media, _) = f.stream(VolumeType::Media);

        assert_eq!(f.arbiter.with_registered(media.stream, || 5).unwrap(), 5);
        f.arbiter.unregister(media.stream).unwrap();

        let mut ran = false;
        let result = f.arbiter.with_registered(media.stream, || ran = true);
        assert!(matches!(result, Err(FocusError::UnknownStream(_))));
        assert!(!ran);
    }
}
