//! Built-in interrupt rules.

use serde::{Deserialize, Serialize};

use audiofocus_ipc::{AudioScene, InterruptForceType, VolumeType};

use crate::outcome::{Outcome, Treatment};

/// One row of the policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Volume type of the requesting stream.
    pub incoming: VolumeType,

    /// Volume type of the already active stream.
    pub active: VolumeType,

    /// Scene the rule is limited to; `None` matches every scene.
    #[serde(default)]
    pub scene: Option<AudioScene>,

    /// Resulting outcome.
    pub outcome: Outcome,
}

impl PolicyRule {
    /// Rule applying in every scene.
    pub const fn any_scene(incoming: VolumeType, active: VolumeType, outcome: Outcome) -> Self {
        Self {
            incoming,
            active,
            scene: None,
            outcome,
        }
    }

    /// Rule applying only in `scene`.
    pub const fn in_scene(
        incoming: VolumeType,
        active: VolumeType,
        scene: AudioScene,
        outcome: Outcome,
    ) -> Self {
        Self {
            incoming,
            active,
            scene: Some(scene),
            outcome,
        }
    }
}

/// The default rule set. Keys not listed resolve to the fallback.
pub fn built_in_rules() -> Vec<PolicyRule> {
    use AudioScene::Ringing;
    use InterruptForceType::{Force, Share};
    use Treatment::{Allow, Duck, Pause, Stop};
    use VolumeType::{Media, Ringtone, VoiceAssistant, VoiceCall};

    let active = Outcome::on_active;
    let incoming = Outcome::on_incoming;

    vec![
        // Calls take over everything; a second call holds the first
        PolicyRule::any_scene(VoiceCall, Media, active(Pause, Force)),
        PolicyRule::any_scene(VoiceCall, Ringtone, active(Stop, Force)),
        PolicyRule::any_scene(VoiceCall, VoiceAssistant, active(Stop, Force)),
        PolicyRule::any_scene(VoiceCall, VoiceCall, active(Pause, Force)),
        // Media
        PolicyRule::any_scene(Media, VoiceCall, incoming(Pause, Force)),
        PolicyRule::any_scene(Media, VoiceAssistant, incoming(Stop, Force)),
        PolicyRule::any_scene(Media, Ringtone, incoming(Duck, Force)),
        PolicyRule::in_scene(Media, Ringtone, Ringing, incoming(Pause, Force)),
        PolicyRule::any_scene(Media, Media, active(Allow, Share)),
        // Ringtones
        PolicyRule::any_scene(Ringtone, Media, active(Duck, Share)),
        PolicyRule::in_scene(Ringtone, Media, Ringing, active(Duck, Force)),
        PolicyRule::any_scene(Ringtone, VoiceCall, incoming(Duck, Force)),
        PolicyRule::any_scene(Ringtone, Ringtone, active(Stop, Force)),
        PolicyRule::any_scene(Ringtone, VoiceAssistant, active(Stop, Force)),
        // Voice assistant
        PolicyRule::any_scene(VoiceAssistant, Media, active(Duck, Force)),
        PolicyRule::any_scene(VoiceAssistant, VoiceCall, incoming(Stop, Force)),
        PolicyRule::any_scene(VoiceAssistant, Ringtone, incoming(Stop, Force)),
        PolicyRule::any_scene(VoiceAssistant, VoiceAssistant, active(Stop, Force)),
    ]
}
