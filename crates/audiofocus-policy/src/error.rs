//! Error types for the policy module.

use thiserror::Error;

use audiofocus_ipc::{AudioScene, VolumeType};

/// Errors that can occur while building a policy table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// A reachable key resolved to no outcome and no fallback was declared.
    #[error("Policy gap: no outcome for {incoming:?} requesting against {active:?} in scene {scene:?}")]
    PolicyGap {
        incoming: VolumeType,
        active: VolumeType,
        scene: AudioScene,
    },

    /// Two rules in one rule set name the same key with different outcomes.
    #[error("Conflicting rules for {incoming:?} against {active:?} (scene {scene:?})")]
    ConflictingRules {
        incoming: VolumeType,
        active: VolumeType,
        scene: Option<AudioScene>,
    },
}
