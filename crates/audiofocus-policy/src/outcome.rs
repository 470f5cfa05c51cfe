//! Arbitration outcome types.

use serde::{Deserialize, Serialize};

use audiofocus_ipc::{InterruptForceType, InterruptHint};

/// What happens to the stream an outcome acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Treatment {
    /// No interruption.
    Allow,

    /// Keep playing at reduced volume.
    Duck,

    /// Suppress until the interrupting stream leaves.
    Pause,

    /// End the stream's interrupt.
    Stop,
}

impl Treatment {
    /// Interrupt hint reported for this treatment.
    pub fn hint(self) -> InterruptHint {
        match self {
            Self::Allow => InterruptHint::None,
            Self::Duck => InterruptHint::Duck,
            Self::Pause => InterruptHint::Pause,
            Self::Stop => InterruptHint::Stop,
        }
    }

    /// Returns true if the treatment keeps the target from playing.
    pub fn is_suppressing(self) -> bool {
        matches!(self, Self::Pause | Self::Stop)
    }
}

/// Which side of the pair an outcome acts on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTarget {
    /// The stream that is already active.
    #[default]
    Active,

    /// The stream that is requesting focus.
    Incoming,
}

/// Result of one policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outcome {
    /// What happens to the target.
    pub treatment: Treatment,

    /// Force or share.
    pub force_type: InterruptForceType,

    /// Which stream the treatment acts on.
    #[serde(default)]
    pub target: ActionTarget,
}

impl Outcome {
    /// The documented fallback: both streams coexist.
    pub const ALLOW_SHARE: Outcome = Outcome {
        treatment: Treatment::Allow,
        force_type: InterruptForceType::Share,
        target: ActionTarget::Active,
    };

    /// Outcome acting on the active stream.
    pub const fn on_active(treatment: Treatment, force_type: InterruptForceType) -> Self {
        Self {
            treatment,
            force_type,
            target: ActionTarget::Active,
        }
    }

    /// Outcome acting on the incoming stream.
    pub const fn on_incoming(treatment: Treatment, force_type: InterruptForceType) -> Self {
        Self {
            treatment,
            force_type,
            target: ActionTarget::Incoming,
        }
    }

    /// Returns true if the incoming stream is denied by this outcome.
    pub fn rejects_incoming(&self) -> bool {
        self.target == ActionTarget::Incoming && self.treatment.is_suppressing()
    }

    /// Returns true if the outcome changes nothing.
    pub fn is_allow(&self) -> bool {
        self.treatment == Treatment::Allow
    }

    /// Returns true if the system applies the treatment itself.
    pub fn is_forced(&self) -> bool {
        self.force_type == InterruptForceType::Force
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_incoming_only_for_suppressing_incoming_treatments() {
        use InterruptForceType::{Force, Share};

        assert!(Outcome::on_incoming(Treatment::Pause, Force).rejects_incoming());
        assert!(Outcome::on_incoming(Treatment::Stop, Share).rejects_incoming());
        assert!(!Outcome::on_incoming(Treatment::Duck, Force).rejects_incoming());
        assert!(!Outcome::on_active(Treatment::Stop, Force).rejects_incoming());
        assert!(!Outcome::ALLOW_SHARE.rejects_incoming());
    }

    #[test]
    fn test_outcome_target_defaults_to_active() {
        let json = r#"{"treatment":"pause","force_type":"force"}"#;
        let outcome: Outcome = serde_json::from_str(json).unwrap();
        assert_eq!(outcome, Outcome::on_active(Treatment::Pause, InterruptForceType::Force));
    }
}
