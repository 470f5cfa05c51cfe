//! Stream and engine state machine types.

use serde::{Deserialize, Serialize};

use crate::types::{InterruptHint, InterruptType};

/// Interrupt state of a registered stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// No active interrupt.
    #[default]
    Inactive,

    /// Active and playing un-suppressed.
    Running,

    /// Active, playing at reduced volume.
    Ducked,

    /// Active, suppressed until resumed.
    Paused,
}

impl StreamState {
    /// Returns true if the stream holds an active interrupt.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Inactive)
    }

    /// Returns true if the stream is producing sound (running or ducked).
    pub fn is_audible(self) -> bool {
        matches!(self, Self::Running | Self::Ducked)
    }

    /// Returns a simple string representation of the state.
    pub fn name(self) -> &'static str {
        match self {
            Self::Inactive => "Inactive",
            Self::Running => "Running",
            Self::Ducked => "Ducked",
            Self::Paused => "Paused",
        }
    }

    /// Forced interrupt notifications describing a move from `self` to `next`,
    /// in delivery order.
    pub fn transition_hints(self, next: StreamState) -> Vec<(InterruptType, InterruptHint)> {
        use InterruptHint as H;
        use InterruptType as T;

        match (self, next) {
            (Self::Running, Self::Ducked) => vec![(T::Begin, H::Duck)],
            (Self::Running, Self::Paused) | (Self::Ducked, Self::Paused) => {
                vec![(T::Begin, H::Pause)]
            }
            (Self::Paused, Self::Running) => vec![(T::End, H::Resume)],
            (Self::Ducked, Self::Running) => vec![(T::End, H::Unduck)],
            (Self::Paused, Self::Ducked) => vec![(T::End, H::Resume), (T::Begin, H::Duck)],
            (from, Self::Inactive) if from.is_active() => vec![(T::Begin, H::Stop)],
            _ => Vec::new(),
        }
    }
}

/// Lifecycle of the focus engine loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// Engine created, loop not yet running.
    #[default]
    Idle,

    /// Engine is serving commands.
    Serving,

    /// Engine is shutting down.
    ShuttingDown,
}

impl EngineState {
    /// Returns true if the engine is serving commands.
    pub fn is_serving(self) -> bool {
        matches!(self, Self::Serving)
    }

    /// Returns a simple string representation of the state.
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Serving => "Serving",
            Self::ShuttingDown => "ShuttingDown",
        }
    }
}
