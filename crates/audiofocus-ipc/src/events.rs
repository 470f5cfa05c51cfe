//! Events sent from the engine to clients.

use serde::{Deserialize, Serialize};

use crate::state::EngineState;
use crate::types::{
    ActionRecord, AudioScene, DeviceType, ErrorCode, FocusMetrics, InterruptEvent, StreamId,
    StreamSnapshot, VolumeEvent,
};

/// Events that the engine can send to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Engine state has changed.
    StateChanged {
        previous: EngineState,
        current: EngineState,
    },

    /// A stream was registered.
    Registered { request_id: u64, stream: StreamId },

    /// A stream was unregistered.
    Unregistered { request_id: u64, stream: StreamId },

    /// Result of an activation request.
    Action {
        request_id: u64,
        stream: StreamId,
        record: ActionRecord,
    },

    /// Result of a deactivation request.
    Deactivated {
        request_id: u64,
        stream: StreamId,
        /// `None` when the stream held no active interrupt.
        record: Option<ActionRecord>,
    },

    /// Interrupt notification for a subscribed stream.
    Interrupt {
        stream: StreamId,
        event: InterruptEvent,
    },

    /// Volume notification.
    VolumeChanged(VolumeEvent),

    /// Audio scene has changed.
    SceneChanged {
        previous: AudioScene,
        current: AudioScene,
    },

    /// Device activation acknowledged.
    DeviceActiveChanged {
        request_id: u64,
        device_type: DeviceType,
        active: bool,
    },

    /// Volume change acknowledged.
    VolumeSet { request_id: u64 },

    /// Active streams.
    FocusSnapshot {
        request_id: u64,
        streams: Vec<StreamSnapshot>,
    },

    /// Current metrics.
    Metrics(FocusMetrics),

    /// A command failed.
    Error {
        /// Correlation id of the failed command, if any.
        request_id: Option<u64>,

        /// Caller-facing error category.
        code: ErrorCode,

        /// Error message.
        message: String,
    },

    /// Engine is ready.
    Ready,

    /// Engine has shut down.
    Shutdown,
}
