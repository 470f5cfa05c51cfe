//! Commands sent from clients to the engine.

use serde::{Deserialize, Serialize};

use crate::types::{
    AudioScene, DeviceDescriptor, DeviceType, InterruptRequest, StreamDescriptor, StreamId,
    VolumeType,
};

/// Commands that a client can send to the engine.
///
/// Commands carrying a `request_id` are answered with an event carrying the
/// same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineCommand {
    /// Register a stream.
    Register {
        request_id: u64,
        descriptor: StreamDescriptor,
    },

    /// Release a stream and any interrupt it holds.
    Unregister { request_id: u64, stream: StreamId },

    /// Request audio focus for a stream.
    Activate {
        request_id: u64,
        request: InterruptRequest,
    },

    /// Release audio focus for a stream.
    Deactivate {
        request_id: u64,
        request: InterruptRequest,
    },

    /// Forward interrupt events for a stream onto the event channel.
    SubscribeInterrupt { stream: StreamId },

    /// Stop forwarding interrupt events for a stream.
    UnsubscribeInterrupt { stream: StreamId },

    /// Forward volume changes onto the event channel.
    SubscribeVolume,

    /// Stop forwarding volume changes.
    UnsubscribeVolume,

    /// Change the audio scene.
    SetScene { scene: AudioScene },

    /// Connect a device.
    ConnectDevice { device: DeviceDescriptor },

    /// Disconnect a device.
    DisconnectDevice { device_type: DeviceType },

    /// Activate or deactivate a device.
    SetDeviceActive {
        request_id: u64,
        device_type: DeviceType,
        active: bool,
    },

    /// Set the volume of a category.
    SetVolume {
        request_id: u64,
        volume_type: VolumeType,
        volume: i32,
    },

    /// Request the list of active streams.
    GetFocusSnapshot { request_id: u64 },

    /// Request current metrics.
    GetMetrics,

    /// Shutdown the engine completely.
    Shutdown,
}

impl EngineCommand {
    /// Correlation id, if the command expects a direct answer.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Self::Register { request_id, .. }
            | Self::Unregister { request_id, .. }
            | Self::Activate { request_id, .. }
            | Self::Deactivate { request_id, .. }
            | Self::SetDeviceActive { request_id, .. }
            | Self::SetVolume { request_id, .. }
            | Self::GetFocusSnapshot { request_id } => Some(*request_id),
            _ => None,
        }
    }
}
