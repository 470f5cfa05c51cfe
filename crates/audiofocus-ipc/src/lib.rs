//! Typed client<->engine messages for the audio focus service.
//!
//! This crate defines the stream attributes, interrupt events and command
//! types shared between the focus engine and its clients.

mod commands;
mod error;
mod events;
mod state;
mod types;

pub use commands::EngineCommand;
pub use error::ParseError;
pub use events::EngineEvent;
pub use state::{EngineState, StreamState};
pub use types::{
    ActionRecord, ActionType, AudioScene, ContentType, DeviceDescriptor, DeviceFlag, DeviceRole,
    DeviceType, ErrorCode, FocusMetrics, InterruptEvent, InterruptForceType, InterruptHint,
    InterruptMode, InterruptRequest, InterruptType, StreamDescriptor, StreamId, StreamSnapshot,
    StreamUsage, VolumeEvent, VolumeType,
};

use crossbeam_channel::{Receiver, Sender};

/// Default channel capacity for commands (client → engine).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Default channel capacity for events (engine → client).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<EngineCommand>, Receiver<EngineCommand>) {
    command_channel_with_capacity(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded command channel with an explicit capacity.
pub fn command_channel_with_capacity(
    capacity: usize,
) -> (Sender<EngineCommand>, Receiver<EngineCommand>) {
    crossbeam_channel::bounded(capacity)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<EngineEvent>, Receiver<EngineEvent>) {
    event_channel_with_capacity(EVENT_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel with an explicit capacity.
pub fn event_channel_with_capacity(
    capacity: usize,
) -> (Sender<EngineEvent>, Receiver<EngineEvent>) {
    crossbeam_channel::bounded(capacity)
}
