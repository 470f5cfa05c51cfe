//! Common types used across IPC messages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::state::StreamState;

/// Declares a closed enum that mirrors a numeric constant set of the
/// binding surface. Raw codes are validated once through `TryFrom<i32>`.
macro_rules! raw_code_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $code:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Raw numeric code used on the binding surface.
            pub fn code(self) -> i32 {
                match self {
                    $($name::$variant => $code),+
                }
            }
        }

        impl TryFrom<i32> for $name {
            type Error = ParseError;

            fn try_from(code: i32) -> Result<Self, Self::Error> {
                match code {
                    $(c if c == $code => Ok($name::$variant),)+
                    other => Err(ParseError::UnknownCode {
                        kind: stringify!($name),
                        code: other,
                    }),
                }
            }
        }
    };
}

raw_code_enum! {
    /// What a stream is used for.
    pub enum StreamUsage {
        Unknown = 0,
        Media = 1,
        VoiceCommunication = 2,
        VoiceAssistant = 4,
        NotificationRingtone = 6,
    }
}

raw_code_enum! {
    /// What kind of content a stream carries.
    pub enum ContentType {
        Unknown = 0,
        Speech = 1,
        Music = 2,
        Movie = 3,
        Sonification = 4,
        Ringtone = 5,
    }
}

raw_code_enum! {
    /// Volume category. Arbitration is keyed on this.
    pub enum VolumeType {
        Ringtone = 2,
        Media = 3,
        VoiceCall = 4,
        VoiceAssistant = 5,
    }
}

raw_code_enum! {
    /// Ambient audio policy mode.
    pub enum AudioScene {
        Default = 0,
        Ringing = 1,
        PhoneCall = 2,
        VoiceChat = 3,
    }
}

raw_code_enum! {
    /// Whether an interrupt event starts or ends an interruption.
    pub enum InterruptType {
        Begin = 1,
        End = 2,
    }
}

raw_code_enum! {
    /// What the receiving stream should do, or what was done to it.
    pub enum InterruptHint {
        None = 0,
        Resume = 1,
        Pause = 2,
        Stop = 3,
        Duck = 4,
        Unduck = 5,
    }
}

raw_code_enum! {
    /// FORCE: the system already changed the stream's state.
    /// SHARE: the event is only a hint and the owner decides.
    pub enum InterruptForceType {
        Force = 0,
        Share = 1,
    }
}

raw_code_enum! {
    /// Synchronous result kind returned to the requesting stream.
    pub enum ActionType {
        Activated = 0,
        Interrupted = 1,
        Deactivated = 2,
    }
}

raw_code_enum! {
    /// How streams of the same owner interact.
    pub enum InterruptMode {
        /// Streams of the same owner share focus and never interrupt each other.
        Share = 0,
        /// Every stream is arbitrated on its own.
        Independent = 1,
    }
}

raw_code_enum! {
    /// Audio device kinds known to the device context.
    pub enum DeviceType {
        Speaker = 2,
        WiredHeadset = 3,
        BluetoothSco = 7,
        BluetoothA2dp = 8,
        Mic = 15,
        UsbHeadset = 22,
    }
}

raw_code_enum! {
    /// Direction of a device.
    pub enum DeviceRole {
        Input = 1,
        Output = 2,
    }
}

raw_code_enum! {
    /// Filter for device queries.
    pub enum DeviceFlag {
        Output = 1,
        Input = 2,
        All = 3,
    }
}

impl AudioScene {
    /// Relative priority used when deriving the scene from active streams.
    pub fn priority(self) -> u8 {
        match self {
            Self::Default => 0,
            Self::VoiceChat => 1,
            Self::Ringing => 2,
            Self::PhoneCall => 3,
        }
    }
}

impl Default for AudioScene {
    fn default() -> Self {
        Self::Default
    }
}

impl VolumeType {
    /// The scene an active stream of this type implies.
    pub fn implied_scene(self) -> AudioScene {
        match self {
            Self::Ringtone => AudioScene::Ringing,
            Self::VoiceCall => AudioScene::PhoneCall,
            Self::Media | Self::VoiceAssistant => AudioScene::Default,
        }
    }
}

impl Default for InterruptMode {
    fn default() -> Self {
        Self::Independent
    }
}

impl DeviceType {
    /// Whether the device can be explicitly activated for routing.
    pub fn is_activatable(self) -> bool {
        matches!(self, Self::Speaker | Self::BluetoothSco)
    }

    /// Natural role of this device type.
    pub fn role(self) -> DeviceRole {
        match self {
            Self::Mic => DeviceRole::Input,
            _ => DeviceRole::Output,
        }
    }
}

impl DeviceFlag {
    /// Returns true if a device with `role` passes this filter.
    pub fn matches(self, role: DeviceRole) -> bool {
        match self {
            Self::All => true,
            Self::Input => role == DeviceRole::Input,
            Self::Output => role == DeviceRole::Output,
        }
    }
}

/// Opaque stream handle, unique per registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Declared attributes of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Stream usage.
    pub usage: StreamUsage,

    /// Content type.
    pub content_type: ContentType,

    /// Volume category used for arbitration.
    pub volume_type: VolumeType,

    /// Owning process (0 when unknown).
    #[serde(default)]
    pub owner_pid: u32,

    /// Focus mode relative to streams of the same owner.
    #[serde(default)]
    pub mode: InterruptMode,

    /// Apply forced ducks as pauses for this stream.
    #[serde(default)]
    pub pause_when_ducked: bool,
}

impl StreamDescriptor {
    /// Create a descriptor with no owner in independent mode.
    pub fn new(usage: StreamUsage, content_type: ContentType, volume_type: VolumeType) -> Self {
        Self {
            usage,
            content_type,
            volume_type,
            owner_pid: 0,
            mode: InterruptMode::Independent,
            pause_when_ducked: false,
        }
    }

    /// Set the owning process and focus mode.
    pub fn with_owner(mut self, owner_pid: u32, mode: InterruptMode) -> Self {
        self.owner_pid = owner_pid;
        self.mode = mode;
        self
    }

    /// Request that forced ducks pause this stream instead.
    pub fn with_pause_when_ducked(mut self, pause_when_ducked: bool) -> Self {
        self.pause_when_ducked = pause_when_ducked;
        self
    }

    /// Volume type implied by a (content, usage) pair, if the pair is recognized.
    pub fn implied_volume_type(content_type: ContentType, usage: StreamUsage) -> Option<VolumeType> {
        use ContentType as C;
        use StreamUsage as U;

        match (content_type, usage) {
            (C::Unknown, U::Unknown)
            | (C::Unknown, U::Media)
            | (C::Music, U::Media)
            | (C::Movie, U::Media)
            | (C::Speech, U::Media) => Some(VolumeType::Media),

            (C::Speech, U::VoiceCommunication) | (C::Unknown, U::VoiceCommunication) => {
                Some(VolumeType::VoiceCall)
            }

            (C::Speech, U::VoiceAssistant)
            | (C::Music, U::VoiceAssistant)
            | (C::Unknown, U::VoiceAssistant) => Some(VolumeType::VoiceAssistant),

            (C::Music, U::NotificationRingtone)
            | (C::Sonification, U::NotificationRingtone)
            | (C::Ringtone, U::Unknown)
            | (C::Ringtone, U::Media)
            | (C::Ringtone, U::NotificationRingtone)
            | (C::Unknown, U::NotificationRingtone) => Some(VolumeType::Ringtone),

            _ => None,
        }
    }

    /// Returns true if this descriptor's attributes form a recognized combination.
    pub fn is_recognized(&self) -> bool {
        Self::implied_volume_type(self.content_type, self.usage) == Some(self.volume_type)
    }

    /// Returns true if both streams belong to the same owner in share mode.
    pub fn shares_focus_with(&self, other: &StreamDescriptor) -> bool {
        self.owner_pid != 0
            && self.owner_pid == other.owner_pid
            && self.mode == InterruptMode::Share
            && other.mode == InterruptMode::Share
    }
}

/// Registry view of one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSnapshot {
    /// Stream handle.
    pub id: StreamId,

    /// Declared attributes.
    pub descriptor: StreamDescriptor,

    /// Current interrupt state.
    pub state: StreamState,
}

/// An activation or deactivation request for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptRequest {
    /// Owning stream handle.
    pub stream: StreamId,

    /// Volume type the request is made for.
    pub volume_type: VolumeType,
}

impl InterruptRequest {
    /// Create a request.
    pub fn new(stream: StreamId, volume_type: VolumeType) -> Self {
        Self {
            stream,
            volume_type,
        }
    }
}

/// Asynchronous notification delivered to an affected stream's owner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterruptEvent {
    /// Begin or end of the interruption.
    pub event_type: InterruptType,

    /// Force or share.
    pub force_type: InterruptForceType,

    /// Hint.
    pub hint_type: InterruptHint,

    /// Target volume (0.0 - 1.0) for duck hints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duck_volume: Option<f32>,
}

impl InterruptEvent {
    /// Create a BEGIN event.
    pub fn begin(force_type: InterruptForceType, hint_type: InterruptHint) -> Self {
        Self {
            event_type: InterruptType::Begin,
            force_type,
            hint_type,
            duck_volume: None,
        }
    }

    /// Create an END event.
    pub fn end(force_type: InterruptForceType, hint_type: InterruptHint) -> Self {
        Self {
            event_type: InterruptType::End,
            force_type,
            hint_type,
            duck_volume: None,
        }
    }

    /// Attach a duck volume.
    pub fn with_duck_volume(mut self, volume: f32) -> Self {
        self.duck_volume = Some(volume.clamp(0.0, 1.0));
        self
    }

    /// Returns true if the event carries the given (type, force, hint) triple.
    pub fn is(
        &self,
        event_type: InterruptType,
        force_type: InterruptForceType,
        hint_type: InterruptHint,
    ) -> bool {
        self.event_type == event_type && self.force_type == force_type && self.hint_type == hint_type
    }
}

/// Synchronous result of an activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Result kind.
    pub action_type: ActionType,

    /// Why the request was interrupted, or `None`.
    pub hint: InterruptHint,
}

impl ActionRecord {
    /// The requester may play.
    pub fn activated() -> Self {
        Self {
            action_type: ActionType::Activated,
            hint: InterruptHint::None,
        }
    }

    /// The requester was denied.
    pub fn interrupted(hint: InterruptHint) -> Self {
        Self {
            action_type: ActionType::Interrupted,
            hint,
        }
    }

    /// The requester released its interrupt.
    pub fn deactivated() -> Self {
        Self {
            action_type: ActionType::Deactivated,
            hint: InterruptHint::None,
        }
    }

    /// Returns true if the request was granted.
    pub fn is_granted(&self) -> bool {
        self.action_type == ActionType::Activated
    }
}

/// Volume change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeEvent {
    /// Volume category that changed.
    pub volume_type: VolumeType,

    /// New volume level.
    pub volume: i32,

    /// Whether the UI should show a volume panel.
    pub update_ui: bool,
}

/// A connected audio device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Device kind.
    pub device_type: DeviceType,

    /// Input or output.
    pub role: DeviceRole,

    /// Display name.
    pub name: String,
}

impl DeviceDescriptor {
    /// Create a descriptor using the device type's natural role.
    pub fn new(device_type: DeviceType, name: impl Into<String>) -> Self {
        Self {
            device_type,
            role: device_type.role(),
            name: name.into(),
        }
    }
}

/// Arbitration and delivery counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusMetrics {
    /// Activations granted.
    pub activations_granted: u64,

    /// Activations denied.
    pub activations_denied: u64,

    /// Deactivations that released an active interrupt.
    pub deactivations: u64,

    /// Events handed to subscriber queues.
    pub events_published: u64,

    /// Events delivered to handlers.
    pub events_delivered: u64,

    /// Events dropped because no live subscription remained.
    pub events_dropped: u64,

    /// Streams currently holding an active interrupt.
    pub active_streams: usize,
}

/// Error taxonomy surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed or unsupported argument shape.
    ParameterTypeMismatch,

    /// Value outside the valid range for its type.
    ParameterValueError,

    /// Operation invalid in the caller's current state.
    CallerStateError,

    /// Descriptor rejected at registration.
    InvalidDescriptor,

    /// Request referenced an unregistered handle.
    UnknownStream,

    /// Internal defect.
    Internal,
}

impl ErrorCode {
    /// Numeric code reported on the binding surface.
    pub fn numeric(self) -> i32 {
        match self {
            Self::ParameterTypeMismatch => 401,
            Self::ParameterValueError | Self::InvalidDescriptor => 6_800_101,
            Self::CallerStateError | Self::UnknownStream => 6_800_103,
            Self::Internal => 6_800_301,
        }
    }
}
