//! Engine configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use audiofocus_ipc::{VolumeType, COMMAND_CHANNEL_CAPACITY, EVENT_CHANNEL_CAPACITY};
use audiofocus_policy::{PolicyConfig, PolicyError, PolicyTable};

/// Duck volume multiplier applied when no other factor is configured.
pub const DEFAULT_DUCK_FACTOR: f32 = 0.2;

/// Errors raised while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the file.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Policy section produced no usable table.
    #[error("Invalid policy: {0}")]
    Policy(#[from] PolicyError),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Volume range and initial levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Lowest settable level.
    pub min: i32,

    /// Highest settable level.
    pub max: i32,

    /// Initial level per volume type. Missing types start mid-range.
    pub defaults: BTreeMap<VolumeType, i32>,
}

impl VolumeConfig {
    /// Initial level for a volume type.
    pub fn initial(&self, volume_type: VolumeType) -> i32 {
        self.defaults
            .get(&volume_type)
            .copied()
            .unwrap_or(self.min + (self.max - self.min) / 2)
    }
}

impl Default for VolumeConfig {
    fn default() -> Self {
        let defaults = BTreeMap::from([
            (VolumeType::Ringtone, 7),
            (VolumeType::Media, 5),
            (VolumeType::VoiceCall, 7),
            (VolumeType::VoiceAssistant, 5),
        ]);

        Self {
            min: 0,
            max: 15,
            defaults,
        }
    }
}

/// Focus engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fraction of the normalized volume a ducked stream plays at.
    pub duck_factor: f32,

    /// Derive the audio scene from the active streams.
    pub auto_scene: bool,

    /// Volume collaborator setup.
    pub volume: VolumeConfig,

    /// Policy overrides.
    pub policy: PolicyConfig,

    /// Capacity of the command channel.
    pub command_queue_capacity: usize,

    /// Capacity of the event channel.
    pub event_queue_capacity: usize,

    /// Emit metrics this often while idle on the command channel.
    pub metrics_interval_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duck_factor: DEFAULT_DUCK_FACTOR,
            auto_scene: false,
            volume: VolumeConfig::default(),
            policy: PolicyConfig::default(),
            command_queue_capacity: COMMAND_CHANNEL_CAPACITY,
            event_queue_capacity: EVENT_CHANNEL_CAPACITY,
            metrics_interval_ms: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check every value and build the policy table once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.duck_factor > 0.0 && self.duck_factor <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "duck_factor must be in (0, 1], got {}",
                self.duck_factor
            )));
        }

        let volume = &self.volume;
        if volume.min < 0 || volume.min >= volume.max {
            return Err(ConfigError::Invalid(format!(
                "volume range [{}, {}] is empty or negative",
                volume.min, volume.max
            )));
        }
        for (volume_type, level) in &volume.defaults {
            if *level < volume.min || *level > volume.max {
                return Err(ConfigError::Invalid(format!(
                    "default volume {} for {:?} outside [{}, {}]",
                    level, volume_type, volume.min, volume.max
                )));
            }
        }

        if self.command_queue_capacity == 0 || self.event_queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue capacities must be non-zero".into()));
        }
        if self.metrics_interval_ms == Some(0) {
            return Err(ConfigError::Invalid("metrics_interval_ms must be non-zero".into()));
        }

        self.policy_table()?;
        Ok(())
    }

    /// Build the policy table this configuration describes.
    pub fn policy_table(&self) -> Result<PolicyTable, ConfigError> {
        Ok(self.policy.build()?)
    }
}
