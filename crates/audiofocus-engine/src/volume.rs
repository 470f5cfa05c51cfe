//! Per-volume-type levels and mute state.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, instrument};

use audiofocus_ipc::{VolumeEvent, VolumeType};

use crate::config::VolumeConfig;
use crate::dispatcher::NotificationDispatcher;
use crate::error::{FocusError, FocusResult};

#[derive(Debug, Clone, Copy)]
struct Level {
    volume: i32,
    muted: bool,
}

/// Volume levels for every volume type.
///
/// Every change is published as a [`VolumeEvent`].
pub struct VolumeManager {
    min: i32,
    max: i32,
    levels: RwLock<BTreeMap<VolumeType, Level>>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl VolumeManager {
    /// Create a manager with levels taken from `config`.
    pub fn new(config: &VolumeConfig, dispatcher: Arc<NotificationDispatcher>) -> Self {
        let levels = VolumeType::ALL
            .iter()
            .map(|&t| {
                let volume = config.initial(t).clamp(config.min, config.max);
                (t, Level { volume, muted: false })
            })
            .collect();

        Self {
            min: config.min,
            max: config.max,
            levels: RwLock::new(levels),
            dispatcher,
        }
    }

    /// Lowest settable level.
    pub fn min_volume(&self) -> i32 {
        self.min
    }

    /// Highest settable level.
    pub fn max_volume(&self) -> i32 {
        self.max
    }

    /// Current level; a muted type reports its unmuted level.
    pub fn volume(&self, volume_type: VolumeType) -> i32 {
        self.level(volume_type).volume
    }

    /// Returns true if the volume type is muted.
    pub fn is_muted(&self, volume_type: VolumeType) -> bool {
        self.level(volume_type).muted
    }

    /// Audible level in `[0, 1]`, zero when muted.
    pub fn normalized(&self, volume_type: VolumeType) -> f32 {
        let level = self.level(volume_type);
        if level.muted {
            return 0.0;
        }
        (level.volume - self.min) as f32 / (self.max - self.min) as f32
    }

    /// Set a level. Values outside `[min, max]` are rejected.
    #[instrument(name = "set_volume", skip(self))]
    pub fn set_volume(&self, volume_type: VolumeType, volume: i32) -> FocusResult<()> {
        if volume < self.min || volume > self.max {
            return Err(FocusError::ParameterValue(format!(
                "volume {} outside [{}, {}]",
                volume, self.min, self.max
            )));
        }
        self.update(volume_type, false, |level| level.volume = volume);
        Ok(())
    }

    /// Step a level by one, clamped, as a hardware key would.
    pub fn step_volume(&self, volume_type: VolumeType, up: bool) -> i32 {
        let (min, max) = (self.min, self.max);
        self.update(volume_type, true, |level| {
            let next = if up { level.volume + 1 } else { level.volume - 1 };
            level.volume = next.clamp(min, max);
        })
    }

    /// Mute or unmute a volume type.
    pub fn set_mute(&self, volume_type: VolumeType, muted: bool) {
        self.update(volume_type, false, |level| level.muted = muted);
    }

    fn level(&self, volume_type: VolumeType) -> Level {
        self.levels
            .read()
            .get(&volume_type)
            .copied()
            .unwrap_or(Level {
                volume: self.min,
                muted: false,
            })
    }

    /// Apply `change`, publishing when the audible level moved. Returns the new level.
    fn update(
        &self,
        volume_type: VolumeType,
        update_ui: bool,
        change: impl FnOnce(&mut Level),
    ) -> i32 {
        let (before, after) = {
            let mut levels = self.levels.write();
            let level = levels.entry(volume_type).or_insert(Level {
                volume: self.min,
                muted: false,
            });
            let before = *level;
            change(level);
            (before, *level)
        };

        if before.volume != after.volume || before.muted != after.muted {
            let volume = if after.muted { 0 } else { after.volume };
            debug!(?volume_type, volume, muted = after.muted, "Volume changed");
            self.dispatcher.publish_volume(VolumeEvent {
                volume_type,
                volume,
                update_ui,
            });
        }

        after.volume
    }
}
