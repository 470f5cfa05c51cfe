//! Scene and device state consulted by the arbiter.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;
use tracing::{debug, info};

use audiofocus_ipc::{AudioScene, DeviceDescriptor, DeviceFlag, DeviceType};

use crate::error::{FocusError, FocusResult};

/// Current audio scene plus connected and active devices.
///
/// Read-mostly. Changing the scene does not re-run arbitration.
pub struct DeviceSceneContext {
    scene: RwLock<AudioScene>,
    devices: RwLock<BTreeMap<DeviceType, DeviceDescriptor>>,
    active: RwLock<BTreeSet<DeviceType>>,
}

impl DeviceSceneContext {
    /// Context with the built-in speaker and microphone connected and the speaker active.
    pub fn new() -> Self {
        let devices = BTreeMap::from([
            (
                DeviceType::Speaker,
                DeviceDescriptor::new(DeviceType::Speaker, "Speaker"),
            ),
            (
                DeviceType::Mic,
                DeviceDescriptor::new(DeviceType::Mic, "Microphone"),
            ),
        ]);

        Self {
            scene: RwLock::new(AudioScene::Default),
            devices: RwLock::new(devices),
            active: RwLock::new(BTreeSet::from([DeviceType::Speaker])),
        }
    }

    /// Current scene.
    pub fn scene(&self) -> AudioScene {
        *self.scene.read()
    }

    /// Set the scene, returning the previous one.
    pub fn set_scene(&self, scene: AudioScene) -> AudioScene {
        let previous = std::mem::replace(&mut *self.scene.write(), scene);
        if previous != scene {
            info!(?previous, current = ?scene, "Audio scene changed");
        }
        previous
    }

    /// Connect a device, replacing any device of the same type.
    pub fn connect_device(&self, device: DeviceDescriptor) {
        debug!(device_type = ?device.device_type, name = %device.name, "Device connected");
        self.devices.write().insert(device.device_type, device);
    }

    /// Disconnect a device. A disconnected device is no longer active.
    pub fn disconnect_device(&self, device_type: DeviceType) -> Option<DeviceDescriptor> {
        let removed = self.devices.write().remove(&device_type);
        if removed.is_some() {
            self.active.write().remove(&device_type);
            debug!(?device_type, "Device disconnected");
        }
        removed
    }

    /// Connected devices matching a role filter.
    pub fn get_devices(&self, flag: DeviceFlag) -> Vec<DeviceDescriptor> {
        self.devices
            .read()
            .values()
            .filter(|d| flag.matches(d.role))
            .cloned()
            .collect()
    }

    /// Route output to or away from a communication device.
    pub fn set_device_active(&self, device_type: DeviceType, active: bool) -> FocusResult<()> {
        if !device_type.is_activatable() {
            return Err(FocusError::ParameterValue(format!(
                "{:?} cannot be activated",
                device_type
            )));
        }

        if active && !self.devices.read().contains_key(&device_type) {
            return Err(FocusError::CallerState(format!(
                "{:?} is not connected",
                device_type
            )));
        }

        let mut set = self.active.write();
        let changed = if active {
            set.insert(device_type)
        } else {
            set.remove(&device_type)
        };

        if changed {
            info!(?device_type, active, "Device activation changed");
        }
        Ok(())
    }

    /// Returns true if the device is active.
    pub fn is_device_active(&self, device_type: DeviceType) -> bool {
        self.active.read().contains(&device_type)
    }
}

impl Default for DeviceSceneContext {
    fn default() -> Self {
        Self::new()
    }
}
