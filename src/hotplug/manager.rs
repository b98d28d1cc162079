//! Hotplug device lifecycle.
//!
//! Per device path: *unseen → detected → {slot-bound | ignored} → removed*.
//! The handlers run with the system state lock held, mutate the repository
//! synchronously where the lifecycle requires it (slot creation) and queue
//! changes for everything else. They never execute tasks.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::hotplug::changes::{connect_device, remove_device, update_device};
use crate::hotplug::{
    clean_path, ensure_unique_name, resolve_device_key, suggested_slot_name, Change, DeviceInfo,
    HotplugSpec,
};
use crate::snap::SlotInfo;
use crate::state::{HotplugSlotDef, SystemState};

/// Lifecycle phase of a tracked device path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DevicePhase {
    /// At least one descriptor proposed a slot; processing in progress.
    Detected,
    /// A slot exists for at least one `(key, interface)` of the device.
    SlotBound,
    /// No slot exists for the device.
    Ignored,
}

/// A `(device key, interface)` pair observed for a device path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceBinding {
    /// Device key.
    pub device_key: String,
    /// Interface name.
    pub interface: String,
}

/// What the manager remembers about one device path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedDevice {
    /// Current phase.
    pub phase: DevicePhase,
    /// Pairs recorded for the path, in detection order.
    pub bindings: Vec<DeviceBinding>,
}

/// Device bookkeeping: device path associations and, until enumeration
/// completes, the device keys seen per interface.
#[derive(Debug)]
pub struct HotplugManager {
    devices: HashMap<String, TrackedDevice>,
    enumerated: Option<HashMap<String, HashSet<String>>>,
}

impl Default for HotplugManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HotplugManager {
    /// Fresh manager in enumeration mode.
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
            enumerated: Some(HashMap::new()),
        }
    }

    /// Tracking entry of a device path.
    pub fn device(&self, devpath: &str) -> Option<&TrackedDevice> {
        self.devices.get(&clean_path(devpath))
    }

    /// Phase of a device path; `None` for unseen or removed devices.
    pub fn phase(&self, devpath: &str) -> Option<DevicePhase> {
        self.device(devpath).map(|d| d.phase)
    }

    /// Number of tracked device paths.
    pub fn tracked_devices(&self) -> usize {
        self.devices.len()
    }

    /// Whether boot-time enumeration is still in progress.
    pub fn is_enumerating(&self) -> bool {
        self.enumerated.is_some()
    }

    /// Whether `(key, interface)` was observed during the current enumeration.
    pub fn was_enumerated(&self, device_key: &str, interface: &str) -> bool {
        self.enumerated
            .as_ref()
            .and_then(|m| m.get(interface))
            .is_some_and(|keys| keys.contains(device_key))
    }

    fn record(&mut self, devpath: &str, device_key: &str, interface: &str) {
        if let Some(enumerated) = self.enumerated.as_mut() {
            enumerated
                .entry(interface.to_owned())
                .or_default()
                .insert(device_key.to_owned());
        }
        let binding = DeviceBinding {
            device_key: device_key.to_owned(),
            interface: interface.to_owned(),
        };
        let tracked = self
            .devices
            .entry(devpath.to_owned())
            .or_insert_with(|| TrackedDevice {
                phase: DevicePhase::Detected,
                bindings: Vec::new(),
            });
        if !tracked.bindings.contains(&binding) {
            tracked.bindings.push(binding);
        }
    }
}

// ---------------------------------------------------------------------------
// Event handlers
// ---------------------------------------------------------------------------

impl SystemState {
    /// Handle a device-added event. Returns the ids of the queued changes.
    pub fn hotplug_device_added(&mut self, device: &DeviceInfo) -> Vec<String> {
        let devpath = clean_path(&device.devpath);
        let mut emitted = Vec::new();

        for iface in self.repo.all_hotplug_interfaces() {
            let iface_name = iface.name().to_owned();

            let key = match resolve_device_key(device, &iface) {
                Ok(key) => key,
                Err(e) => {
                    warn!(device = %devpath, interface = %iface_name, error = %e, "device key resolution failed");
                    continue;
                }
            };

            let mut spec = HotplugSpec::new();
            if let Err(e) = iface.hotplug_device_detected(device, &mut spec) {
                warn!(device = %devpath, interface = %iface_name, error = %e, "device detection handler failed");
                continue;
            }
            let Some(mut proposal) = spec.into_slot() else {
                continue;
            };
            if key.is_empty() {
                debug!(device = %devpath, interface = %iface_name, "no usable device key, device ignored");
                continue;
            }
            if proposal.label.is_empty() {
                proposal.label = iface.summary().to_owned();
            }

            self.hotplug.record(&devpath, &key, &iface_name);

            if !self.hotplug_enabled {
                info!(device = %devpath, interface = %iface_name, "hotplug disabled, add event ignored");
                continue;
            }

            debug!(
                device = %devpath,
                interface = %iface_name,
                device_key = %key,
                devname = %device.devname,
                subsystem = %device.subsystem,
                "hotplug device added"
            );

            if let Some(existing) = self.repo.slot_for_device_key(&key, &iface_name) {
                if existing.attrs == proposal.attrs {
                    debug!(slot = %existing.name, device_key = %key, "slot already present and unchanged");
                } else {
                    debug!(slot = %existing.name, device_key = %key, "slot attributes changed");
                    let change = Change::new(
                        format!("hotplug-update-{iface_name}"),
                        format!("Update hotplug slot of interface {iface_name}, device {key}"),
                        update_device(&key, &iface_name, proposal.attrs),
                    );
                    emitted.push(self.queue_change(change));
                }
                continue;
            }

            let name = self.allocate_slot_name(device, &key, &iface_name, &proposal.name);
            let slot = SlotInfo {
                app: self.core_app.clone(),
                name: name.clone(),
                interface: iface_name.clone(),
                label: proposal.label,
                attrs: proposal.attrs,
                hotplug_key: key.clone(),
            };
            let static_attrs = slot.attrs.clone();
            if let Err(e) = self.repo.add_slot(slot) {
                warn!(slot = %name, interface = %iface_name, error = %e, "cannot create hotplug slot");
                continue;
            }
            self.hotplug_slots.insert(
                name.clone(),
                HotplugSlotDef {
                    name: name.clone(),
                    interface: iface_name.clone(),
                    static_attrs,
                    device_key: key.clone(),
                    hotplug_gone: false,
                },
            );
            info!(
                slot = %format!("{}:{name}", self.core_app),
                interface = %iface_name,
                device_key = %key,
                "added hotplug slot"
            );

            let change = Change::new(
                format!("hotplug-connect-{iface_name}"),
                format!("Connect hotplug slot of interface {iface_name}"),
                connect_device(&key, &iface_name),
            );
            emitted.push(self.queue_change(change));
        }

        self.settle_phase(&devpath);
        emitted
    }

    /// Handle a device-removed event. Returns the ids of the queued changes.
    pub fn hotplug_device_removed(&mut self, device: &DeviceInfo) -> Vec<String> {
        let devpath = clean_path(&device.devpath);
        let Some(tracked) = self.hotplug.devices.remove(&devpath) else {
            debug!(device = %devpath, "removal of untracked device");
            return Vec::new();
        };

        let mut emitted = Vec::new();
        for binding in tracked.bindings {
            if !self
                .repo
                .has_hotplug_slot(&binding.device_key, &binding.interface)
            {
                continue;
            }
            if !self.hotplug_enabled {
                info!(device = %devpath, interface = %binding.interface, "hotplug disabled, remove event ignored");
                continue;
            }
            debug!(
                device = %devpath,
                interface = %binding.interface,
                device_key = %binding.device_key,
                "hotplug device removed"
            );
            emitted.push(self.queue_removal(&binding.device_key, &binding.interface));
        }
        emitted
    }

    /// Handle the end of boot-time enumeration: every recorded hotplug slot
    /// not observed during enumeration is removed. Only the first call has
    /// an effect.
    pub fn hotplug_enumeration_done(&mut self) -> Vec<String> {
        let Some(enumerated) = self.hotplug.enumerated.take() else {
            debug!("enumeration already completed");
            return Vec::new();
        };
        if !self.hotplug_enabled {
            info!("hotplug disabled, enumeration reconciliation skipped");
            return Vec::new();
        }

        let missing: Vec<(String, String)> = self
            .hotplug_slots
            .values()
            .filter(|def| !def.hotplug_gone)
            .filter(|def| {
                !enumerated
                    .get(&def.interface)
                    .is_some_and(|keys| keys.contains(&def.device_key))
            })
            .map(|def| (def.device_key.clone(), def.interface.clone()))
            .collect();

        missing
            .into_iter()
            .map(|(key, iface)| {
                info!(device_key = %key, interface = %iface, "device absent after enumeration");
                self.queue_removal(&key, &iface)
            })
            .collect()
    }

    fn queue_removal(&mut self, device_key: &str, interface: &str) -> String {
        let change = Change::new(
            format!("hotplug-remove-{interface}"),
            format!("Remove hotplug connections and slots of interface {interface}"),
            remove_device(device_key, interface),
        );
        self.queue_change(change)
    }

    /// Name for a new slot: the name recorded for this device, else the
    /// handler's proposal, else one derived from the device, made unique.
    fn allocate_slot_name(
        &self,
        device: &DeviceInfo,
        device_key: &str,
        interface: &str,
        proposed: &str,
    ) -> String {
        let recorded = self
            .hotplug_slots
            .values()
            .find(|def| def.device_key == device_key && def.interface == interface)
            .map(|def| def.name.clone());
        let candidate = match recorded {
            Some(name) => name,
            None if !proposed.is_empty() => proposed.to_owned(),
            None => suggested_slot_name(device, interface),
        };
        ensure_unique_name(&candidate, |name| match self.hotplug_slots.get(name) {
            Some(def) => def.device_key == device_key && def.interface == interface,
            None => self.repo.slot(&self.core_app, name).is_none(),
        })
    }

    fn settle_phase(&mut self, devpath: &str) {
        let bound = self.hotplug.devices.get(devpath).is_some_and(|tracked| {
            tracked
                .bindings
                .iter()
                .any(|b| self.repo.has_hotplug_slot(&b.device_key, &b.interface))
        });
        let phase = if bound {
            DevicePhase::SlotBound
        } else {
            DevicePhase::Ignored
        };
        self.hotplug
            .devices
            .entry(devpath.to_owned())
            .or_insert_with(|| TrackedDevice {
                phase,
                bindings: Vec::new(),
            })
            .phase = phase;
    }
}
