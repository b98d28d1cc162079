//! Physical device descriptions delivered by the OS event source.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::attrs::Attributes;
use crate::interfaces::HookError;

/// Attributes of one physical device, as reported by udev.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Sysfs path, the identity used to track add/remove pairs.
    pub devpath: String,
    /// Device node (e.g. `/dev/bus/usb/001/004`), may be empty.
    #[serde(default)]
    pub devname: String,
    /// Kernel subsystem (e.g. `usb`, `net`).
    #[serde(default)]
    pub subsystem: String,
    /// Remaining udev properties.
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

impl DeviceInfo {
    /// Describe a device by its sysfs path.
    pub fn new(devpath: impl Into<String>) -> Self {
        Self {
            devpath: devpath.into(),
            devname: String::new(),
            subsystem: String::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// Builder-style setter for the device node.
    pub fn with_devname(mut self, devname: impl Into<String>) -> Self {
        self.devname = devname.into();
        self
    }

    /// Builder-style setter for the subsystem.
    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    /// Builder-style setter for a udev property.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Look a udev property up.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Major device number (`MAJOR` property), empty if unknown.
    pub fn major(&self) -> &str {
        self.attribute("MAJOR").unwrap_or_default()
    }

    /// Minor device number (`MINOR` property), empty if unknown.
    pub fn minor(&self) -> &str {
        self.attribute("MINOR").unwrap_or_default()
    }
}

/// Lexically clean a device path: collapse repeated separators and `.`
/// components, resolve `..` against preceding components.
pub fn clean_path(path: &str) -> String {
    let mut out = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out.to_string_lossy().into_owned()
}

/// A device event as delivered by the OS event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum DeviceEvent {
    /// A device appeared.
    Add(DeviceInfo),
    /// A device disappeared.
    Remove(DeviceInfo),
    /// Boot-time enumeration finished.
    EnumerationDone,
}

// ---------------------------------------------------------------------------
// Slot proposals
// ---------------------------------------------------------------------------

/// What a detection handler proposes for a device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedSlotSpec {
    /// Preferred slot name; allocated automatically when empty.
    pub name: String,
    /// Slot label; the descriptor summary is used when empty.
    pub label: String,
    /// Static attributes of the proposed slot.
    pub attrs: Attributes,
}

/// Collects the slot proposal of one detection handler.
#[derive(Debug, Default)]
pub struct HotplugSpec {
    slot: Option<RequestedSlotSpec>,
}

impl HotplugSpec {
    /// Empty specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Propose a slot.
    ///
    /// # Errors
    ///
    /// Returns a [`HookError`] if a slot was already proposed.
    pub fn set_slot(&mut self, slot: RequestedSlotSpec) -> Result<(), HookError> {
        if self.slot.is_some() {
            return Err(HookError::new("slot specification already set"));
        }
        self.slot = Some(slot);
        Ok(())
    }

    /// The proposed slot, if any.
    pub fn slot(&self) -> Option<&RequestedSlotSpec> {
        self.slot.as_ref()
    }

    /// Consume the specification, returning the proposal.
    pub fn into_slot(self) -> Option<RequestedSlotSpec> {
        self.slot
    }
}
