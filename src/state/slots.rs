//! Persisted hotplug slot table and connection-state table.

use serde::{Deserialize, Serialize};

use crate::attrs::Attributes;

/// One entry of the hotplug slot table, keyed by slot name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotplugSlotDef {
    /// Slot name.
    pub name: String,
    /// Interface name.
    pub interface: String,
    /// Static attributes the slot was created or last updated with.
    #[serde(default)]
    pub static_attrs: Attributes,
    /// Device key.
    pub device_key: String,
    /// Set once the slot was removed for an unplugged device; the entry is
    /// kept so that re-plugging reuses the name.
    #[serde(default)]
    pub hotplug_gone: bool,
}

/// Recorded state of one connection, keyed by connection id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnState {
    /// Interface name.
    pub interface: String,
    /// Device key of the slot side, empty for declared slots.
    #[serde(default)]
    pub hotplug_key: String,
    /// Disconnected because its device went away; restored on re-plug.
    #[serde(default)]
    pub hotplug_gone: bool,
    /// Made by auto-connection rather than explicitly.
    #[serde(default)]
    pub auto: bool,
    /// Connect-time attributes of the plug side.
    #[serde(default)]
    pub plug_dynamic_attrs: Attributes,
    /// Connect-time attributes of the slot side.
    #[serde(default)]
    pub slot_dynamic_attrs: Attributes,
}
