//! Capability descriptors (interfaces) and the registry that holds them.
//!
//! An [`Interface`] is stateless and shared read-only by every plug and slot
//! that names it. It carries an optional closure per hook; an absent hook is
//! a no-op (or the documented default), and [`Interface::implements`] makes
//! "does this descriptor handle X" an explicit predicate.

pub mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::hotplug::{DeviceInfo, HotplugSpec};
use crate::snap::{ConnectedPlug, ConnectedSlot, PlugInfo, SlotInfo};

/// Placeholder replaced with the slot side's confinement label.
pub const SLOT_SECURITY_TAGS: &str = "###SLOT_SECURITY_TAGS###";
/// Placeholder replaced with the plug side's confinement label.
pub const PLUG_SECURITY_TAGS: &str = "###PLUG_SECURITY_TAGS###";

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// An enforcement backend, compiled independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Mandatory-access-control profiles.
    AppArmor,
    /// Syscall filters.
    Seccomp,
    /// Bus-access policy.
    DBus,
    /// Device tagging rules.
    Udev,
}

impl Backend {
    /// Every backend, in compilation order.
    pub const ALL: [Backend; 4] = [Self::AppArmor, Self::Seccomp, Self::DBus, Self::Udev];

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppArmor => "apparmor",
            Self::Seccomp => "seccomp",
            Self::DBus => "dbus",
            Self::Udev => "udev",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apparmor" => Ok(Self::AppArmor),
            "seccomp" => Ok(Self::Seccomp),
            "dbus" => Ok(Self::DBus),
            "udev" => Ok(Self::Udev),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Failure reported by a descriptor hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    /// Build an error from any displayable message.
    pub fn new(msg: impl fmt::Display) -> Self {
        Self(msg.to_string())
    }
}

impl From<crate::attrs::AttrError> for HookError {
    fn from(e: crate::attrs::AttrError) -> Self {
        Self(e.to_string())
    }
}

/// Result type shared by hooks that may contribute a snippet.
pub type SnippetResult = Result<Option<String>, HookError>;

type PermanentPlugFn = dyn Fn(Backend, &PlugInfo) -> SnippetResult + Send + Sync;
type PermanentSlotFn = dyn Fn(Backend, &SlotInfo) -> SnippetResult + Send + Sync;
type ConnectedFn = dyn Fn(Backend, &ConnectedPlug, &ConnectedSlot) -> SnippetResult + Send + Sync;
type SanitizePlugFn = dyn Fn(&PlugInfo) -> Result<(), HookError> + Send + Sync;
type SanitizeSlotFn = dyn Fn(&SlotInfo) -> Result<(), HookError> + Send + Sync;
type AutoConnectFn = dyn Fn(&PlugInfo, &SlotInfo) -> bool + Send + Sync;
type DeviceKeyFn = dyn Fn(&DeviceInfo) -> Result<String, HookError> + Send + Sync;
type DeviceDetectedFn = dyn Fn(&DeviceInfo, &mut HotplugSpec) -> Result<(), HookError> + Send + Sync;

/// Names of the optional hooks a descriptor may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Policy from a plug's static attributes.
    PermanentPlug,
    /// Policy from a slot's static attributes.
    PermanentSlot,
    /// Policy for the plug side of a connection.
    ConnectedPlug,
    /// Policy for the slot side of a connection.
    ConnectedSlot,
    /// Plug declaration validation.
    SanitizePlug,
    /// Slot declaration validation.
    SanitizeSlot,
    /// Auto-connection decision.
    AutoConnect,
    /// Device key override.
    HotplugDeviceKey,
    /// Device detection.
    HotplugDeviceDetected,
}

#[derive(Default)]
struct Hooks {
    permanent_plug: Option<Box<PermanentPlugFn>>,
    permanent_slot: Option<Box<PermanentSlotFn>>,
    connected_plug: Option<Box<ConnectedFn>>,
    connected_slot: Option<Box<ConnectedFn>>,
    sanitize_plug: Option<Box<SanitizePlugFn>>,
    sanitize_slot: Option<Box<SanitizeSlotFn>>,
    auto_connect: Option<Box<AutoConnectFn>>,
    device_key: Option<Box<DeviceKeyFn>>,
    device_detected: Option<Box<DeviceDetectedFn>>,
}

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// A capability descriptor.
pub struct Interface {
    name: String,
    summary: String,
    hooks: Hooks,
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let implemented: Vec<Hook> = ALL_HOOKS
            .iter()
            .copied()
            .filter(|h| self.implements(*h))
            .collect();
        f.debug_struct("Interface")
            .field("name", &self.name)
            .field("hooks", &implemented)
            .finish()
    }
}

const ALL_HOOKS: [Hook; 9] = [
    Hook::PermanentPlug,
    Hook::PermanentSlot,
    Hook::ConnectedPlug,
    Hook::ConnectedSlot,
    Hook::SanitizePlug,
    Hook::SanitizeSlot,
    Hook::AutoConnect,
    Hook::HotplugDeviceKey,
    Hook::HotplugDeviceDetected,
];

impl Interface {
    /// Start building a descriptor with the given unique name.
    pub fn builder(name: impl Into<String>) -> InterfaceBuilder {
        InterfaceBuilder {
            iface: Interface {
                name: name.into(),
                summary: String::new(),
                hooks: Hooks::default(),
            },
        }
    }

    /// Unique descriptor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// One-line description, used as the default hotplug slot label.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Whether the descriptor provides the given hook.
    pub fn implements(&self, hook: Hook) -> bool {
        let h = &self.hooks;
        match hook {
            Hook::PermanentPlug => h.permanent_plug.is_some(),
            Hook::PermanentSlot => h.permanent_slot.is_some(),
            Hook::ConnectedPlug => h.connected_plug.is_some(),
            Hook::ConnectedSlot => h.connected_slot.is_some(),
            Hook::SanitizePlug => h.sanitize_plug.is_some(),
            Hook::SanitizeSlot => h.sanitize_slot.is_some(),
            Hook::AutoConnect => h.auto_connect.is_some(),
            Hook::HotplugDeviceKey => h.device_key.is_some(),
            Hook::HotplugDeviceDetected => h.device_detected.is_some(),
        }
    }

    /// Whether the descriptor reacts to hotplugged devices.
    pub fn is_hotplug(&self) -> bool {
        self.implements(Hook::HotplugDeviceDetected)
    }

    /// Snippet contributed by a plug independent of any connection.
    ///
    /// # Errors
    ///
    /// Propagates the hook's [`HookError`].
    pub fn permanent_plug_snippet(&self, backend: Backend, plug: &PlugInfo) -> SnippetResult {
        match &self.hooks.permanent_plug {
            Some(hook) => hook(backend, plug),
            None => Ok(None),
        }
    }

    /// Snippet contributed by a slot independent of any connection.
    ///
    /// # Errors
    ///
    /// Propagates the hook's [`HookError`].
    pub fn permanent_slot_snippet(&self, backend: Backend, slot: &SlotInfo) -> SnippetResult {
        match &self.hooks.permanent_slot {
            Some(hook) => hook(backend, slot),
            None => Ok(None),
        }
    }

    /// Snippet for the plug side of a connection.
    ///
    /// # Errors
    ///
    /// Propagates the hook's [`HookError`].
    pub fn connected_plug_snippet(
        &self,
        backend: Backend,
        plug: &ConnectedPlug,
        slot: &ConnectedSlot,
    ) -> SnippetResult {
        match &self.hooks.connected_plug {
            Some(hook) => hook(backend, plug, slot),
            None => Ok(None),
        }
    }

    /// Snippet for the slot side of a connection.
    ///
    /// # Errors
    ///
    /// Propagates the hook's [`HookError`].
    pub fn connected_slot_snippet(
        &self,
        backend: Backend,
        plug: &ConnectedPlug,
        slot: &ConnectedSlot,
    ) -> SnippetResult {
        match &self.hooks.connected_slot {
            Some(hook) => hook(backend, plug, slot),
            None => Ok(None),
        }
    }

    /// Validate a plug declaration.
    ///
    /// # Errors
    ///
    /// Returns the sanitizer's rejection.
    pub fn sanitize_plug(&self, plug: &PlugInfo) -> Result<(), HookError> {
        match &self.hooks.sanitize_plug {
            Some(hook) => hook(plug),
            None => Ok(()),
        }
    }

    /// Validate a slot declaration.
    ///
    /// # Errors
    ///
    /// Returns the sanitizer's rejection.
    pub fn sanitize_slot(&self, slot: &SlotInfo) -> Result<(), HookError> {
        match &self.hooks.sanitize_slot {
            Some(hook) => hook(slot),
            None => Ok(()),
        }
    }

    /// Whether `plug` should be connected to `slot` without user action.
    /// Defaults to `false`.
    pub fn auto_connect(&self, plug: &PlugInfo, slot: &SlotInfo) -> bool {
        match &self.hooks.auto_connect {
            Some(hook) => hook(plug, slot),
            None => false,
        }
    }

    /// Device key override. An empty key defers to the default derivation.
    ///
    /// # Errors
    ///
    /// Propagates the hook's [`HookError`].
    pub fn hotplug_device_key(&self, device: &DeviceInfo) -> Result<String, HookError> {
        match &self.hooks.device_key {
            Some(hook) => hook(device),
            None => Ok(String::new()),
        }
    }

    /// Let the descriptor propose a slot for a detected device.
    ///
    /// # Errors
    ///
    /// Propagates the hook's [`HookError`].
    pub fn hotplug_device_detected(
        &self,
        device: &DeviceInfo,
        spec: &mut HotplugSpec,
    ) -> Result<(), HookError> {
        match &self.hooks.device_detected {
            Some(hook) => hook(device, spec),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Builder for [`Interface`]; every hook is optional.
pub struct InterfaceBuilder {
    iface: Interface,
}

impl InterfaceBuilder {
    /// One-line description.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.iface.summary = summary.into();
        self
    }

    /// Set the permanent-plug hook.
    pub fn permanent_plug(
        mut self,
        hook: impl Fn(Backend, &PlugInfo) -> SnippetResult + Send + Sync + 'static,
    ) -> Self {
        self.iface.hooks.permanent_plug = Some(Box::new(hook));
        self
    }

    /// Set the permanent-slot hook.
    pub fn permanent_slot(
        mut self,
        hook: impl Fn(Backend, &SlotInfo) -> SnippetResult + Send + Sync + 'static,
    ) -> Self {
        self.iface.hooks.permanent_slot = Some(Box::new(hook));
        self
    }

    /// Set the connected-plug hook.
    pub fn connected_plug(
        mut self,
        hook: impl Fn(Backend, &ConnectedPlug, &ConnectedSlot) -> SnippetResult + Send + Sync + 'static,
    ) -> Self {
        self.iface.hooks.connected_plug = Some(Box::new(hook));
        self
    }

    /// Set the connected-slot hook.
    pub fn connected_slot(
        mut self,
        hook: impl Fn(Backend, &ConnectedPlug, &ConnectedSlot) -> SnippetResult + Send + Sync + 'static,
    ) -> Self {
        self.iface.hooks.connected_slot = Some(Box::new(hook));
        self
    }

    /// Set the plug sanitizer.
    pub fn sanitize_plug(
        mut self,
        hook: impl Fn(&PlugInfo) -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Self {
        self.iface.hooks.sanitize_plug = Some(Box::new(hook));
        self
    }

    /// Set the slot sanitizer.
    pub fn sanitize_slot(
        mut self,
        hook: impl Fn(&SlotInfo) -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Self {
        self.iface.hooks.sanitize_slot = Some(Box::new(hook));
        self
    }

    /// Set the auto-connect predicate.
    pub fn auto_connect(
        mut self,
        hook: impl Fn(&PlugInfo, &SlotInfo) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.iface.hooks.auto_connect = Some(Box::new(hook));
        self
    }

    /// Set the device key override.
    pub fn hotplug_device_key(
        mut self,
        hook: impl Fn(&DeviceInfo) -> Result<String, HookError> + Send + Sync + 'static,
    ) -> Self {
        self.iface.hooks.device_key = Some(Box::new(hook));
        self
    }

    /// Set the device detection handler.
    pub fn hotplug_device_detected(
        mut self,
        hook: impl Fn(&DeviceInfo, &mut HotplugSpec) -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Self {
        self.iface.hooks.device_detected = Some(Box::new(hook));
        self
    }

    /// Finish the descriptor.
    pub fn build(self) -> Interface {
        self.iface
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Errors from descriptor registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A descriptor with the same name is already registered.
    #[error("interface {0:?} is already registered")]
    Duplicate(String),
    /// The descriptor name is empty.
    #[error("interface name cannot be empty")]
    EmptyName,
}

/// Table of known descriptors, populated once at startup.
#[derive(Debug, Default)]
pub struct InterfaceRegistry {
    interfaces: Vec<Arc<Interface>>,
    by_name: HashMap<String, usize>,
}

impl InterfaceRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] for empty or duplicate names.
    pub fn register(&mut self, iface: Interface) -> Result<(), RegistryError> {
        if iface.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.by_name.contains_key(&iface.name) {
            return Err(RegistryError::Duplicate(iface.name));
        }
        self.by_name.insert(iface.name.clone(), self.interfaces.len());
        self.interfaces.push(Arc::new(iface));
        Ok(())
    }

    /// Look a descriptor up by name.
    pub fn get(&self, name: &str) -> Option<Arc<Interface>> {
        self.by_name
            .get(name)
            .and_then(|i| self.interfaces.get(*i))
            .cloned()
    }

    /// All descriptors in registration order.
    pub fn all(&self) -> &[Arc<Interface>] {
        &self.interfaces
    }

    /// Descriptors that implement device detection, in registration order.
    pub fn hotplug(&self) -> Vec<Arc<Interface>> {
        self.interfaces
            .iter()
            .filter(|i| i.is_hotplug())
            .cloned()
            .collect()
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    /// Whether no descriptor is registered.
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}
