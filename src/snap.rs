//! Plugs, slots and connections between them.
//!
//! A [`PlugInfo`] is the requesting end owned by a confined application, a
//! [`SlotInfo`] the providing end. Both reference a capability descriptor by
//! interface name. Connection endpoints ([`ConnectedPlug`], [`ConnectedSlot`])
//! pair the static declaration with the dynamic attributes assigned at
//! connect time.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::attrs::{AttrError, AttrValue, Attributes};

/// Plug and slot names: lowercase letters, digits and single dashes,
/// starting with a letter.
static NAME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z](?:-?[a-z0-9])*$").ok());

/// Whether `name` is a valid plug or slot identifier.
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(name))
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// Identifies a plug by owning application and plug name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlugRef {
    /// Owning application.
    pub app: String,
    /// Plug name, unique within the application.
    pub name: String,
}

impl PlugRef {
    /// Build a reference from application and plug name.
    pub fn new(app: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PlugRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.app, self.name)
    }
}

/// Identifies a slot by owning application and slot name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    /// Owning application.
    pub app: String,
    /// Slot name, unique within the application.
    pub name: String,
}

impl SlotRef {
    /// Build a reference from application and slot name.
    pub fn new(app: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.app, self.name)
    }
}

/// Identifies a connection (plug → slot).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnRef {
    /// Requesting side.
    pub plug: PlugRef,
    /// Providing side.
    pub slot: SlotRef,
}

impl ConnRef {
    /// Build a connection reference.
    pub fn new(plug: PlugRef, slot: SlotRef) -> Self {
        Self { plug, slot }
    }

    /// Stable textual id, `app:plug app:slot`.
    pub fn id(&self) -> String {
        format!("{} {}", self.plug, self.slot)
    }

    /// Parse an id produced by [`ConnRef::id`].
    pub fn parse(id: &str) -> Option<Self> {
        let (plug, slot) = id.split_once(' ')?;
        let (plug_app, plug_name) = plug.split_once(':')?;
        let (slot_app, slot_name) = slot.split_once(':')?;
        Some(Self::new(
            PlugRef::new(plug_app, plug_name),
            SlotRef::new(slot_app, slot_name),
        ))
    }
}

impl fmt::Display for ConnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// A plug declared by an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlugInfo {
    /// Owning application.
    pub app: String,
    /// Plug name.
    pub name: String,
    /// Interface (capability descriptor) name.
    pub interface: String,
    /// Static attributes from the declaration.
    #[serde(default)]
    pub attrs: Attributes,
}

impl PlugInfo {
    /// Declare a plug with no attributes.
    pub fn new(app: impl Into<String>, name: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            name: name.into(),
            interface: interface.into(),
            attrs: Attributes::new(),
        }
    }

    /// Reference to this plug.
    pub fn reference(&self) -> PlugRef {
        PlugRef::new(&self.app, &self.name)
    }
}

/// A slot declared by an application or created for a hotplugged device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    /// Owning application.
    pub app: String,
    /// Slot name.
    pub name: String,
    /// Interface (capability descriptor) name.
    pub interface: String,
    /// Human-readable label.
    #[serde(default)]
    pub label: String,
    /// Static attributes.
    #[serde(default)]
    pub attrs: Attributes,
    /// Device key; non-empty only for hotplug-created slots.
    #[serde(default)]
    pub hotplug_key: String,
}

impl SlotInfo {
    /// Declare a slot with no attributes.
    pub fn new(app: impl Into<String>, name: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            name: name.into(),
            interface: interface.into(),
            label: String::new(),
            attrs: Attributes::new(),
            hotplug_key: String::new(),
        }
    }

    /// Reference to this slot.
    pub fn reference(&self) -> SlotRef {
        SlotRef::new(&self.app, &self.name)
    }

    /// Whether the slot was created for a hotplugged device.
    pub fn is_hotplug(&self) -> bool {
        !self.hotplug_key.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Connection endpoints
// ---------------------------------------------------------------------------

/// The plug side of a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedPlug {
    /// Declaration.
    pub info: PlugInfo,
    /// Attributes assigned at connect time.
    pub dynamic_attrs: Attributes,
}

impl ConnectedPlug {
    /// Pair a plug with its connect-time attributes.
    pub fn new(info: PlugInfo, dynamic_attrs: Attributes) -> Self {
        Self {
            info,
            dynamic_attrs,
        }
    }

    /// Attribute lookup: dynamic attributes shadow static ones.
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.dynamic_attrs
            .get(name)
            .or_else(|| self.info.attrs.get(name))
    }

    /// String attribute lookup with the same shadowing rule as [`ConnectedPlug::attr`].
    ///
    /// # Errors
    ///
    /// Returns an [`AttrError`] if the attribute is missing or not a string.
    pub fn attr_str(&self, name: &str) -> Result<&str, AttrError> {
        if self.dynamic_attrs.contains(name) {
            return self.dynamic_attrs.get_str(name);
        }
        self.info.attrs.get_str(name)
    }
}

/// The slot side of a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedSlot {
    /// Declaration.
    pub info: SlotInfo,
    /// Attributes assigned at connect time.
    pub dynamic_attrs: Attributes,
}

impl ConnectedSlot {
    /// Pair a slot with its connect-time attributes.
    pub fn new(info: SlotInfo, dynamic_attrs: Attributes) -> Self {
        Self {
            info,
            dynamic_attrs,
        }
    }

    /// Attribute lookup: dynamic attributes shadow static ones.
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.dynamic_attrs
            .get(name)
            .or_else(|| self.info.attrs.get(name))
    }

    /// String attribute lookup with the same shadowing rule as [`ConnectedSlot::attr`].
    ///
    /// # Errors
    ///
    /// Returns an [`AttrError`] if the attribute is missing or not a string.
    pub fn attr_str(&self, name: &str) -> Result<&str, AttrError> {
        if self.dynamic_attrs.contains(name) {
            return self.dynamic_attrs.get_str(name);
        }
        self.info.attrs.get_str(name)
    }
}

/// A live plug → slot association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Plug endpoint.
    pub plug: ConnectedPlug,
    /// Slot endpoint.
    pub slot: ConnectedSlot,
}

impl Connection {
    /// Reference to this connection.
    pub fn reference(&self) -> ConnRef {
        ConnRef::new(self.plug.info.reference(), self.slot.info.reference())
    }

    /// Interface shared by both endpoints.
    pub fn interface(&self) -> &str {
        &self.plug.info.interface
    }
}
