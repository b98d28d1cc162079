//! In-memory connection graph.
//!
//! The [`Repository`] indexes declared plugs and slots, the live connections
//! between them and hotplug slots by `(device key, interface)`. It is the
//! only place that mutates this graph; callers serialize access through the
//! system state lock.

use std::collections::HashMap;
use std::sync::Arc;

use crate::attrs::Attributes;
use crate::interfaces::{HookError, Interface, InterfaceRegistry};
use crate::snap::{
    is_valid_name, ConnRef, ConnectedPlug, ConnectedSlot, Connection, PlugInfo, PlugRef, SlotInfo,
    SlotRef,
};

/// Errors from repository operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoError {
    /// The named interface is not registered.
    #[error("unknown interface {0:?}")]
    UnknownInterface(String),
    /// The plug or slot name is not a valid identifier.
    #[error("invalid name {0:?}")]
    InvalidName(String),
    /// The owning application name is not a valid identifier.
    #[error("invalid application name {0:?}")]
    InvalidAppName(String),
    /// The application already declares a plug with this name.
    #[error("plug {0} already exists")]
    PlugExists(PlugRef),
    /// The application already declares a slot with this name.
    #[error("slot {0} already exists")]
    SlotExists(SlotRef),
    /// No such plug.
    #[error("no plug {0}")]
    NoSuchPlug(PlugRef),
    /// No such slot.
    #[error("no slot {0}")]
    NoSuchSlot(SlotRef),
    /// Plug and slot use different interfaces.
    #[error("cannot connect {plug} ({plug_interface}) to {slot} ({slot_interface})")]
    InterfaceMismatch {
        /// Plug endpoint.
        plug: PlugRef,
        /// Plug interface.
        plug_interface: String,
        /// Slot endpoint.
        slot: SlotRef,
        /// Slot interface.
        slot_interface: String,
    },
    /// The pair is already connected.
    #[error("{0} is already connected")]
    AlreadyConnected(ConnRef),
    /// The pair is not connected.
    #[error("{0} is not connected")]
    NotConnected(ConnRef),
    /// The endpoint still has live connections.
    #[error("{0} is still connected")]
    StillConnected(String),
    /// The descriptor's sanitizer rejected the declaration.
    #[error("interface {interface:?} rejected declaration: {source}")]
    Sanitize {
        /// Rejecting interface.
        interface: String,
        /// Sanitizer message.
        source: HookError,
    },
    /// Another slot already holds this device key for the interface.
    #[error("device key {key:?} already bound to a slot of interface {interface:?}")]
    DeviceKeyTaken {
        /// Device key.
        key: String,
        /// Interface name.
        interface: String,
    },
}

#[derive(Debug, Clone)]
struct ConnEntry {
    conn: ConnRef,
    plug_attrs: Attributes,
    slot_attrs: Attributes,
}

/// Authoritative index of plugs, slots and connections.
#[derive(Debug)]
pub struct Repository {
    interfaces: Arc<InterfaceRegistry>,
    plugs: Vec<PlugInfo>,
    slots: Vec<SlotInfo>,
    conns: Vec<ConnEntry>,
    device_index: HashMap<(String, String), SlotRef>,
}

impl Repository {
    /// Empty repository over the given descriptor table.
    pub fn new(interfaces: Arc<InterfaceRegistry>) -> Self {
        Self {
            interfaces,
            plugs: Vec::new(),
            slots: Vec::new(),
            conns: Vec::new(),
            device_index: HashMap::new(),
        }
    }

    /// Descriptor table backing this repository.
    pub fn interfaces(&self) -> &Arc<InterfaceRegistry> {
        &self.interfaces
    }

    /// Look a descriptor up by name.
    pub fn interface(&self, name: &str) -> Option<Arc<Interface>> {
        self.interfaces.get(name)
    }

    /// Descriptors that implement device detection.
    pub fn all_hotplug_interfaces(&self) -> Vec<Arc<Interface>> {
        self.interfaces.hotplug()
    }

    fn require_interface(&self, name: &str) -> Result<Arc<Interface>, RepoError> {
        self.interfaces
            .get(name)
            .ok_or_else(|| RepoError::UnknownInterface(name.to_owned()))
    }

    // -----------------------------------------------------------------------
    // Plugs
    // -----------------------------------------------------------------------

    /// Declare a plug after validating it with the descriptor's sanitizer.
    ///
    /// # Errors
    ///
    /// Rejects invalid application or plug names, unknown interfaces, name
    /// collisions and sanitizer failures.
    pub fn add_plug(&mut self, plug: PlugInfo) -> Result<(), RepoError> {
        if !is_valid_name(&plug.app) {
            return Err(RepoError::InvalidAppName(plug.app));
        }
        if !is_valid_name(&plug.name) {
            return Err(RepoError::InvalidName(plug.name));
        }
        let iface = self.require_interface(&plug.interface)?;
        if self.plug(&plug.app, &plug.name).is_some() {
            return Err(RepoError::PlugExists(plug.reference()));
        }
        iface.sanitize_plug(&plug).map_err(|source| RepoError::Sanitize {
            interface: plug.interface.clone(),
            source,
        })?;
        self.plugs.push(plug);
        Ok(())
    }

    /// Remove a plug.
    ///
    /// # Errors
    ///
    /// Fails if the plug does not exist or is still connected.
    pub fn remove_plug(&mut self, plug: &PlugRef) -> Result<PlugInfo, RepoError> {
        let idx = self
            .plugs
            .iter()
            .position(|p| p.app == plug.app && p.name == plug.name)
            .ok_or_else(|| RepoError::NoSuchPlug(plug.clone()))?;
        if self.conns.iter().any(|c| &c.conn.plug == plug) {
            return Err(RepoError::StillConnected(plug.to_string()));
        }
        Ok(self.plugs.remove(idx))
    }

    /// Plug by owning application and name.
    pub fn plug(&self, app: &str, name: &str) -> Option<&PlugInfo> {
        self.plugs.iter().find(|p| p.app == app && p.name == name)
    }

    /// All plugs in declaration order.
    pub fn plugs(&self) -> &[PlugInfo] {
        &self.plugs
    }

    // -----------------------------------------------------------------------
    // Slots
    // -----------------------------------------------------------------------

    /// Declare a slot after validating it with the descriptor's sanitizer.
    /// A slot carrying a device key is indexed under `(key, interface)`.
    ///
    /// # Errors
    ///
    /// Rejects invalid application or slot names, unknown interfaces, name
    /// collisions, sanitizer failures and device keys already bound for the
    /// interface.
    pub fn add_slot(&mut self, slot: SlotInfo) -> Result<(), RepoError> {
        if !is_valid_name(&slot.app) {
            return Err(RepoError::InvalidAppName(slot.app));
        }
        if !is_valid_name(&slot.name) {
            return Err(RepoError::InvalidName(slot.name));
        }
        let iface = self.require_interface(&slot.interface)?;
        if self.slot(&slot.app, &slot.name).is_some() {
            return Err(RepoError::SlotExists(slot.reference()));
        }
        let index_key = (slot.hotplug_key.clone(), slot.interface.clone());
        if slot.is_hotplug() && self.device_index.contains_key(&index_key) {
            return Err(RepoError::DeviceKeyTaken {
                key: index_key.0,
                interface: index_key.1,
            });
        }
        iface.sanitize_slot(&slot).map_err(|source| RepoError::Sanitize {
            interface: slot.interface.clone(),
            source,
        })?;
        if slot.is_hotplug() {
            self.device_index.insert(index_key, slot.reference());
        }
        self.slots.push(slot);
        Ok(())
    }

    /// Remove a slot and its device-key index entry.
    ///
    /// # Errors
    ///
    /// Fails if the slot does not exist or is still connected.
    pub fn remove_slot(&mut self, slot: &SlotRef) -> Result<SlotInfo, RepoError> {
        let idx = self
            .slots
            .iter()
            .position(|s| s.app == slot.app && s.name == slot.name)
            .ok_or_else(|| RepoError::NoSuchSlot(slot.clone()))?;
        if self.conns.iter().any(|c| &c.conn.slot == slot) {
            return Err(RepoError::StillConnected(slot.to_string()));
        }
        let removed = self.slots.remove(idx);
        if removed.is_hotplug() {
            self.device_index
                .remove(&(removed.hotplug_key.clone(), removed.interface.clone()));
        }
        Ok(removed)
    }

    /// Slot by owning application and name.
    pub fn slot(&self, app: &str, name: &str) -> Option<&SlotInfo> {
        self.slots.iter().find(|s| s.app == app && s.name == name)
    }

    /// All slots in declaration order.
    pub fn slots(&self) -> &[SlotInfo] {
        &self.slots
    }

    /// Hotplug slot indexed under `(key, interface)`.
    pub fn slot_for_device_key(&self, key: &str, interface: &str) -> Option<&SlotInfo> {
        let slot = self
            .device_index
            .get(&(key.to_owned(), interface.to_owned()))?;
        self.slot(&slot.app, &slot.name)
    }

    /// Whether a slot is indexed under `(key, interface)`, connected or not.
    pub fn has_hotplug_slot(&self, key: &str, interface: &str) -> bool {
        self.device_index
            .contains_key(&(key.to_owned(), interface.to_owned()))
    }

    /// Replace a slot's static attributes.
    ///
    /// # Errors
    ///
    /// Fails if the slot does not exist.
    pub fn update_slot_attrs(&mut self, slot: &SlotRef, attrs: Attributes) -> Result<(), RepoError> {
        let info = self
            .slots
            .iter_mut()
            .find(|s| s.app == slot.app && s.name == slot.name)
            .ok_or_else(|| RepoError::NoSuchSlot(slot.clone()))?;
        info.attrs = attrs;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Connections
    // -----------------------------------------------------------------------

    /// Connect a plug to a slot with the given connect-time attributes.
    ///
    /// # Errors
    ///
    /// Fails on missing endpoints, mismatched interfaces and duplicate
    /// connections.
    pub fn connect(
        &mut self,
        plug: &PlugRef,
        slot: &SlotRef,
        plug_attrs: Attributes,
        slot_attrs: Attributes,
    ) -> Result<Connection, RepoError> {
        let plug_info = self
            .plug(&plug.app, &plug.name)
            .ok_or_else(|| RepoError::NoSuchPlug(plug.clone()))?;
        let slot_info = self
            .slot(&slot.app, &slot.name)
            .ok_or_else(|| RepoError::NoSuchSlot(slot.clone()))?;
        if plug_info.interface != slot_info.interface {
            return Err(RepoError::InterfaceMismatch {
                plug: plug.clone(),
                plug_interface: plug_info.interface.clone(),
                slot: slot.clone(),
                slot_interface: slot_info.interface.clone(),
            });
        }
        let conn = ConnRef::new(plug.clone(), slot.clone());
        if self.is_connected(&conn) {
            return Err(RepoError::AlreadyConnected(conn));
        }
        let connection = Connection {
            plug: ConnectedPlug::new(plug_info.clone(), plug_attrs.clone()),
            slot: ConnectedSlot::new(slot_info.clone(), slot_attrs.clone()),
        };
        self.conns.push(ConnEntry {
            conn,
            plug_attrs,
            slot_attrs,
        });
        Ok(connection)
    }

    /// Drop a connection.
    ///
    /// # Errors
    ///
    /// Fails if the pair is not connected.
    pub fn disconnect(&mut self, conn: &ConnRef) -> Result<(), RepoError> {
        let idx = self
            .conns
            .iter()
            .position(|c| &c.conn == conn)
            .ok_or_else(|| RepoError::NotConnected(conn.clone()))?;
        self.conns.remove(idx);
        Ok(())
    }

    /// Whether the pair is connected.
    pub fn is_connected(&self, conn: &ConnRef) -> bool {
        self.conns.iter().any(|c| &c.conn == conn)
    }

    fn materialize(&self, entry: &ConnEntry) -> Option<Connection> {
        let plug = self.plug(&entry.conn.plug.app, &entry.conn.plug.name)?;
        let slot = self.slot(&entry.conn.slot.app, &entry.conn.slot.name)?;
        Some(Connection {
            plug: ConnectedPlug::new(plug.clone(), entry.plug_attrs.clone()),
            slot: ConnectedSlot::new(slot.clone(), entry.slot_attrs.clone()),
        })
    }

    /// A live connection with its endpoints.
    pub fn connection(&self, conn: &ConnRef) -> Option<Connection> {
        self.conns
            .iter()
            .find(|c| &c.conn == conn)
            .and_then(|c| self.materialize(c))
    }

    /// All live connections in the order they were made.
    pub fn connections(&self) -> Vec<Connection> {
        self.conns
            .iter()
            .filter_map(|c| self.materialize(c))
            .collect()
    }

    /// References of the connections of one slot, in connection order.
    pub fn connections_for_slot(&self, slot: &SlotRef) -> Vec<ConnRef> {
        self.conns
            .iter()
            .filter(|c| &c.conn.slot == slot)
            .map(|c| c.conn.clone())
            .collect()
    }

    /// Plugs the descriptor would connect to `slot` automatically and that
    /// are not connected to it yet.
    pub fn auto_connect_candidate_plugs(&self, slot: &SlotRef) -> Vec<PlugInfo> {
        let Some(slot_info) = self.slot(&slot.app, &slot.name) else {
            return Vec::new();
        };
        let Some(iface) = self.interfaces.get(&slot_info.interface) else {
            return Vec::new();
        };
        self.plugs
            .iter()
            .filter(|p| p.interface == slot_info.interface)
            .filter(|p| !self.is_connected(&ConnRef::new(p.reference(), slot.clone())))
            .filter(|p| iface.auto_connect(p, slot_info))
            .cloned()
            .collect()
    }
}
