//! The system state guarded by the coarse lock.
//!
//! [`SystemState`] bundles the repository, the persisted hotplug slot and
//! connection tables, the hotplug manager's bookkeeping and the queue of
//! changes waiting for the execution engine. Every operation on it is
//! synchronous; callers hold the lock for its duration.

pub mod db;
mod slots;

use std::collections::BTreeMap;

use tracing::{debug, warn};

pub use db::StateDb;
pub use slots::{ConnState, HotplugSlotDef};

use crate::attrs::Attributes;
use crate::context::Context;
use crate::hotplug::{Change, HotplugManager};
use crate::repo::{RepoError, Repository};
use crate::snap::{ConnRef, PlugRef, SlotInfo, SlotRef};

/// Persistable part of the system state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Hotplug slot table by slot name.
    pub hotplug_slots: BTreeMap<String, HotplugSlotDef>,
    /// Connection-state table by connection id.
    pub conns: BTreeMap<String, ConnState>,
}

/// Everything the coarse lock protects.
#[derive(Debug)]
pub struct SystemState {
    pub(crate) repo: Repository,
    pub(crate) core_app: String,
    pub(crate) hotplug_enabled: bool,
    pub(crate) hotplug_slots: BTreeMap<String, HotplugSlotDef>,
    pub(crate) conns: BTreeMap<String, ConnState>,
    pub(crate) hotplug: HotplugManager,
    pub(crate) changes: Vec<Change>,
}

impl SystemState {
    /// Fresh state over the context's descriptors. The hotplug manager
    /// starts in enumeration mode.
    pub fn new(ctx: &Context) -> Self {
        Self {
            repo: Repository::new(ctx.interfaces.clone()),
            core_app: ctx.core_app.clone(),
            hotplug_enabled: ctx.hotplug_enabled,
            hotplug_slots: BTreeMap::new(),
            conns: BTreeMap::new(),
            hotplug: HotplugManager::new(),
            changes: Vec::new(),
        }
    }

    /// The connection graph.
    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Mutable access to the connection graph, for declarations.
    pub fn repo_mut(&mut self) -> &mut Repository {
        &mut self.repo
    }

    /// Application owning hotplug slots.
    pub fn core_app(&self) -> &str {
        &self.core_app
    }

    /// The "hotplug enabled" feature flag.
    pub fn hotplug_enabled(&self) -> bool {
        self.hotplug_enabled
    }

    /// Flip the feature flag.
    pub fn set_hotplug_enabled(&mut self, enabled: bool) {
        self.hotplug_enabled = enabled;
    }

    /// Hotplug slot table.
    pub fn hotplug_slots(&self) -> &BTreeMap<String, HotplugSlotDef> {
        &self.hotplug_slots
    }

    /// Connection-state table.
    pub fn conns(&self) -> &BTreeMap<String, ConnState> {
        &self.conns
    }

    /// Device bookkeeping of the hotplug manager.
    pub fn hotplug_manager(&self) -> &HotplugManager {
        &self.hotplug
    }

    /// Changes waiting for the execution engine.
    pub fn pending_changes(&self) -> &[Change] {
        &self.changes
    }

    /// Hand every queued change over to the caller.
    pub fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }

    pub(crate) fn queue_change(&mut self, change: Change) -> String {
        let id = change.id.clone();
        self.changes.push(change);
        id
    }

    // -----------------------------------------------------------------------
    // Connections
    // -----------------------------------------------------------------------

    /// Connect without connect-time attributes.
    ///
    /// # Errors
    ///
    /// See [`Repository::connect`].
    pub fn connect(
        &mut self,
        plug: &PlugRef,
        slot: &SlotRef,
        auto: bool,
    ) -> Result<ConnRef, RepoError> {
        self.connect_with_attrs(plug, slot, auto, Attributes::new(), Attributes::new())
    }

    /// Connect and record the connection state.
    ///
    /// # Errors
    ///
    /// See [`Repository::connect`].
    pub fn connect_with_attrs(
        &mut self,
        plug: &PlugRef,
        slot: &SlotRef,
        auto: bool,
        plug_attrs: Attributes,
        slot_attrs: Attributes,
    ) -> Result<ConnRef, RepoError> {
        let conn = self
            .repo
            .connect(plug, slot, plug_attrs.clone(), slot_attrs.clone())?;
        let reference = conn.reference();
        self.conns.insert(
            reference.id(),
            ConnState {
                interface: conn.slot.info.interface.clone(),
                hotplug_key: conn.slot.info.hotplug_key.clone(),
                hotplug_gone: false,
                auto,
                plug_dynamic_attrs: plug_attrs,
                slot_dynamic_attrs: slot_attrs,
            },
        );
        debug!(conn = %reference, auto, "connected");
        Ok(reference)
    }

    /// Disconnect and forget the connection state.
    ///
    /// # Errors
    ///
    /// See [`Repository::disconnect`].
    pub fn disconnect(&mut self, conn: &ConnRef) -> Result<(), RepoError> {
        self.repo.disconnect(conn)?;
        self.conns.remove(&conn.id());
        debug!(conn = %conn, "disconnected");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Copy of the persistable tables.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            hotplug_slots: self.hotplug_slots.clone(),
            conns: self.conns.clone(),
        }
    }

    /// Rebuild hotplug slots and connections from persisted tables.
    ///
    /// Declared plugs and slots must already be in the repository. Entries
    /// that cannot be restored are logged and kept in the tables.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.hotplug_slots = snapshot.hotplug_slots;
        self.conns = snapshot.conns;

        let live: Vec<HotplugSlotDef> = self
            .hotplug_slots
            .values()
            .filter(|def| !def.hotplug_gone)
            .cloned()
            .collect();
        for def in live {
            let label = self
                .repo
                .interface(&def.interface)
                .map(|i| i.summary().to_owned())
                .unwrap_or_default();
            let slot = SlotInfo {
                app: self.core_app.clone(),
                name: def.name.clone(),
                interface: def.interface.clone(),
                label,
                attrs: def.static_attrs.clone(),
                hotplug_key: def.device_key.clone(),
            };
            if let Err(e) = self.repo.add_slot(slot) {
                warn!(slot = %def.name, interface = %def.interface, error = %e, "cannot restore hotplug slot");
            }
        }

        let pending: Vec<(String, ConnState)> = self
            .conns
            .iter()
            .filter(|(_, st)| !st.hotplug_gone)
            .map(|(id, st)| (id.clone(), st.clone()))
            .collect();
        for (id, st) in pending {
            let Some(conn) = ConnRef::parse(&id) else {
                warn!(conn = %id, "malformed connection id");
                continue;
            };
            if let Err(e) = self.repo.connect(
                &conn.plug,
                &conn.slot,
                st.plug_dynamic_attrs,
                st.slot_dynamic_attrs,
            ) {
                warn!(conn = %id, error = %e, "cannot restore connection");
            }
        }
    }
}
