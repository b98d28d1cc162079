//! The interface manager: shared system state behind one coarse lock.
//!
//! Device events, change execution and compilation all go through the lock.
//! Event handling and graph construction happen while it is held; change
//! execution re-acquires it once per task, and persistence snapshots under
//! the lock and writes after releasing it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::compiler::{self, CompileError, LabelResolver, Specification};
use crate::context::Context;
use crate::hotplug::{Change, DeviceEvent, DeviceInfo, Status};
use crate::interfaces::Backend;
use crate::repo::RepoError;
use crate::snap::{ConnRef, PlugInfo, PlugRef, SlotInfo, SlotRef};
use crate::state::{StateDb, SystemState};
use crate::tasks::{next_runnable, record_outcome, run_task, settle};

/// Owner of the shared [`SystemState`].
#[derive(Clone)]
pub struct InterfaceManager {
    state: Arc<Mutex<SystemState>>,
    labels: Arc<dyn LabelResolver>,
}

impl std::fmt::Debug for InterfaceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceManager").finish_non_exhaustive()
    }
}

impl InterfaceManager {
    /// Manager over a fresh state.
    pub fn new(ctx: &Context) -> Self {
        Self {
            state: Arc::new(Mutex::new(SystemState::new(ctx))),
            labels: ctx.labels.clone(),
        }
    }

    /// The shared state, for callers that need several operations under
    /// one lock acquisition.
    pub fn state(&self) -> &Arc<Mutex<SystemState>> {
        &self.state
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    /// Declare a plug.
    ///
    /// # Errors
    ///
    /// See [`crate::repo::Repository::add_plug`].
    pub async fn add_plug(&self, plug: PlugInfo) -> Result<(), RepoError> {
        self.state.lock().await.repo_mut().add_plug(plug)
    }

    /// Declare a slot.
    ///
    /// # Errors
    ///
    /// See [`crate::repo::Repository::add_slot`].
    pub async fn add_slot(&self, slot: SlotInfo) -> Result<(), RepoError> {
        self.state.lock().await.repo_mut().add_slot(slot)
    }

    /// Connect a plug to a slot explicitly.
    ///
    /// # Errors
    ///
    /// See [`crate::repo::Repository::connect`].
    pub async fn connect(&self, plug: &PlugRef, slot: &SlotRef) -> Result<ConnRef, RepoError> {
        self.state.lock().await.connect(plug, slot, false)
    }

    /// Disconnect a connection explicitly.
    ///
    /// # Errors
    ///
    /// See [`crate::repo::Repository::disconnect`].
    pub async fn disconnect(&self, conn: &ConnRef) -> Result<(), RepoError> {
        self.state.lock().await.disconnect(conn)
    }

    // -----------------------------------------------------------------------
    // Device events
    // -----------------------------------------------------------------------

    /// A device appeared. Returns the ids of the queued changes.
    pub async fn device_added(&self, device: &DeviceInfo) -> Vec<String> {
        self.state.lock().await.hotplug_device_added(device)
    }

    /// A device disappeared. Returns the ids of the queued changes.
    pub async fn device_removed(&self, device: &DeviceInfo) -> Vec<String> {
        self.state.lock().await.hotplug_device_removed(device)
    }

    /// Boot-time enumeration finished. Returns the ids of the queued changes.
    pub async fn enumeration_done(&self) -> Vec<String> {
        self.state.lock().await.hotplug_enumeration_done()
    }

    /// Dispatch one event from the OS event source.
    pub async fn handle_event(&self, event: &DeviceEvent) -> Vec<String> {
        match event {
            DeviceEvent::Add(device) => self.device_added(device).await,
            DeviceEvent::Remove(device) => self.device_removed(device).await,
            DeviceEvent::EnumerationDone => self.enumeration_done().await,
        }
    }

    // -----------------------------------------------------------------------
    // Change execution
    // -----------------------------------------------------------------------

    /// Take every queued change and run it to completion, one task per lock
    /// acquisition. Returns the changes with their final statuses.
    pub async fn run_pending_changes(&self) -> Vec<Change> {
        let changes = self.state.lock().await.take_changes();
        let mut finished = Vec::with_capacity(changes.len());
        for mut change in changes {
            while let Some(idx) = next_runnable(&change) {
                let outcome = {
                    let mut state = self.state.lock().await;
                    run_task(&mut state, &change.tasks[idx])
                };
                record_outcome(&mut change, idx, outcome);
            }
            settle(&mut change);
            match change.status {
                Status::Error => warn!(change = %change.id, kind = %change.kind, "change failed"),
                _ => info!(change = %change.id, kind = %change.kind, status = ?change.status, "change finished"),
            }
            finished.push(change);
        }
        finished
    }

    // -----------------------------------------------------------------------
    // Compilation
    // -----------------------------------------------------------------------

    /// Compile one backend from the current graph.
    ///
    /// # Errors
    ///
    /// See [`compiler::compile`].
    pub async fn compile(&self, backend: Backend) -> Result<Specification, CompileError> {
        let state = self.state.lock().await;
        compiler::compile_repository(backend, state.repo(), self.labels.as_ref())
    }

    /// Compile every backend; failures stay scoped to their backend.
    pub async fn compile_all(&self) -> BTreeMap<Backend, Result<Vec<String>, CompileError>> {
        let state = self.state.lock().await;
        compiler::compile_all(state.repo(), self.labels.as_ref())
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Restore hotplug slots and connections from the store. Declarations
    /// must be made first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn restore(&self, db: &StateDb) -> anyhow::Result<()> {
        let snapshot = db.load_snapshot().await?;
        let (slots, conns) = (snapshot.hotplug_slots.len(), snapshot.conns.len());
        self.state.lock().await.restore(snapshot);
        info!(hotplug_slots = slots, connections = conns, "restored state");
        Ok(())
    }

    /// Persist the hotplug slot and connection tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn checkpoint(&self, db: &StateDb) -> anyhow::Result<()> {
        let snapshot = self.state.lock().await.snapshot();
        db.save_snapshot(&snapshot).await
    }
}
