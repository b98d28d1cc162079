//! Task handlers for hotplug changes.
//!
//! Every handler is idempotent: re-running a step whose effect is already
//! in place, or whose slot is gone, is a no-op. Engine retries are
//! therefore safe.

use tracing::{debug, info};

use crate::attrs::Attributes;
use crate::hotplug::{Change, Status, Task, TaskKind, TaskParams};
use crate::repo::RepoError;
use crate::snap::{ConnRef, SlotRef};
use crate::state::{ConnState, SystemState};

/// Failure of a single task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The task lacks a parameter its kind requires.
    #[error("{kind} task is missing parameter {param:?}")]
    MissingParam {
        /// Task kind.
        kind: TaskKind,
        /// Missing parameter.
        param: &'static str,
    },
    /// A repository operation failed.
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Run one task against the system state.
///
/// # Errors
///
/// Returns a [`TaskError`] when parameters are missing or the repository
/// rejects an operation.
pub fn run_task(state: &mut SystemState, task: &Task) -> Result<(), TaskError> {
    match task.kind {
        TaskKind::HotplugDisconnect => hotplug_disconnect(state, &task.params),
        TaskKind::HotplugUpdateSlot => {
            let attrs = task.params.slot_attrs.clone().ok_or(TaskError::MissingParam {
                kind: task.kind,
                param: "slot-attrs",
            })?;
            hotplug_update_slot(state, &task.params, attrs)
        }
        TaskKind::HotplugConnect => hotplug_connect(state, &task.params),
        TaskKind::HotplugRemoveSlot => hotplug_remove_slot(state, &task.params),
    }
}

fn device_slot(state: &SystemState, params: &TaskParams) -> Option<SlotRef> {
    state
        .repo
        .slot_for_device_key(&params.device_key, &params.interface)
        .map(|s| s.reference())
}

/// Disconnect every connection of the device's slot and mark the recorded
/// connection states gone.
fn hotplug_disconnect(state: &mut SystemState, params: &TaskParams) -> Result<(), TaskError> {
    let Some(slot) = device_slot(state, params) else {
        debug!(device_key = %params.device_key, interface = %params.interface, "no slot to disconnect");
        return Ok(());
    };
    for conn in state.repo.connections_for_slot(&slot) {
        state.repo.disconnect(&conn)?;
        if let Some(st) = state.conns.get_mut(&conn.id()) {
            st.hotplug_gone = true;
        }
        info!(conn = %conn, "disabled connection of removed device");
    }
    Ok(())
}

/// Replace the static attributes of the device's slot.
fn hotplug_update_slot(
    state: &mut SystemState,
    params: &TaskParams,
    attrs: Attributes,
) -> Result<(), TaskError> {
    let Some(slot) = device_slot(state, params) else {
        debug!(device_key = %params.device_key, "no slot to update");
        return Ok(());
    };
    if state
        .repo
        .slot(&slot.app, &slot.name)
        .is_some_and(|s| s.attrs == attrs)
    {
        return Ok(());
    }
    state.repo.update_slot_attrs(&slot, attrs.clone())?;
    if let Some(def) = state.hotplug_slots.get_mut(&slot.name) {
        def.static_attrs = attrs;
    }
    info!(slot = %slot, "updated hotplug slot attributes");
    Ok(())
}

/// Restore the connections the device lost, then auto-connect.
fn hotplug_connect(state: &mut SystemState, params: &TaskParams) -> Result<(), TaskError> {
    let Some(slot) = device_slot(state, params) else {
        debug!(device_key = %params.device_key, "no slot to connect");
        return Ok(());
    };

    let gone: Vec<(String, ConnState)> = state
        .conns
        .iter()
        .filter(|(_, st)| {
            st.hotplug_gone
                && st.interface == params.interface
                && st.hotplug_key == params.device_key
        })
        .map(|(id, st)| (id.clone(), st.clone()))
        .collect();

    for (id, st) in gone {
        let Some(old) = ConnRef::parse(&id) else {
            continue;
        };
        if state.repo.plug(&old.plug.app, &old.plug.name).is_none() {
            debug!(conn = %id, "plug of gone connection no longer exists");
            continue;
        }
        // The slot may have been recreated under a different name.
        let conn = ConnRef::new(old.plug, slot.clone());
        if !state.repo.is_connected(&conn) {
            state.repo.connect(
                &conn.plug,
                &conn.slot,
                st.plug_dynamic_attrs.clone(),
                st.slot_dynamic_attrs.clone(),
            )?;
            info!(conn = %conn, "restored connection of re-plugged device");
        }
        state.conns.remove(&id);
        state.conns.insert(
            conn.id(),
            ConnState {
                hotplug_gone: false,
                ..st
            },
        );
    }

    for plug in state.repo.auto_connect_candidate_plugs(&slot) {
        let conn = state.connect(&plug.reference(), &slot, true)?;
        info!(conn = %conn, "auto-connected hotplug slot");
    }
    Ok(())
}

/// Remove the device's slot and mark its table entry gone.
fn hotplug_remove_slot(state: &mut SystemState, params: &TaskParams) -> Result<(), TaskError> {
    let Some(slot) = device_slot(state, params) else {
        debug!(device_key = %params.device_key, "slot already removed");
        return Ok(());
    };
    state.repo.remove_slot(&slot)?;
    if let Some(def) = state.hotplug_slots.get_mut(&slot.name) {
        def.hotplug_gone = true;
    }
    info!(slot = %slot, interface = %params.interface, "removed hotplug slot");
    Ok(())
}

// ---------------------------------------------------------------------------
// Runner support
// ---------------------------------------------------------------------------

/// Index of the next task that may run: not run yet, every prerequisite done.
pub fn next_runnable(change: &Change) -> Option<usize> {
    if change.status != Status::Do {
        return None;
    }
    change.tasks.iter().position(|t| {
        t.status == Status::Do
            && t
                .wait_for
                .iter()
                .all(|w| change.tasks.get(*w).is_some_and(|p| p.status == Status::Done))
    })
}

/// Record the outcome of task `idx`. A failure marks the change `Error`
/// and holds every task that has not run; the change is `Done` once all
/// tasks are.
pub fn record_outcome(change: &mut Change, idx: usize, outcome: Result<(), TaskError>) {
    let Some(task) = change.tasks.get_mut(idx) else {
        return;
    };
    match outcome {
        Ok(()) => task.status = Status::Done,
        Err(e) => {
            task.status = Status::Error;
            task.error = Some(e.to_string());
            for other in change.tasks.iter_mut().filter(|t| t.status == Status::Do) {
                other.status = Status::Hold;
            }
            change.status = Status::Error;
            return;
        }
    }
    if change.tasks.iter().all(|t| t.status == Status::Done) {
        change.status = Status::Done;
    }
}

/// Run a whole change against state already held by the caller.
pub fn run_change(state: &mut SystemState, change: &mut Change) {
    while let Some(idx) = next_runnable(change) {
        let outcome = run_task(state, &change.tasks[idx]);
        record_outcome(change, idx, outcome);
    }
    settle(change);
}

/// Mark a change `Done` once nothing is left to run and nothing failed.
pub fn settle(change: &mut Change) {
    if change.status == Status::Do && change.tasks.iter().all(|t| t.status == Status::Done) {
        change.status = Status::Done;
    }
}
