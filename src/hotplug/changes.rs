//! Task graphs submitted to the change execution engine.
//!
//! Graphs are built functionally and handed over once. A task may only wait
//! for tasks added before it, so every graph is acyclic and index order is a
//! valid execution order.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attrs::Attributes;

/// Kind of a hotplug task step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// Create or restore the connections of a device slot.
    HotplugConnect,
    /// Disconnect every connection of a device slot.
    HotplugDisconnect,
    /// Replace the static attributes of a device slot.
    HotplugUpdateSlot,
    /// Remove a device slot.
    HotplugRemoveSlot,
}

impl TaskKind {
    /// Engine-facing task kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HotplugConnect => "hotplug-connect",
            Self::HotplugDisconnect => "hotplug-disconnect",
            Self::HotplugUpdateSlot => "hotplug-update-slot",
            Self::HotplugRemoveSlot => "hotplug-remove-slot",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed parameters carried by every hotplug task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParams {
    /// Device key of the affected slot.
    pub device_key: String,
    /// Interface of the affected slot.
    pub interface: String,
    /// New static attributes (update tasks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_attrs: Option<Attributes>,
}

/// Execution status of a task or change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Not run yet.
    Do,
    /// Completed successfully.
    Done,
    /// Failed.
    Error,
    /// Skipped because a prerequisite failed.
    Hold,
}

/// Index of a task inside its graph.
pub type TaskId = usize;

/// One step of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Position in the graph.
    pub id: TaskId,
    /// Step kind.
    pub kind: TaskKind,
    /// Human-readable summary.
    pub summary: String,
    /// Step parameters.
    pub params: TaskParams,
    /// Tasks that must finish first.
    pub wait_for: Vec<TaskId>,
    /// Execution status.
    pub status: Status,
    /// Failure message, when `status` is [`Status::Error`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An ordered, acyclic set of tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskGraph {
    tasks: Vec<Task>,
}

impl TaskGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task waiting for earlier tasks. Ids that do not refer to an
    /// earlier task are dropped, which keeps the graph acyclic.
    pub fn add(
        mut self,
        kind: TaskKind,
        summary: impl Into<String>,
        params: TaskParams,
        wait_for: &[TaskId],
    ) -> Self {
        let id = self.tasks.len();
        let wait_for = wait_for.iter().copied().filter(|w| *w < id).collect();
        self.tasks.push(Task {
            id,
            kind,
            summary: summary.into(),
            params,
            wait_for,
            status: Status::Do,
            error: None,
        });
        self
    }

    /// Tasks in execution order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Kinds of the tasks in execution order.
    pub fn kinds(&self) -> Vec<TaskKind> {
        self.tasks.iter().map(|t| t.kind).collect()
    }

    /// Id of the last task, if any.
    pub fn last(&self) -> Option<TaskId> {
        self.tasks.len().checked_sub(1)
    }
}

fn params(device_key: &str, interface: &str) -> TaskParams {
    TaskParams {
        device_key: device_key.to_owned(),
        interface: interface.to_owned(),
        slot_attrs: None,
    }
}

/// `hotplug-connect` for a freshly created slot.
pub fn connect_device(device_key: &str, interface: &str) -> TaskGraph {
    TaskGraph::new().add(
        TaskKind::HotplugConnect,
        format!("Recreate connections of device {device_key:?}"),
        params(device_key, interface),
        &[],
    )
}

/// `hotplug-disconnect` → `hotplug-remove-slot`.
pub fn remove_device(device_key: &str, interface: &str) -> TaskGraph {
    TaskGraph::new()
        .add(
            TaskKind::HotplugDisconnect,
            format!("Disable connections of device {device_key:?}"),
            params(device_key, interface),
            &[],
        )
        .add(
            TaskKind::HotplugRemoveSlot,
            format!("Remove slot for device {device_key:?}, interface {interface:?}"),
            params(device_key, interface),
            &[0],
        )
}

/// `hotplug-disconnect` → `hotplug-update-slot` → `hotplug-connect`.
pub fn update_device(device_key: &str, interface: &str, new_attrs: Attributes) -> TaskGraph {
    let mut update_params = params(device_key, interface);
    update_params.slot_attrs = Some(new_attrs);
    TaskGraph::new()
        .add(
            TaskKind::HotplugDisconnect,
            format!("Disable connections of device {device_key:?}"),
            params(device_key, interface),
            &[],
        )
        .add(
            TaskKind::HotplugUpdateSlot,
            format!("Update slot of device {device_key:?}, interface {interface:?}"),
            update_params,
            &[0],
        )
        .add(
            TaskKind::HotplugConnect,
            format!("Recreate connections of device {device_key:?}"),
            params(device_key, interface),
            &[1],
        )
}

/// A transactional unit handed to the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Unique id.
    pub id: String,
    /// Change kind, e.g. `hotplug-remove-serial-port`.
    pub kind: String,
    /// Human-readable summary.
    pub summary: String,
    /// Tasks in execution order.
    pub tasks: Vec<Task>,
    /// Overall status.
    pub status: Status,
    /// When the change was created.
    pub spawned_at: DateTime<Utc>,
}

impl Change {
    /// Wrap a graph into a new change.
    pub fn new(kind: impl Into<String>, summary: impl Into<String>, graph: TaskGraph) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            summary: summary.into(),
            tasks: graph.tasks,
            status: Status::Do,
            spawned_at: Utc::now(),
        }
    }

    /// Kinds of the tasks in execution order.
    pub fn task_kinds(&self) -> Vec<TaskKind> {
        self.tasks.iter().map(|t| t.kind).collect()
    }
}
