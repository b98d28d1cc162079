//! Hotplugged devices: identity, naming, lifecycle and the task graphs the
//! lifecycle emits.

pub mod changes;
mod device;
pub mod key;
pub mod manager;
pub mod naming;

pub use changes::{Change, Status, Task, TaskGraph, TaskKind, TaskParams};
pub use device::{clean_path, DeviceEvent, DeviceInfo, HotplugSpec, RequestedSlotSpec};
pub use key::{default_device_key, resolve_device_key};
pub use manager::{DevicePhase, HotplugManager};
pub use naming::{ensure_unique_name, make_slot_name, suggested_slot_name};
