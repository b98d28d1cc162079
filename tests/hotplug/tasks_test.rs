//! Task handlers and change execution.

use plugboard::attrs::Attributes;
use plugboard::context::Context;
use plugboard::hotplug::changes::{connect_device, remove_device, update_device};
use plugboard::hotplug::{Change, Status, TaskGraph, TaskKind, TaskParams};
use plugboard::interfaces::{Interface, InterfaceRegistry};
use plugboard::snap::{PlugInfo, SlotInfo, SlotRef};
use plugboard::state::SystemState;
use plugboard::tasks::{next_runnable, record_outcome, run_change, run_task, TaskError};

const IFACE: &str = "gpio-chip";
const KEY: &str = "chip0/vendor//serial";

fn state() -> SystemState {
    let mut registry = InterfaceRegistry::new();
    registry
        .register(Interface::builder(IFACE).auto_connect(|_, _| true).build())
        .expect("register");
    let mut state = SystemState::new(&Context::new(registry));
    state
        .repo_mut()
        .add_plug(PlugInfo::new("blinker", "gpio", IFACE))
        .expect("plug");
    state
}

fn with_device_slot(state: &mut SystemState) {
    let mut slot = SlotInfo::new("core", "chip0", IFACE);
    slot.hotplug_key = KEY.to_owned();
    state.repo_mut().add_slot(slot).expect("slot");
}

fn params(slot_attrs: Option<Attributes>) -> TaskParams {
    TaskParams {
        device_key: KEY.to_owned(),
        interface: IFACE.to_owned(),
        slot_attrs,
    }
}

#[test]
fn graphs_only_wait_on_earlier_tasks() {
    let graph = TaskGraph::new()
        .add(TaskKind::HotplugDisconnect, "a", params(None), &[0, 3])
        .add(TaskKind::HotplugRemoveSlot, "b", params(None), &[0, 1, 7]);
    assert!(graph.tasks()[0].wait_for.is_empty());
    assert_eq!(graph.tasks()[1].wait_for, vec![0]);
    assert_eq!(graph.last(), Some(1));
    assert_eq!(TaskGraph::new().last(), None);
}

#[test]
fn handlers_are_no_ops_without_a_slot() {
    let mut state = state();
    for graph in [
        connect_device(KEY, IFACE),
        remove_device(KEY, IFACE),
        update_device(KEY, IFACE, Attributes::new().with("x", 1_i64)),
    ] {
        let mut change = Change::new("test", "no slot", graph);
        run_change(&mut state, &mut change);
        assert_eq!(change.status, Status::Done);
        assert!(change.tasks.iter().all(|t| t.status == Status::Done));
    }
    assert!(state.repo().slots().is_empty());
    assert!(state.repo().connections().is_empty());
}

#[test]
fn connect_task_auto_connects_and_is_idempotent() {
    let mut state = state();
    with_device_slot(&mut state);

    let mut change = Change::new("test", "connect", connect_device(KEY, IFACE));
    run_change(&mut state, &mut change);
    assert_eq!(state.repo().connections().len(), 1);

    // Re-running the task does not duplicate anything.
    let outcome = run_task(&mut state, &change.tasks[0]);
    assert_eq!(outcome, Ok(()));
    assert_eq!(state.repo().connections().len(), 1);
    assert_eq!(state.conns().len(), 1);
}

#[test]
fn remove_task_fails_while_connected() {
    let mut state = state();
    with_device_slot(&mut state);
    let mut connect = Change::new("test", "connect", connect_device(KEY, IFACE));
    run_change(&mut state, &mut connect);

    let graph = TaskGraph::new().add(TaskKind::HotplugRemoveSlot, "remove", params(None), &[]);
    let outcome = run_task(&mut state, &graph.tasks()[0]);
    assert!(matches!(outcome, Err(TaskError::Repo(_))));
    assert!(state.repo().slot("core", "chip0").is_some());
}

#[test]
fn update_task_requires_attributes() {
    let mut state = state();
    with_device_slot(&mut state);
    let graph = TaskGraph::new().add(TaskKind::HotplugUpdateSlot, "update", params(None), &[]);
    assert_eq!(
        run_task(&mut state, &graph.tasks()[0]),
        Err(TaskError::MissingParam {
            kind: TaskKind::HotplugUpdateSlot,
            param: "slot-attrs",
        })
    );
}

#[test]
fn update_task_replaces_attributes() {
    let mut state = state();
    with_device_slot(&mut state);
    let attrs = Attributes::new().with("lines", 32_i64);
    let mut change = Change::new("test", "update", update_device(KEY, IFACE, attrs.clone()));
    run_change(&mut state, &mut change);
    assert_eq!(change.status, Status::Done);
    let slot = state.repo().slot("core", "chip0").expect("slot");
    assert_eq!(slot.attrs, attrs);
}

#[test]
fn failure_holds_remaining_tasks() {
    let mut state = state();
    with_device_slot(&mut state);
    let graph = TaskGraph::new()
        .add(TaskKind::HotplugUpdateSlot, "update", params(None), &[])
        .add(TaskKind::HotplugConnect, "connect", params(None), &[0]);
    let mut change = Change::new("test", "broken", graph);

    assert_eq!(next_runnable(&change), Some(0));
    let outcome = run_task(&mut state, &change.tasks[0]);
    record_outcome(&mut change, 0, outcome);

    assert_eq!(change.status, Status::Error);
    assert_eq!(change.tasks[0].status, Status::Error);
    assert!(change.tasks[0].error.is_some());
    assert_eq!(change.tasks[1].status, Status::Hold);
    assert_eq!(next_runnable(&change), None);
    assert!(state.repo().connections().is_empty());
}

#[test]
fn next_runnable_waits_for_prerequisites() {
    let mut change = Change::new("test", "order", remove_device(KEY, IFACE));
    assert_eq!(next_runnable(&change), Some(0));
    record_outcome(&mut change, 0, Ok(()));
    assert_eq!(change.status, Status::Do);
    assert_eq!(next_runnable(&change), Some(1));
    record_outcome(&mut change, 1, Ok(()));
    assert_eq!(change.status, Status::Done);
    assert_eq!(next_runnable(&change), None);
}

#[test]
fn disconnect_task_marks_connection_state_gone() {
    let mut state = state();
    with_device_slot(&mut state);
    let mut connect = Change::new("test", "connect", connect_device(KEY, IFACE));
    run_change(&mut state, &mut connect);

    let graph = TaskGraph::new().add(TaskKind::HotplugDisconnect, "disconnect", params(None), &[]);
    assert_eq!(run_task(&mut state, &graph.tasks()[0]), Ok(()));
    assert!(state.repo().connections_for_slot(&SlotRef::new("core", "chip0")).is_empty());
    let (_, conn) = state.conns().iter().next().expect("state kept");
    assert!(conn.hotplug_gone);
    assert_eq!(conn.hotplug_key, KEY);
}
