//! Built-in descriptors.

use plugboard::compiler::{compile_repository, SecurityTagResolver};
use plugboard::context::Context;
use plugboard::hotplug::DeviceInfo;
use plugboard::interfaces::{builtin, Backend, Hook};
use plugboard::repo::RepoError;
use plugboard::snap::{PlugInfo, SlotInfo};
use plugboard::state::SystemState;
use plugboard::tasks::run_change;

fn lime_sdr_device() -> DeviceInfo {
    DeviceInfo::new("/sys/devices/pci0000:00/0000:00:14.0/usb1/1-2")
        .with_devname("/dev/bus/usb/001/004")
        .with_subsystem("usb")
        .with_attr("DEVTYPE", "usb_device")
        .with_attr("MAJOR", "189")
        .with_attr("MINOR", "3")
        .with_attr("ID_VENDOR_ID", "1d50")
        .with_attr("ID_MODEL_ID", "6108")
        .with_attr("ID_MODEL", "LimeSDR-USB")
        .with_attr("ID_SERIAL", "Myriad-RF_LimeSDR-USB_0009060B00471B22")
}

#[test]
fn catalogue_registers_every_builtin() {
    let registry = builtin::registry("core").expect("registry");
    let names: Vec<&str> = registry.all().iter().map(|i| i.name()).collect();
    assert_eq!(names, ["fwupd", "lime-sdr", "upower-control"]);

    let hotplug: Vec<String> = registry
        .hotplug()
        .iter()
        .map(|i| i.name().to_owned())
        .collect();
    assert_eq!(hotplug, ["lime-sdr"]);
}

#[test]
fn hook_predicates_reflect_implementation() {
    let registry = builtin::registry("core").expect("registry");
    let fwupd = registry.get("fwupd").expect("fwupd");
    assert!(fwupd.implements(Hook::PermanentSlot));
    assert!(fwupd.implements(Hook::ConnectedSlot));
    assert!(!fwupd.implements(Hook::HotplugDeviceDetected));
    assert!(!fwupd.is_hotplug());

    let lime = registry.get("lime-sdr").expect("lime-sdr");
    assert!(lime.implements(Hook::SanitizeSlot));
    assert!(!lime.implements(Hook::HotplugDeviceKey));
    assert!(lime.is_hotplug());
}

#[test]
fn reserved_slots_belong_to_core_app() {
    let ctx = Context::new(builtin::registry("system").expect("registry")).with_core_app("system");
    let mut state = SystemState::new(&ctx);

    let rejected = state
        .repo_mut()
        .add_slot(SlotInfo::new("someapp", "power", "upower-control"));
    assert!(matches!(rejected, Err(RepoError::Sanitize { .. })));
    state
        .repo_mut()
        .add_slot(SlotInfo::new("system", "power", "upower-control"))
        .expect("core slot accepted");
}

#[test]
fn lime_sdr_slot_needs_path() {
    let mut state = SystemState::new(&Context::new(builtin::registry("core").expect("registry")));
    let err = state
        .repo_mut()
        .add_slot(SlotInfo::new("core", "sdr", "lime-sdr"))
        .expect_err("missing path");
    assert!(err.to_string().contains("lime-sdr"));
}

#[test]
fn lime_sdr_hotplug_end_to_end() {
    let ctx = Context::new(builtin::registry("core").expect("registry"));
    let mut state = SystemState::new(&ctx);
    state
        .repo_mut()
        .add_plug(PlugInfo::new("gqrx", "sdr", "lime-sdr"))
        .expect("plug");

    let ids = state.hotplug_device_added(&lime_sdr_device());
    assert_eq!(ids.len(), 1);
    let slot = state.repo().slot("core", "limesdr-usb").expect("slot");
    assert_eq!(
        slot.hotplug_key,
        "/1d50/6108/Myriad-RF_LimeSDR-USB_0009060B00471B22"
    );
    assert_eq!(slot.label, "allows accessing Lime SDR");

    let mut changes = state.take_changes();
    for change in &mut changes {
        run_change(&mut state, change);
    }
    assert_eq!(state.repo().connections().len(), 1);

    let apparmor = compile_repository(Backend::AppArmor, state.repo(), &SecurityTagResolver)
        .expect("compile");
    let text = apparmor.snippets().concat();
    assert!(text.contains("/dev/bus/usb/001/004 rw,"));
    assert!(text.contains("/run/udev/data/189:3 r,"));
    assert!(text.contains(
        "/sys/devices/pci0000:00/0000:00:14.0/usb1/1-2/** r,"
    ));
    assert!(!text.contains("###"));

    let seccomp = compile_repository(Backend::Seccomp, state.repo(), &SecurityTagResolver)
        .expect("compile");
    assert_eq!(seccomp.snippets().len(), 1);
}

#[test]
fn fwupd_policy_uses_peer_labels() {
    let ctx = Context::new(builtin::registry("core").expect("registry"));
    let mut state = SystemState::new(&ctx);
    state
        .repo_mut()
        .add_slot(SlotInfo::new("fwupd", "fwupd", "fwupd"))
        .expect("slot");
    state
        .repo_mut()
        .add_plug(PlugInfo::new("gnome-software", "fwupd", "fwupd"))
        .expect("plug");
    state
        .connect(
            &plugboard::snap::PlugRef::new("gnome-software", "fwupd"),
            &plugboard::snap::SlotRef::new("fwupd", "fwupd"),
            false,
        )
        .expect("connect");

    let apparmor = compile_repository(Backend::AppArmor, state.repo(), &SecurityTagResolver)
        .expect("compile");
    let snippets = apparmor.snippets();
    // Plug side, slot side, then the permanent slot policy.
    assert_eq!(snippets.len(), 3);
    assert!(snippets[0].contains("peer=(label=snap.fwupd.fwupd)"));
    assert!(snippets[1].contains("peer=(label=snap.gnome-software.fwupd)"));
    assert!(snippets[2].contains("capability sys_admin,"));

    let dbus = compile_repository(Backend::DBus, state.repo(), &SecurityTagResolver)
        .expect("compile");
    assert_eq!(dbus.snippets().len(), 1);
    assert!(dbus.snippets()[0].contains("org.freedesktop.fwupd"));

    let udev = compile_repository(Backend::Udev, state.repo(), &SecurityTagResolver)
        .expect("compile");
    assert!(udev.snippets().is_empty());
}
