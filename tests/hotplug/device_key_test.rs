//! Device key derivation.

use plugboard::hotplug::{default_device_key, resolve_device_key, DeviceInfo};
use plugboard::interfaces::{HookError, Interface};
use proptest::prelude::*;

fn ftdi() -> DeviceInfo {
    DeviceInfo::new("/sys/devices/pci0000:00/usb1/1-1/ttyUSB0")
        .with_attr("ID_VENDOR_ID", "0403")
        .with_attr("ID_MODEL_ID", "6001")
        .with_attr("ID_SERIAL", "FTDI_FT232R_A1")
}

#[test]
fn key_joins_four_groups() {
    assert_eq!(default_device_key(&ftdi()), "/0403/6001/FTDI_FT232R_A1");
}

#[test]
fn first_non_empty_attribute_of_a_group_wins() {
    let dev = ftdi()
        .with_attr("ID_VENDOR", "FTDI")
        .with_attr("NAME", "")
        .with_attr("ID_NET_NAME", "enp0s1");
    assert_eq!(default_device_key(&dev), "enp0s1/0403/6001/FTDI_FT232R_A1");
}

#[test]
fn single_group_is_not_enough() {
    let dev = DeviceInfo::new("/sys/x").with_attr("ID_SERIAL", "abc");
    assert_eq!(default_device_key(&dev), "");
    assert_eq!(default_device_key(&DeviceInfo::new("/sys/y")), "");
}

#[test]
fn two_groups_suffice() {
    let dev = DeviceInfo::new("/sys/x")
        .with_attr("ID_VENDOR_ID", "1d50")
        .with_attr("ID_SERIAL_SHORT", "0009");
    assert_eq!(default_device_key(&dev), "/1d50//0009");
}

#[test]
fn override_is_authoritative() {
    let iface = Interface::builder("custom")
        .hotplug_device_key(|d| Ok(format!("custom:{}", d.devpath)))
        .build();
    let key = resolve_device_key(&ftdi(), &iface);
    assert_eq!(
        key,
        Ok("custom:/sys/devices/pci0000:00/usb1/1-1/ttyUSB0".to_owned())
    );
}

#[test]
fn empty_override_falls_back_to_default() {
    let iface = Interface::builder("custom")
        .hotplug_device_key(|_| Ok(String::new()))
        .build();
    assert_eq!(
        resolve_device_key(&ftdi(), &iface),
        Ok("/0403/6001/FTDI_FT232R_A1".to_owned())
    );
}

#[test]
fn override_failure_names_interface() {
    let iface = Interface::builder("broken")
        .hotplug_device_key(|_| Err(HookError::new("no serial")))
        .build();
    let err = match resolve_device_key(&ftdi(), &iface) {
        Ok(key) => panic!("override failure should propagate, got {key:?}"),
        Err(err) => err,
    };
    assert!(err.to_string().contains("broken"));
    assert!(err.to_string().contains("no serial"));
}

proptest! {
    #[test]
    fn key_ignores_devpath_and_insertion_order(
        vendor in "[0-9a-f]{4}",
        model in "[0-9a-f]{4}",
        serial in "[A-Za-z0-9_]{1,16}",
        path_a in "/sys/[a-z0-9/]{1,20}",
        path_b in "/sys/[a-z0-9/]{1,20}",
    ) {
        let forward = DeviceInfo::new(path_a)
            .with_attr("ID_VENDOR_ID", vendor.as_str())
            .with_attr("ID_MODEL_ID", model.as_str())
            .with_attr("ID_SERIAL", serial.as_str());
        let reverse = DeviceInfo::new(path_b)
            .with_attr("ID_SERIAL", serial.as_str())
            .with_attr("ID_MODEL_ID", model.as_str())
            .with_attr("ID_VENDOR_ID", vendor.as_str());
        let key = default_device_key(&forward);
        prop_assert_eq!(&key, &default_device_key(&reverse));
        prop_assert_eq!(key, format!("/{vendor}/{model}/{serial}"));
    }

    #[test]
    fn key_is_empty_or_has_four_parts(attrs in proptest::collection::btree_map(
        prop_oneof![
            Just("NAME"), Just("ID_VENDOR_ID"), Just("ID_MODEL_ID"),
            Just("ID_SERIAL"), Just("ID_REVISION"), Just("SUBSYSTEM"),
        ],
        "[a-z0-9]{0,6}",
        0..6,
    )) {
        let mut dev = DeviceInfo::new("/sys/p");
        for (k, v) in &attrs {
            dev = dev.with_attr(*k, v.as_str());
        }
        let key = default_device_key(&dev);
        prop_assert!(key.is_empty() || key.split('/').count() == 4);
    }
}
