//! `lime-sdr`: access to hotplugged LimeSDR software-defined radios.

use super::common::sanitize_slot_reserved_for_os;
use crate::attrs::Attributes;
use crate::hotplug::{clean_path, DeviceInfo, HotplugSpec, RequestedSlotSpec};
use crate::interfaces::{Backend, HookError, Interface};
use crate::snap::{ConnectedPlug, ConnectedSlot};

/// Descriptor name.
pub const NAME: &str = "lime-sdr";

const SUMMARY: &str = "allows accessing Lime SDR";

const CONNECTED_PLUG_APPARMOR: &str = "
# for receiving kobject_uevent() net messages from the kernel
network netlink raw,

# Allow detection of usb devices. Leaks plugged in USB device info
/sys/bus/usb/devices/ r,

/run/udev/data/###MAJOR###:###MINOR### r,
/run/udev/data/+usb:* r,

# for read/write access to specific usb device
###USB_DEVICE### rw,

###SYSFS_PATH### r,
###SYSFS_PATH###/** r,
";

const CONNECTED_PLUG_SECCOMP: &str = "
# Receive device events from the kernel
socket AF_NETLINK - NETLINK_KOBJECT_UEVENT
bind
";

/// Known `vendor/model` USB id pairs.
const PRODUCTS: [&str; 4] = ["04b4/8613", "04b4/00f1", "0403/601f", "1d50/6108"];

fn is_lime_sdr(device: &DeviceInfo) -> bool {
    if device.subsystem != "usb" || device.attribute("DEVTYPE") != Some("usb_device") {
        return false;
    }
    if device
        .attribute("ID_MODEL")
        .is_some_and(|model| model.starts_with("LimeSDR-USB"))
    {
        return true;
    }
    match (device.attribute("ID_VENDOR_ID"), device.attribute("ID_MODEL_ID")) {
        (Some(vendor), Some(model)) => PRODUCTS.contains(&format!("{vendor}/{model}").as_str()),
        _ => false,
    }
}

fn detect(device: &DeviceInfo, spec: &mut HotplugSpec) -> Result<(), HookError> {
    if !is_lime_sdr(device) {
        return Ok(());
    }
    spec.set_slot(RequestedSlotSpec {
        attrs: Attributes::new()
            .with("path", clean_path(&device.devname))
            .with("sysfspath", clean_path(&device.devpath))
            .with("major", device.major())
            .with("minor", device.minor()),
        ..RequestedSlotSpec::default()
    })
}

fn connected_plug(
    backend: Backend,
    _plug: &ConnectedPlug,
    slot: &ConnectedSlot,
) -> Result<Option<String>, HookError> {
    match backend {
        Backend::AppArmor => {
            let snippet = CONNECTED_PLUG_APPARMOR
                .replace("###USB_DEVICE###", slot.attr_str("path")?)
                .replace("###SYSFS_PATH###", slot.attr_str("sysfspath")?)
                .replace("###MAJOR###", slot.attr_str("major")?)
                .replace("###MINOR###", slot.attr_str("minor")?);
            Ok(Some(snippet))
        }
        Backend::Seccomp => Ok(Some(CONNECTED_PLUG_SECCOMP.to_owned())),
        _ => Ok(None),
    }
}

/// Build the descriptor; slots belong to `core_app`.
pub fn interface(core_app: &str) -> Interface {
    let core_app = core_app.to_owned();
    Interface::builder(NAME)
        .summary(SUMMARY)
        .hotplug_device_detected(detect)
        .sanitize_slot(move |slot| {
            sanitize_slot_reserved_for_os(NAME, &core_app, slot)?;
            slot.attrs
                .get_str("path")
                .map_err(|e| HookError::new(format!("{NAME} slot must have a path attribute: {e}")))?;
            Ok(())
        })
        .connected_plug(connected_plug)
        .auto_connect(|_, _| true)
        .build()
}
