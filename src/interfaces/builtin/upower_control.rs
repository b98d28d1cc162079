//! `upower-control`: query UPower, suspend and hibernate the system.

use super::common::CommonInterface;
use crate::interfaces::Interface;

const CONNECTED_PLUG_APPARMOR: &str = r#"
# Description: Can query UPower as well as suspend and hibernate the system

#include <abstractions/dbus-strict>

# Find all devices monitored by UPower
dbus (send)
    bus=system
    path=/org/freedesktop/UPower
    interface=org.freedesktop.UPower
    member=EnumerateDevices
    peer=(label=unconfined),

# Read all properties from UPower and devices
dbus (send)
    bus=system
    path=/org/freedesktop/UPower{,/devices/**}
    interface=org.freedesktop.DBus.Properties
    member=Get{,All}
    peer=(label=unconfined),

dbus (send)
    bus=system
    path=/org/freedesktop/UPower
    interface=org.freedesktop.UPower
    member=GetCriticalAction
    peer=(label=unconfined),

dbus (send)
    bus=system
    path=/org/freedesktop/UPower/devices/**
    interface=org.freedesktop.UPower.Device
    member=GetHistory
    peer=(label=unconfined),

# Receive property changed events
dbus (receive)
    bus=system
    path=/org/freedesktop/UPower{,/devices/**}
    interface=org.freedesktop.DBus.Properties
    member=PropertiesChanged
    peer=(label=unconfined),

# Receive signals from UPower
dbus (receive)
    bus=system
    path=/org/freedesktop/UPower
    interface=org.freedesktop.UPower
    member="{DeviceAdded,DeviceRemoved,DeviceChanged,Changed,Sleeping,Resuming}"
    peer=(label=unconfined),
"#;

const CONNECTED_PLUG_SECCOMP: &str = "
# Description: Can query UPower as well as suspend and hibernate the system

# dbus
connect
getsockname
recvfrom
recvmsg
send
sendto
sendmsg
socket
";

/// Build the descriptor; slots belong to `core_app`.
pub fn interface(core_app: &str) -> Interface {
    CommonInterface {
        name: "upower-control",
        summary: "allows controlling power management through UPower",
        connected_plug_apparmor: Some(CONNECTED_PLUG_APPARMOR),
        connected_plug_seccomp: Some(CONNECTED_PLUG_SECCOMP),
        reserved_for_os: true,
        auto_connect: true,
    }
    .build(core_app)
}
