//! `fwupd`: the firmware update service and its clients.
//!
//! The slot side is the service itself (permanent MAC, bus and syscall
//! policy); connections let clients talk to the service over the system bus
//! and vice versa, with the peers named by their confinement labels.

use crate::interfaces::{Backend, Interface};

const SUMMARY: &str = "allows operating as the fwupd service";

const PERMANENT_SLOT_APPARMOR: &str = r#"
# Description: Allow operating as the fwupd service. This gives privileged
# access to the system.

  # Allow read/write access for old efivars sysfs interface
  capability sys_admin,
  # Allow libfwup to access efivarfs with immutable flag
  capability linux_immutable,

  # For udev
  network netlink raw,

  # Allow access for EFI System Resource Table in the UEFI 2.5+ specification
  /sys/firmware/efi/esrt/entries/ r,
  /sys/firmware/efi/esrt/entries/** r,

  # Allow fwupd to access system information
  /sys/devices/virtual/dmi/id/product_name r,
  /sys/devices/virtual/dmi/id/sys_vendor r,

  # Allow read/write access for efivarfs filesystem
  /sys/firmware/efi/efivars/ r,
  /sys/firmware/efi/efivars/** rw,

  # Allow write access for efi firmware updater
  /boot/efi/EFI/ubuntu/fw/** rw,

  # Allow access from efivar library
  owner @{PROC}/@{pid}/mounts r,
  /sys/devices/{pci*,platform}/**/block/**/partition r,
  /run/udev/data/b[0-9]*:[0-9]* r,

  # Allow access UEFI firmware platform size
  /sys/firmware/efi/ r,
  /sys/firmware/efi/fw_platform_size r,

  #include <abstractions/dbus-strict>
  dbus (send)
      bus=system
      path=/org/freedesktop/DBus
      interface=org.freedesktop.DBus
      member={Request,Release}Name
      peer=(name=org.freedesktop.DBus),

  dbus (send)
      bus=system
      path=/org/freedesktop/DBus
      interface=org.freedesktop.DBus
      member=GetConnectionUnixUser
      peer=(label=unconfined),

  # Allow binding the service to the requested connection name
  dbus (bind)
      bus=system
      name="org.freedesktop.fwupd",
"#;

const CONNECTED_PLUG_APPARMOR: &str = "
# Description: Allow using fwupd service.

  #include <abstractions/nameservice>
  #include <abstractions/ssl_certs>
  #include <abstractions/dbus-strict>

  # Allow access to fwupd service
  dbus (receive, send)
      bus=system
      path=/
      interface=org.freedesktop.fwupd
      peer=(label=###SLOT_SECURITY_TAGS###),

  dbus (receive, send)
      bus=system
      path=/
      interface=org.freedesktop.DBus.Properties
      peer=(label=###SLOT_SECURITY_TAGS###),
";

const CONNECTED_SLOT_APPARMOR: &str = "
# Description: Allow firmware update using fwupd service.

  # Allow traffic to/from org.freedesktop.DBus for fwupd service
  dbus (receive, send)
      bus=system
      path=/
      interface=org.freedesktop.DBus.**
      peer=(label=###PLUG_SECURITY_TAGS###),

  dbus (receive, send)
      bus=system
      path=/org/freedesktop/fwupd{,/**}
      interface=org.freedesktop.DBus.**
      peer=(label=###PLUG_SECURITY_TAGS###),

  # Allow traffic to/from fwupd interface with any method
  dbus (receive, send)
      bus=system
      path=/
      interface=org.freedesktop.fwupd
      peer=(label=###PLUG_SECURITY_TAGS###),

  dbus (receive, send)
      bus=system
      path=/org/freedesktop/fwupd{,/**}
      interface=org.freedesktop.fwupd
      peer=(label=###PLUG_SECURITY_TAGS###),
";

const PERMANENT_SLOT_DBUS: &str = r#"
<policy user="root">
    <allow own="org.freedesktop.fwupd"/>
    <allow send_destination="org.freedesktop.fwupd" send_interface="org.freedesktop.fwupd"/>
    <allow send_destination="org.freedesktop.fwupd" send_interface="org.freedesktop.DBus.Properties"/>
    <allow send_destination="org.freedesktop.fwupd" send_interface="org.freedesktop.DBus.Introspectable"/>
    <allow send_destination="org.freedesktop.fwupd" send_interface="org.freedesktop.DBus.Peer"/>
</policy>
<policy context="default">
    <deny own="org.freedesktop.fwupd"/>
    <deny send_destination="org.freedesktop.fwupd" send_interface="org.freedesktop.fwupd"/>
</policy>
"#;

const PERMANENT_SLOT_SECCOMP: &str = "
# Description: Allow operating as the fwupd service.
# Can communicate with DBus system service
bind
";

const CONNECTED_PLUG_SECCOMP: &str = "
# Description: Allow using fwupd service.
bind
";

/// Build the descriptor.
pub fn interface() -> Interface {
    Interface::builder("fwupd")
        .summary(SUMMARY)
        .permanent_slot(|backend, _| {
            Ok(match backend {
                Backend::AppArmor => Some(PERMANENT_SLOT_APPARMOR.to_owned()),
                Backend::DBus => Some(PERMANENT_SLOT_DBUS.to_owned()),
                Backend::Seccomp => Some(PERMANENT_SLOT_SECCOMP.to_owned()),
                Backend::Udev => None,
            })
        })
        .connected_plug(|backend, _, _| {
            Ok(match backend {
                Backend::AppArmor => Some(CONNECTED_PLUG_APPARMOR.to_owned()),
                Backend::Seccomp => Some(CONNECTED_PLUG_SECCOMP.to_owned()),
                _ => None,
            })
        })
        .connected_slot(|backend, _, _| {
            Ok((backend == Backend::AppArmor).then(|| CONNECTED_SLOT_APPARMOR.to_owned()))
        })
        .auto_connect(|_, _| true)
        .build()
}
