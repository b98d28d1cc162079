//! Stable device identity.
//!
//! A device key recognizes the same physical device across hotplug events
//! and reboots. Descriptors may supply their own key; otherwise it is
//! derived from four groups of udev properties.

use crate::hotplug::DeviceInfo;
use crate::interfaces::{HookError, Interface};

/// Attribute groups feeding the default key, in key order: name, vendor,
/// model, identifier. Within a group the first non-empty attribute wins.
pub const ATTR_GROUPS: [&[&str]; 4] = [
    &["ID_V4L_PRODUCT", "NAME", "ID_NET_NAME", "PCI_SLOT_NAME"],
    &[
        "ID_VENDOR_ID",
        "ID_VENDOR",
        "ID_WWN",
        "ID_WWN_WITH_EXTENSION",
        "ID_VENDOR_FROM_DATABASE",
        "ID_VENDOR_ENC",
        "ID_OUI_FROM_DATABASE",
    ],
    &["ID_MODEL_ID", "ID_MODEL_ENC"],
    &["ID_SERIAL", "ID_SERIAL_SHORT", "ID_NET_NAME_MAC", "ID_REVISION"],
];

/// Minimum number of non-empty groups for a usable default key.
const MIN_KEY_GROUPS: usize = 2;

/// Derive the default key: the four group values joined with `/`.
///
/// Returns an empty string when fewer than two groups yield a value; such a
/// device cannot be identified and must be skipped.
pub fn default_device_key(device: &DeviceInfo) -> String {
    let parts: Vec<&str> = ATTR_GROUPS
        .iter()
        .map(|group| {
            group
                .iter()
                .filter_map(|attr| device.attribute(attr))
                .find(|value| !value.is_empty())
                .unwrap_or_default()
        })
        .collect();

    let found = parts.iter().filter(|p| !p.is_empty()).count();
    if found < MIN_KEY_GROUPS {
        return String::new();
    }
    parts.join("/")
}

/// Resolve the key of `device` for `iface`.
///
/// A non-empty key from the descriptor's override is authoritative; an
/// empty one defers to [`default_device_key`].
///
/// # Errors
///
/// Returns the override's [`HookError`], annotated with the interface name.
pub fn resolve_device_key(device: &DeviceInfo, iface: &Interface) -> Result<String, HookError> {
    let key = iface.hotplug_device_key(device).map_err(|e| {
        HookError::new(format!(
            "failed to create device key for interface {:?}: {e}",
            iface.name()
        ))
    })?;
    if !key.is_empty() {
        return Ok(key);
    }
    Ok(default_device_key(device))
}
