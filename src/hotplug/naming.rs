//! Slot name allocation for hotplugged devices.

use crate::hotplug::DeviceInfo;

/// Upper bound on the length of generated slot names.
pub const MAX_GENERATED_SLOT_NAME_LEN: usize = 20;

/// Attributes a slot name may be derived from.
const NAME_ATTRS: [&str; 3] = ["NAME", "ID_MODEL_FROM_DATABASE", "ID_MODEL"];

/// Turn a free-form device string into a valid slot name.
///
/// Keeps ASCII letters (lowercased), digits and single dashes; the result
/// starts with a letter, never ends with a dash and is at most
/// [`MAX_GENERATED_SLOT_NAME_LEN`] characters long. Returns an empty string
/// when nothing usable remains.
pub fn make_slot_name(raw: &str) -> String {
    let mut out = String::with_capacity(MAX_GENERATED_SLOT_NAME_LEN);
    // Set while the last emitted character is a dash (or nothing was emitted).
    let mut dash = true;
    for c in raw.chars() {
        if out.len() >= MAX_GENERATED_SLOT_NAME_LEN {
            break;
        }
        match c {
            '-' if !dash => {
                dash = true;
                out.push('-');
            }
            c if c.is_ascii_alphabetic() => {
                out.push(c.to_ascii_lowercase());
                dash = false;
            }
            c if c.is_ascii_digit() && !out.is_empty() => {
                out.push(c);
                dash = false;
            }
            _ => {}
        }
    }
    out.trim_end_matches('-').to_owned()
}

/// Make `proposed` unique according to `is_unique`.
///
/// A unique name is returned unchanged. Otherwise the trailing number (0
/// when absent) is incremented until the predicate accepts the name;
/// a dash between prefix and number is dropped (`eth-0` → `eth1`).
pub fn ensure_unique_name(proposed: &str, is_unique: impl Fn(&str) -> bool) -> String {
    if is_unique(proposed) {
        return proposed.to_owned();
    }

    let prefix = proposed.trim_end_matches(|c: char| c.is_ascii_digit());
    let mut suffix: u64 = proposed[prefix.len()..].parse().unwrap_or(0);
    let prefix = prefix.trim_end_matches('-');

    loop {
        suffix = suffix.saturating_add(1);
        let candidate = format!("{prefix}{suffix}");
        if is_unique(&candidate) {
            return candidate;
        }
    }
}

/// The shortest sanitized name among the device's naming attributes, or
/// `fallback` (typically the interface name) when none yields a name.
pub fn suggested_slot_name(device: &DeviceInfo, fallback: &str) -> String {
    NAME_ATTRS
        .iter()
        .filter_map(|attr| device.attribute(attr))
        .map(make_slot_name)
        .filter(|name| !name.is_empty())
        .min_by_key(String::len)
        .unwrap_or_else(|| fallback.to_owned())
}
