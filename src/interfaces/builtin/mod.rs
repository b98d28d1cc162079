//! Built-in capability descriptors.

pub mod common;
pub mod fwupd;
pub mod lime_sdr;
pub mod upower_control;

use crate::interfaces::{InterfaceRegistry, RegistryError};

/// Registry holding every built-in descriptor, in a fixed order.
/// Descriptors reserved for the OS accept slots of `core_app` only.
///
/// # Errors
///
/// Returns a [`RegistryError`] if two built-ins share a name.
pub fn registry(core_app: &str) -> Result<InterfaceRegistry, RegistryError> {
    let mut registry = InterfaceRegistry::new();
    registry.register(fwupd::interface())?;
    registry.register(lime_sdr::interface(core_app))?;
    registry.register(upower_control::interface(core_app))?;
    Ok(registry)
}
