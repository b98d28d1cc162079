//! Declarative descriptors built from fixed snippets.

use crate::interfaces::{Backend, HookError, Interface};
use crate::snap::SlotInfo;

/// Reject slots not owned by the core application.
///
/// # Errors
///
/// Returns a [`HookError`] naming the interface when `slot` belongs to any
/// other application.
pub fn sanitize_slot_reserved_for_os(
    interface: &str,
    core_app: &str,
    slot: &SlotInfo,
) -> Result<(), HookError> {
    if slot.app != core_app {
        return Err(HookError::new(format!(
            "{interface} slots are reserved for the core application"
        )));
    }
    Ok(())
}

/// A descriptor whose hooks are all fixed text.
#[derive(Debug, Clone, Default)]
pub struct CommonInterface {
    /// Descriptor name.
    pub name: &'static str,
    /// One-line description.
    pub summary: &'static str,
    /// MAC snippet for the plug side of a connection.
    pub connected_plug_apparmor: Option<&'static str>,
    /// Syscall snippet for the plug side of a connection.
    pub connected_plug_seccomp: Option<&'static str>,
    /// Only the core application may declare slots.
    pub reserved_for_os: bool,
    /// Auto-connect every eligible pair.
    pub auto_connect: bool,
}

impl CommonInterface {
    /// Turn the declaration into a descriptor.
    pub fn build(self, core_app: &str) -> Interface {
        let Self {
            name,
            summary,
            connected_plug_apparmor,
            connected_plug_seccomp,
            reserved_for_os,
            auto_connect,
        } = self;

        let mut builder = Interface::builder(name).summary(summary);
        if connected_plug_apparmor.is_some() || connected_plug_seccomp.is_some() {
            builder = builder.connected_plug(move |backend, _, _| {
                Ok(match backend {
                    Backend::AppArmor => connected_plug_apparmor.map(str::to_owned),
                    Backend::Seccomp => connected_plug_seccomp.map(str::to_owned),
                    _ => None,
                })
            });
        }
        if reserved_for_os {
            let core_app = core_app.to_owned();
            builder = builder
                .sanitize_slot(move |slot| sanitize_slot_reserved_for_os(name, &core_app, slot));
        }
        if auto_connect {
            builder = builder.auto_connect(|_, _| true);
        }
        builder.build()
    }
}
