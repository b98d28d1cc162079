//! Per-backend policy compilation.
//!
//! For one backend, [`compile`] walks the connections in the order they were
//! made (connected-plug then connected-slot hook of each), then every
//! declared plug and slot (permanent hooks), and accumulates the snippets in
//! a [`Specification`]. Duplicates are kept. Identity placeholders in
//! connected-side snippets are replaced with the confinement labels of the
//! connection's endpoints.

use std::collections::BTreeMap;

use tracing::warn;

use crate::interfaces::{
    Backend, HookError, InterfaceRegistry, SnippetResult, PLUG_SECURITY_TAGS, SLOT_SECURITY_TAGS,
};
use crate::repo::Repository;
use crate::snap::{Connection, PlugInfo, SlotInfo};

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Computes the confinement label of a plug or slot owner.
pub trait LabelResolver: Send + Sync {
    /// Stable label, unique per `(application, name)`.
    fn label(&self, app: &str, name: &str) -> String;
}

/// Default resolver producing `snap.<app>.<name>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityTagResolver;

impl LabelResolver for SecurityTagResolver {
    fn label(&self, app: &str, name: &str) -> String {
        format!("snap.{app}.{name}")
    }
}

// ---------------------------------------------------------------------------
// Specification
// ---------------------------------------------------------------------------

/// Ordered snippets compiled for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specification {
    backend: Backend,
    snippets: Vec<String>,
}

impl Specification {
    /// Empty specification for `backend`.
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            snippets: Vec::new(),
        }
    }

    /// Target backend.
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Append a snippet.
    pub fn add_snippet(&mut self, snippet: impl Into<String>) {
        self.snippets.push(snippet.into());
    }

    /// Snippets in contribution order.
    pub fn snippets(&self) -> &[String] {
        &self.snippets
    }

    /// Consume the specification, returning its snippets.
    pub fn into_snippets(self) -> Vec<String> {
        self.snippets
    }
}

/// Compilation failure for one backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot compile {backend} policy: interface {interface:?}: {source}")]
pub struct CompileError {
    /// Backend whose compilation was aborted.
    pub backend: Backend,
    /// Interface whose hook failed.
    pub interface: String,
    /// Hook failure.
    pub source: HookError,
}

fn substitute(snippet: String, plug_label: &str, slot_label: &str) -> String {
    snippet
        .replace(SLOT_SECURITY_TAGS, slot_label)
        .replace(PLUG_SECURITY_TAGS, plug_label)
}

/// Compile one backend from explicit connections and declarations.
///
/// # Errors
///
/// The first failing hook (or unknown interface) aborts compilation with a
/// [`CompileError`] naming the interface.
pub fn compile(
    backend: Backend,
    registry: &InterfaceRegistry,
    connections: &[Connection],
    plugs: &[PlugInfo],
    slots: &[SlotInfo],
    labels: &dyn LabelResolver,
) -> Result<Specification, CompileError> {
    let fail = |interface: &str, source: HookError| CompileError {
        backend,
        interface: interface.to_owned(),
        source,
    };
    let lookup = |interface: &str| {
        registry
            .get(interface)
            .ok_or_else(|| fail(interface, HookError::new("unknown interface")))
    };
    let mut spec = Specification::new(backend);
    let push = |spec: &mut Specification, interface: &str, result: SnippetResult| {
        match result {
            Ok(Some(snippet)) => {
                spec.add_snippet(snippet);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => Err(fail(interface, e)),
        }
    };

    for conn in connections {
        let name = conn.interface();
        let iface = lookup(name)?;
        let plug_label = labels.label(&conn.plug.info.app, &conn.plug.info.name);
        let slot_label = labels.label(&conn.slot.info.app, &conn.slot.info.name);
        let plug_side = iface
            .connected_plug_snippet(backend, &conn.plug, &conn.slot)
            .map(|s| s.map(|s| substitute(s, &plug_label, &slot_label)));
        push(&mut spec, name, plug_side)?;
        let slot_side = iface
            .connected_slot_snippet(backend, &conn.plug, &conn.slot)
            .map(|s| s.map(|s| substitute(s, &plug_label, &slot_label)));
        push(&mut spec, name, slot_side)?;
    }
    for plug in plugs {
        let iface = lookup(&plug.interface)?;
        push(
            &mut spec,
            &plug.interface,
            iface.permanent_plug_snippet(backend, plug),
        )?;
    }
    for slot in slots {
        let iface = lookup(&slot.interface)?;
        push(
            &mut spec,
            &slot.interface,
            iface.permanent_slot_snippet(backend, slot),
        )?;
    }
    Ok(spec)
}

/// Compile one backend from the repository's current graph.
///
/// # Errors
///
/// See [`compile`].
pub fn compile_repository(
    backend: Backend,
    repo: &Repository,
    labels: &dyn LabelResolver,
) -> Result<Specification, CompileError> {
    compile(
        backend,
        repo.interfaces(),
        &repo.connections(),
        repo.plugs(),
        repo.slots(),
        labels,
    )
}

/// Compile every backend. A failure only affects its own backend.
pub fn compile_all(
    repo: &Repository,
    labels: &dyn LabelResolver,
) -> BTreeMap<Backend, Result<Vec<String>, CompileError>> {
    let connections = repo.connections();
    Backend::ALL
        .iter()
        .map(|backend| {
            let result = compile(
                *backend,
                repo.interfaces(),
                &connections,
                repo.plugs(),
                repo.slots(),
                labels,
            )
            .map(Specification::into_snippets);
            if let Err(e) = &result {
                warn!(backend = %backend, interface = %e.interface, error = %e.source, "backend compilation failed");
            }
            (*backend, result)
        })
        .collect()
}
