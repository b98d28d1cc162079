//! Explicitly constructed startup context.
//!
//! Holds the descriptor table and the process-wide settings. It is built
//! once and threaded through the system state constructor; tests build
//! their own.

use std::fmt;
use std::sync::Arc;

use crate::compiler::{LabelResolver, SecurityTagResolver};
use crate::config::PlugboardConfig;
use crate::interfaces::{builtin, InterfaceRegistry};

/// Application owning hotplug slots unless configured otherwise.
pub const DEFAULT_CORE_APP: &str = "core";

/// Descriptor table plus settings shared by the repository, the hotplug
/// manager and the compiler.
#[derive(Clone)]
pub struct Context {
    /// Registered capability descriptors.
    pub interfaces: Arc<InterfaceRegistry>,
    /// Application that owns hotplug-created slots.
    pub core_app: String,
    /// The "hotplug enabled" feature flag.
    pub hotplug_enabled: bool,
    /// Confinement label collaborator.
    pub labels: Arc<dyn LabelResolver>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("interfaces", &self.interfaces.len())
            .field("core_app", &self.core_app)
            .field("hotplug_enabled", &self.hotplug_enabled)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Context over `interfaces` with hotplug enabled and the default core
    /// application and label resolver.
    pub fn new(interfaces: InterfaceRegistry) -> Self {
        Self {
            interfaces: Arc::new(interfaces),
            core_app: DEFAULT_CORE_APP.to_owned(),
            hotplug_enabled: true,
            labels: Arc::new(SecurityTagResolver),
        }
    }

    /// Context over the built-in catalogue, configured from `config`.
    ///
    /// # Errors
    ///
    /// Fails if the built-in catalogue cannot be registered.
    pub fn from_config(config: &PlugboardConfig) -> anyhow::Result<Self> {
        let registry = builtin::registry(&config.core.app)?;
        Ok(Self::new(registry)
            .with_core_app(&config.core.app)
            .with_hotplug_enabled(config.hotplug.enabled))
    }

    /// Override the core application.
    pub fn with_core_app(mut self, app: impl Into<String>) -> Self {
        self.core_app = app.into();
        self
    }

    /// Override the feature flag.
    pub fn with_hotplug_enabled(mut self, enabled: bool) -> Self {
        self.hotplug_enabled = enabled;
        self
    }

    /// Override the label resolver.
    pub fn with_labels(mut self, labels: Arc<dyn LabelResolver>) -> Self {
        self.labels = labels;
        self
    }
}
