//! The runtime: shared services for a set of components.
//!
//! Owns the organizer registry, the state engine, the global settings store
//! and the configuration. There is no process-wide instance; every component
//! holds an `Arc` to the runtime that created it.

use crate::component::Component;
use crate::config::RuntimeConfig;
use crate::engine::StateEngine;
use crate::organizer::OrganizerDescriptor;
use crate::organizers::event::{EVENT_ORGANIZER, EVENTS_KEY};
use crate::organizers::state::{STATE_ORGANIZER, WAIT_FOR_KEY};
use crate::organizers::{EventOrganizer, SettingsLoader, SettingsOrganizer, StateOrganizer};
use crate::registry::OrganizerRegistry;
use organa_core::{DetachedNodes, NodeResolver, Result, SettingsStore, TargetEvents};
use std::sync::Arc;

/// Shared services for components.
///
/// # Example
///
/// ```
/// use organa_runtime::{Runtime, RuntimeConfig};
///
/// # tokio_test::block_on(async {
/// let runtime = Runtime::new(RuntimeConfig::default());
/// let header = runtime.component("Header");
/// header.start(serde_json::json!({})).await.unwrap();
/// assert_eq!(header.organizers(), Vec::<String>::new());
/// # });
/// ```
pub struct Runtime {
    config: RuntimeConfig,
    registry: Arc<OrganizerRegistry>,
    engine: Arc<StateEngine>,
    settings: Arc<SettingsStore>,
    settings_phase: Arc<SettingsOrganizer>,
}

impl Runtime {
    /// Runtime with the built-in organizers registered.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Arc<Self> {
        RuntimeBuilder::new(config).build()
    }

    /// Runtime with an empty organizer registry.
    #[must_use]
    pub fn bare(config: RuntimeConfig) -> Arc<Self> {
        RuntimeBuilder::new(config).without_builtins().build()
    }

    /// Start building a runtime.
    #[must_use]
    pub fn builder(config: RuntimeConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(config)
    }

    /// Create a component called `name`.
    #[must_use]
    pub fn component(self: &Arc<Self>, name: impl Into<String>) -> Arc<Component> {
        Component::new(Arc::clone(self), name.into())
    }

    /// Register an organizer.
    ///
    /// # Errors
    ///
    /// Returns [`organa_core::OrganaError::OrganizerContract`] if the name is empty.
    pub fn register(&self, descriptor: OrganizerDescriptor) -> Result<()> {
        self.registry.register(descriptor)
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Organizer registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<OrganizerRegistry> {
        &self.registry
    }

    /// State engine.
    #[must_use]
    pub const fn engine(&self) -> &Arc<StateEngine> {
        &self.engine
    }

    /// Global settings every component store falls back to.
    #[must_use]
    pub const fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub(crate) const fn settings_phase(&self) -> &Arc<SettingsOrganizer> {
        &self.settings_phase
    }

    /// Drop all engine state. Pending waits fail as abandoned.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down runtime");
        self.engine.clear();
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Runtime`].
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    resolver: Arc<dyn NodeResolver>,
    loader: Option<Arc<dyn SettingsLoader>>,
    settings: Arc<SettingsStore>,
    builtins: bool,
}

impl RuntimeBuilder {
    /// Builder with defaults: built-ins on, no node tree, no settings loader.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            resolver: Arc::new(DetachedNodes),
            loader: None,
            settings: Arc::new(SettingsStore::new()),
            builtins: true,
        }
    }

    /// Resolve node selectors with `resolver`.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn NodeResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Consult `loader` during the settings phase.
    #[must_use]
    pub fn with_settings_loader(mut self, loader: Arc<dyn SettingsLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Use `settings` as the global settings store.
    #[must_use]
    pub fn with_settings(mut self, settings: Arc<SettingsStore>) -> Self {
        self.settings = settings;
        self
    }

    /// Skip registering the built-in organizers.
    #[must_use]
    pub const fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }

    /// Build the runtime.
    #[must_use]
    pub fn build(self) -> Arc<Runtime> {
        let engine = Arc::new(StateEngine::new(self.config.wait_timeout()).with_resolver(self.resolver));
        let registry = Arc::new(OrganizerRegistry::new());

        if self.builtins {
            registry.insert(
                OrganizerDescriptor::new(STATE_ORGANIZER, Arc::new(StateOrganizer::new(Arc::clone(&engine))))
                    .with_target_key(WAIT_FOR_KEY)
                    .with_target_events(TargetEvents::only(["afterStart"]))
                    .with_order(self.config.state_organizer_order),
            );
            registry.insert(
                OrganizerDescriptor::new(EVENT_ORGANIZER, Arc::new(EventOrganizer::new()))
                    .with_target_key(EVENTS_KEY)
                    .with_target_events(TargetEvents::only(["beforeOpen"]))
                    .with_order(self.config.event_organizer_order),
            );
        }

        let settings_phase = Arc::new(SettingsOrganizer::new(
            TargetEvents::only(self.config.settings_phase_events.iter().cloned()),
            self.loader,
        ));

        tracing::debug!(organizers = registry.len(), "Runtime built");
        Arc::new(Runtime {
            config: self.config,
            registry,
            engine,
            settings: self.settings,
            settings_phase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_in_order() {
        let runtime = Runtime::new(RuntimeConfig::default());
        assert_eq!(runtime.registry().names(), vec![STATE_ORGANIZER, EVENT_ORGANIZER]);
        assert_eq!(runtime.registry().by_target_word(WAIT_FOR_KEY).len(), 1);
    }

    #[test]
    fn bare_runtime_has_no_organizers() {
        let runtime = Runtime::bare(RuntimeConfig::default());
        assert!(runtime.registry().is_empty());
    }

    #[test]
    fn engine_uses_configured_timeout() {
        let config = RuntimeConfig::default().with_wait_timeout(std::time::Duration::from_millis(75));
        let runtime = Runtime::new(config);
        assert_eq!(runtime.engine().default_timeout(), std::time::Duration::from_millis(75));
    }
}
