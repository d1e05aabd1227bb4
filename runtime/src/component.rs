//! Components and their lifecycle.
//!
//! A component moves through
//! `starting → started → opening → opened → closing → closed → stopping → stopped`.
//! Every step fires a named event: the organizer pipeline runs first (and may
//! block, e.g. on `waitFor`), then the component's own handlers.
//!
//! Start sequence: `starting`, organizers initialised, `beforeStart`,
//! optional setup, `afterStart`, `started`, then `open` if `autoOpen`.

use crate::engine::WaitFuture;
use crate::events::{EventHandler, EventHandlers};
use crate::pipeline::OrganizerPipeline;
use crate::runtime::Runtime;
use organa_core::merge::merged;
use organa_core::{
    ChainableStore, ComponentId, ComponentInfo, LifecycleState, Result, Settings, SettingsStore,
    WaitlistItem,
};
use serde_json::{Value, json};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// A framework component.
///
/// Created through [`Runtime::component`]. Lifecycle methods take
/// `self: &Arc<Self>` because organizers and handlers receive the component.
pub struct Component {
    id: ComponentId,
    name: String,
    state: RwLock<LifecycleState>,
    settings: Arc<SettingsStore>,
    pipeline: OrganizerPipeline,
    events: EventHandlers,
    runtime: Arc<Runtime>,
}

impl Component {
    pub(crate) fn new(runtime: Arc<Runtime>, name: String) -> Arc<Self> {
        let settings = Arc::new(SettingsStore::new());
        let global: Arc<dyn ChainableStore> = runtime.settings().clone();
        if let Err(error) = settings.chain(&global) {
            tracing::warn!(component = %name, %error, "Component settings not chained to runtime settings");
        }

        let component = Arc::new(Self {
            id: ComponentId::generate(),
            name,
            state: RwLock::new(LifecycleState::Initial),
            settings,
            pipeline: OrganizerPipeline::new(
                Arc::clone(runtime.registry()),
                Arc::clone(runtime.settings_phase()),
            ),
            events: EventHandlers::new(),
            runtime,
        });
        component.runtime.engine().register(&component);
        component
    }

    /// The component's settings store (chained to the runtime settings).
    #[must_use]
    pub const fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    /// The component's event handler tables.
    #[must_use]
    pub const fn events(&self) -> &EventHandlers {
        &self.events
    }

    /// The runtime the component belongs to.
    #[must_use]
    pub const fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Names of the organizers bound to this component, in chain order.
    #[must_use]
    pub fn organizers(&self) -> Vec<String> {
        self.pipeline.bound()
    }

    /// True once started and not being torn down.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.runtime.engine().is_initialized(self)
    }

    /// Move to `state` through the state engine.
    ///
    /// # Errors
    ///
    /// Returns [`organa_core::OrganaError::IllegalTransition`] if the move is
    /// not legal from the current state.
    pub fn change_state(self: &Arc<Self>, state: LifecycleState) -> Result<()> {
        self.runtime.engine().change_state(self, state)
    }

    /// Wait for `waitlist` on behalf of this component.
    pub fn wait_for(&self, waitlist: Vec<WaitlistItem>, timeout: Option<Duration>) -> WaitFuture {
        self.runtime.engine().wait_for(&self.name, waitlist, timeout)
    }

    /// Listen to `event` with `handler`.
    pub fn on(&self, event: &str, handler: EventHandler) {
        self.events.add(event, handler, 0);
    }

    /// Listen to `event` with `handler` at position `order`.
    pub fn add_event_handler(&self, event: &str, handler: EventHandler, order: i64) {
        self.events.add(event, handler, order);
    }

    /// Define a handler that settings can refer to by `name`.
    pub fn define_handler(&self, name: impl Into<String>, handler: EventHandler) {
        self.events.define(name, handler);
    }

    /// Reset the organizer bindings and activate organizers for `settings`.
    ///
    /// # Errors
    ///
    /// Propagates the first organizer failure.
    pub async fn init_organizers(self: &Arc<Self>, settings: Settings) -> Result<Settings> {
        self.pipeline.init(self, settings).await
    }

    /// Run the organizer pipeline for `event`.
    ///
    /// # Errors
    ///
    /// Propagates the first organizer failure.
    pub async fn call_organizers(self: &Arc<Self>, event: &str, settings: Settings) -> Result<Settings> {
        self.pipeline.call(event, self, settings).await
    }

    /// Run the handlers for `event` in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Propagates the first handler failure.
    pub async fn trigger(self: &Arc<Self>, event: &str, options: &Value) -> Result<()> {
        for handler in self.events.listeners(event) {
            handler(Arc::clone(self), options.clone()).await?;
        }
        Ok(())
    }

    /// Start the component with `settings` merged over the runtime defaults.
    ///
    /// # Errors
    ///
    /// Fails on an illegal transition, an organizer failure (including a
    /// `waitFor` timeout) or a handler failure. The component stays in the
    /// state it had reached.
    #[tracing::instrument(skip(self, settings), fields(component = %self.name))]
    pub async fn start(self: &Arc<Self>, settings: Settings) -> Result<()> {
        let settings = merged(&self.runtime.config().component_defaults, settings);
        let options = json!({});

        self.change_state(LifecycleState::Starting)?;
        self.init_organizers(settings).await?;
        self.fire("beforeStart", &options).await?;
        if self.flag("autoSetupOnStart") {
            self.setup(&options).await?;
        }
        self.fire("afterStart", &options).await?;
        self.change_state(LifecycleState::Started)?;
        tracing::info!("Component started");

        if self.flag("autoOpen") {
            self.open(&options).await?;
        }
        Ok(())
    }

    /// Open the component.
    ///
    /// Setup runs when `autoSetupOnOpen` is set, or when it is unset and
    /// `autoSetup` is. Refresh runs when `autoRefresh` is set.
    ///
    /// # Errors
    ///
    /// Fails on an illegal transition, an organizer or a handler failure.
    #[tracing::instrument(skip(self, options), fields(component = %self.name))]
    pub async fn open(self: &Arc<Self>, options: &Value) -> Result<()> {
        self.change_state(LifecycleState::Opening)?;
        self.fire("beforeOpen", options).await?;

        let setup = self
            .settings
            .flag("autoSetupOnOpen")
            .unwrap_or_else(|| self.flag("autoSetup"));
        if setup {
            self.setup(options).await?;
        }
        if self.flag("autoRefresh") {
            self.refresh(options).await?;
        }

        self.fire("doOpen", options).await?;
        self.fire("afterOpen", options).await?;
        self.change_state(LifecycleState::Opened)?;
        tracing::info!("Component opened");
        Ok(())
    }

    /// Close the component.
    ///
    /// # Errors
    ///
    /// Fails on an illegal transition, an organizer or a handler failure.
    #[tracing::instrument(skip(self, options), fields(component = %self.name))]
    pub async fn close(self: &Arc<Self>, options: &Value) -> Result<()> {
        self.change_state(LifecycleState::Closing)?;
        self.fire("beforeClose", options).await?;
        self.fire("doClose", options).await?;
        self.fire("afterClose", options).await?;
        self.change_state(LifecycleState::Closed)?;
        tracing::info!("Component closed");
        Ok(())
    }

    /// Stop the component, closing it first if it is open.
    ///
    /// # Errors
    ///
    /// Fails on an illegal transition, an organizer or a handler failure.
    #[tracing::instrument(skip(self, options), fields(component = %self.name))]
    pub async fn stop(self: &Arc<Self>, options: &Value) -> Result<()> {
        let was_open = self.state() == LifecycleState::Opened;
        self.change_state(LifecycleState::Stopping)?;
        if was_open {
            self.close(options).await?;
        }
        self.fire("beforeStop", options).await?;
        self.fire("doStop", options).await?;
        self.fire("afterStop", options).await?;
        self.change_state(LifecycleState::Stopped)?;
        tracing::info!("Component stopped");
        Ok(())
    }

    /// Refresh the component, filling it first if `autoFill` is set.
    ///
    /// # Errors
    ///
    /// Propagates organizer and handler failures.
    pub async fn refresh(self: &Arc<Self>, options: &Value) -> Result<()> {
        self.fire("beforeRefresh", options).await?;
        if self.flag("autoFill") {
            self.fire("doFill", options).await?;
        }
        self.fire("doRefresh", options).await?;
        self.fire("afterRefresh", options).await
    }

    /// Set the component up.
    ///
    /// # Errors
    ///
    /// Propagates organizer and handler failures.
    pub async fn setup(self: &Arc<Self>, options: &Value) -> Result<()> {
        self.fire("beforeSetup", options).await?;
        self.fire("doSetup", options).await?;
        self.fire("afterSetup", options).await
    }

    async fn fire(self: &Arc<Self>, event: &str, options: &Value) -> Result<()> {
        tracing::trace!(event, "Firing");
        self.call_organizers(event, self.settings.items()).await?;
        self.trigger(event, options).await
    }

    fn flag(&self, key: &str) -> bool {
        self.settings.flag(key).unwrap_or(false)
    }
}

impl ComponentInfo for Component {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> LifecycleState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::RuntimeConfig;

    #[tokio::test]
    async fn start_without_auto_open_stops_at_started() {
        let runtime = Runtime::new(RuntimeConfig::default());
        let component = runtime.component("Panel");

        component.start(json!({"autoOpen": false})).await.unwrap();
        assert_eq!(component.state(), LifecycleState::Started);
        assert!(component.is_initialized());
    }

    #[tokio::test]
    async fn component_settings_fall_back_to_runtime_settings() {
        let runtime = Runtime::new(RuntimeConfig::default());
        runtime.settings().set("locale", json!("fr"));
        let component = runtime.component("Panel");

        assert_eq!(component.settings().get("locale"), Some(json!("fr")));
        component.settings().set("locale", json!("de"));
        assert_eq!(component.settings().get("locale"), Some(json!("de")));
        assert_eq!(runtime.settings().get("locale"), Some(json!("fr")));
    }

    #[tokio::test]
    async fn stop_from_opened_closes_first() {
        let runtime = Runtime::new(RuntimeConfig::default());
        let component = runtime.component("Panel");
        component.start(json!({})).await.unwrap();
        assert_eq!(component.state(), LifecycleState::Opened);

        component.stop(&json!({})).await.unwrap();
        assert_eq!(component.state(), LifecycleState::Stopped);
    }
}
