//! The settings phase.
//!
//! Runs before every other organizer. On initialisation it replaces the
//! component's store contents with its start settings and chains the store
//! to the runtime settings unless `settings.useGlobalSettings` is `false`.
//! On the events it targets it asks an optional [`SettingsLoader`] for more
//! settings (for instance a remote settings file) and merges whatever comes
//! back.

use crate::component::Component;
use crate::organizer::{HookFuture, Organizer, OrganizerBinding};
use organa_core::merge::merged;
use organa_core::{ChainableStore, Settings, TargetEvents};
use serde_json::Value;
use std::sync::Arc;

/// Set to `false` to keep a component's store off the runtime settings.
pub const USE_GLOBAL_SETTINGS_KEY: &str = "settings.useGlobalSettings";

/// Supplies additional settings during the settings phase.
pub trait SettingsLoader: Send + Sync {
    /// Settings to merge into `component`, or `None` for nothing.
    fn load<'a>(
        &'a self,
        event: &'a str,
        component: &'a Arc<Component>,
        settings: &'a Settings,
    ) -> HookFuture<'a, Option<Settings>>;
}

/// Organizer that runs ahead of every chain.
pub struct SettingsOrganizer {
    events: TargetEvents,
    loader: Option<Arc<dyn SettingsLoader>>,
}

impl SettingsOrganizer {
    /// Settings phase that reacts to `events`, optionally backed by `loader`.
    #[must_use]
    pub fn new(events: TargetEvents, loader: Option<Arc<dyn SettingsLoader>>) -> Self {
        Self { events, loader }
    }

    /// Whether the settings phase runs for `event`.
    #[must_use]
    pub fn handles(&self, event: &str) -> bool {
        self.events.matches(event)
    }
}

impl Organizer for SettingsOrganizer {
    fn init<'a>(
        &'a self,
        component: &'a Arc<Component>,
        settings: &'a Settings,
    ) -> HookFuture<'a, ()> {
        Box::pin(async move {
            let store = component.settings();
            store.replace(settings.clone());

            let use_global = store
                .get_local(USE_GLOBAL_SETTINGS_KEY)
                .as_ref()
                .and_then(Value::as_bool)
                .unwrap_or(true);
            if use_global {
                let global: Arc<dyn ChainableStore> = component.runtime().settings().clone();
                store.chain(&global)?;
            } else {
                store.unchain();
            }
            Ok(())
        })
    }

    fn organize<'a>(
        &'a self,
        event: &'a str,
        component: &'a Arc<Component>,
        settings: &'a Settings,
    ) -> HookFuture<'a, Option<Settings>> {
        Box::pin(async move {
            let Some(loader) = &self.loader else {
                return Ok(None);
            };
            let Some(extra) = loader.load(event, component, settings).await? else {
                return Ok(None);
            };
            tracing::debug!(event, "Settings phase loaded additional settings");
            component.settings().merge([extra.clone()]);
            Ok(Some(merged(settings, extra)))
        })
    }

    fn is_target(&self, event: &str, _binding: &OrganizerBinding) -> bool {
        self.handles(event)
    }
}

impl std::fmt::Debug for SettingsOrganizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsOrganizer")
            .field("events", &self.events)
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}
