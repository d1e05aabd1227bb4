//! Per-component organizer pipeline.
//!
//! The pipeline owns the organizers bound to one component. On every
//! lifecycle event it:
//!
//! 1. runs the settings phase, if the event is one it handles
//! 2. activates organizers newly requested by the settings (by target word or
//!    by an explicit `attach`), initialising each once
//! 3. chains `organize` over the bound organizers that target the event, in
//!    ascending `(order, registration)` order, threading the settings through
//!
//! No lock is held while a hook runs, so hooks may call back into the
//! component.

use crate::component::Component;
use crate::organizer::{Organizer, OrganizerBinding};
use crate::organizers::SettingsOrganizer;
use crate::registry::{OrganizerRegistry, Registration};
use organa_core::{ComponentInfo, Result, Settings};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

/// Settings key holding per-component organizer overrides.
pub const ORGANIZERS_KEY: &str = "organizers";

/// Registrations to activate for `settings`, given the names already bound.
///
/// An organizer is activated when `settings.organizers.<name>.attach` (or
/// `settings.organizers.<name>.settings.attach`) is `true`, or when one of
/// its target words is a top-level key of `settings`. The result is sorted by
/// `(order, registration)`.
#[must_use]
pub fn activation_set(
    registry: &OrganizerRegistry,
    settings: &Settings,
    bound: &HashSet<String>,
) -> Vec<Arc<Registration>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut found = Vec::new();
    let mut consider = |registration: Arc<Registration>| {
        let name = &registration.descriptor.name;
        if !bound.contains(name) && seen.insert(name.clone()) {
            found.push(registration);
        }
    };

    if let Some(overrides) = settings.get(ORGANIZERS_KEY).and_then(Value::as_object) {
        for (name, config) in overrides {
            if is_attached(config) {
                if let Some(registration) = registry.get(name) {
                    consider(registration);
                } else {
                    tracing::debug!(organizer = %name, "Attach requested for unknown organizer");
                }
            }
        }
    }

    if let Some(keys) = settings.as_object() {
        for key in keys.keys() {
            for registration in registry.by_target_word(key) {
                consider(registration);
            }
        }
    }

    found.sort_by_key(|r| r.sort_key());
    found
}

fn is_attached(config: &Value) -> bool {
    let flag = |v: Option<&Value>| v.and_then(Value::as_bool).unwrap_or(false);
    flag(config.get("attach")) || flag(config.get("settings").and_then(|s| s.get("attach")))
}

/// Organizers bound to one component.
pub struct OrganizerPipeline {
    registry: Arc<OrganizerRegistry>,
    settings_phase: Arc<SettingsOrganizer>,
    bindings: RwLock<Vec<Arc<OrganizerBinding>>>,
}

impl OrganizerPipeline {
    /// Empty pipeline drawing organizers from `registry`.
    #[must_use]
    pub fn new(registry: Arc<OrganizerRegistry>, settings_phase: Arc<SettingsOrganizer>) -> Self {
        Self {
            registry,
            settings_phase,
            bindings: RwLock::new(Vec::new()),
        }
    }

    /// Reset the bindings, run the settings phase initialisation, then
    /// activate and organize for the wildcard event.
    ///
    /// # Errors
    ///
    /// Propagates the first organizer failure.
    pub async fn init(&self, component: &Arc<Component>, settings: Settings) -> Result<Settings> {
        self.reset();
        self.settings_phase.init(component, &settings).await?;
        self.activate_and_organize("*", component, settings).await
    }

    /// Run the pipeline for `event`.
    ///
    /// # Errors
    ///
    /// Propagates the first organizer failure; later organizers do not run.
    pub async fn call(&self, event: &str, component: &Arc<Component>, settings: Settings) -> Result<Settings> {
        let mut settings = settings;
        if self.settings_phase.handles(event) {
            if let Some(next) = self.settings_phase.organize(event, component, &settings).await? {
                settings = next;
            }
        }
        self.activate_and_organize(event, component, settings).await
    }

    /// Activate newly requested organizers, then chain `organize` over every
    /// bound organizer that targets `event`.
    ///
    /// # Errors
    ///
    /// Returns [`organa_core::OrganaError::OrganizerContract`] for a malformed override,
    /// or the first hook failure.
    pub async fn activate_and_organize(
        &self,
        event: &str,
        component: &Arc<Component>,
        settings: Settings,
    ) -> Result<Settings> {
        self.activate(component, &settings).await?;

        let chain: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|binding| binding.is_target(event))
            .collect();

        let mut settings = settings;
        for binding in chain {
            metrics::counter!("organa.organizer.invocations", "organizer" => binding.name.clone())
                .increment(1);
            tracing::trace!(component = component.name(), organizer = %binding.name, event, "Organizing");
            if let Some(next) = binding.organizer.organize(event, component, &settings).await? {
                settings = next;
            }
        }
        Ok(settings)
    }

    async fn activate(&self, component: &Arc<Component>, settings: &Settings) -> Result<()> {
        let bound: HashSet<String> = self.snapshot().iter().map(|b| b.name.clone()).collect();
        let registrations = activation_set(&self.registry, settings, &bound);
        if registrations.is_empty() {
            return Ok(());
        }

        // Validate every override before anything is bound.
        let overrides = settings.get(ORGANIZERS_KEY);
        let mut bindings = registrations
            .iter()
            .map(|r| {
                let config = overrides.and_then(|o| o.get(&r.descriptor.name));
                OrganizerBinding::bind(&r.descriptor, r.seq, config).map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;
        bindings.sort_by_key(|b| b.sort_key());

        for binding in bindings {
            {
                let mut current = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
                if current.iter().any(|b| b.name == binding.name) {
                    continue;
                }
                current.push(Arc::clone(&binding));
                current.sort_by_key(|b| b.sort_key());
            }
            tracing::debug!(
                component = component.name(),
                organizer = %binding.name,
                order = binding.order,
                "Activated organizer"
            );
            binding.organizer.init(component, settings).await?;
        }
        Ok(())
    }

    /// Names of the bound organizers, in chain order.
    #[must_use]
    pub fn bound(&self) -> Vec<String> {
        self.snapshot().iter().map(|b| b.name.clone()).collect()
    }

    /// The binding for `name`, if bound.
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<Arc<OrganizerBinding>> {
        self.snapshot().into_iter().find(|b| b.name == name)
    }

    /// Drop every binding.
    pub fn reset(&self) {
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn snapshot(&self) -> Vec<Arc<OrganizerBinding>> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for OrganizerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrganizerPipeline")
            .field("bound", &self.bound())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::organizer::{HookFuture, OrganizerDescriptor};
    use serde_json::json;

    struct Noop;

    impl Organizer for Noop {
        fn organize<'a>(
            &'a self,
            _event: &'a str,
            _component: &'a Arc<Component>,
            _settings: &'a Settings,
        ) -> HookFuture<'a, Option<Settings>> {
            Box::pin(async { Ok(None) })
        }
    }

    fn registry() -> OrganizerRegistry {
        let registry = OrganizerRegistry::new();
        for (name, key, order) in [("layout", "layout", 20), ("theme", "theme", 10), ("hidden", "nothing", 5)] {
            registry
                .register(
                    OrganizerDescriptor::new(name, Arc::new(Noop))
                        .with_target_key(key)
                        .with_order(order),
                )
                .unwrap();
        }
        registry
    }

    fn names(found: &[Arc<Registration>]) -> Vec<&str> {
        found.iter().map(|r| r.descriptor.name.as_str()).collect()
    }

    #[test]
    fn target_words_activate_in_order() {
        let found = activation_set(&registry(), &json!({"layout": {}, "theme": "dark"}), &HashSet::new());
        assert_eq!(names(&found), vec!["theme", "layout"]);
    }

    #[test]
    fn attach_flag_activates_without_target_word() {
        let registry = registry();
        let direct = activation_set(
            &registry,
            &json!({"organizers": {"hidden": {"attach": true}}}),
            &HashSet::new(),
        );
        assert_eq!(names(&direct), vec!["hidden"]);

        let nested = activation_set(
            &registry,
            &json!({"organizers": {"hidden": {"settings": {"attach": true}}, "layout": {"attach": false}}}),
            &HashSet::new(),
        );
        assert_eq!(names(&nested), vec!["hidden"]);
    }

    #[test]
    fn bound_and_unknown_organizers_are_skipped() {
        let bound = HashSet::from(["layout".to_string()]);
        let found = activation_set(
            &registry(),
            &json!({"layout": {}, "organizers": {"ghost": {"attach": true}}}),
            &bound,
        );
        assert!(found.is_empty());
    }

    #[test]
    fn nested_keys_do_not_activate() {
        let found = activation_set(&registry(), &json!({"outer": {"layout": {}}}), &HashSet::new());
        assert!(found.is_empty());
    }
}
