//! Organizer registry.
//!
//! Holds every registered organizer and indexes them by target word so the
//! activation pass can find candidates from a settings object's top-level
//! keys without scanning the whole registry.

use crate::organizer::OrganizerDescriptor;
use organa_core::{OrganaError, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A registered organizer.
#[derive(Debug, Clone)]
pub struct Registration {
    /// What was registered
    pub descriptor: OrganizerDescriptor,
    /// Registration sequence number, stable across re-registration
    pub seq: u64,
}

impl Registration {
    /// Sort key used to order organizers: `(order, seq)`.
    #[must_use]
    pub const fn sort_key(&self) -> (i64, u64) {
        (self.descriptor.order, self.seq)
    }
}

#[derive(Default)]
struct RegistryInner {
    items: HashMap<String, Arc<Registration>>,
    target_words: HashMap<String, Vec<String>>,
    next_seq: u64,
}

/// Registry of organizers, shared by every component of a runtime.
#[derive(Default)]
pub struct OrganizerRegistry {
    inner: RwLock<RegistryInner>,
}

impl OrganizerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an organizer.
    ///
    /// Registering a name again replaces the descriptor but keeps the
    /// original sequence number, so tie-breaking is unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`OrganaError::OrganizerContract`] if the name is empty.
    pub fn register(&self, descriptor: OrganizerDescriptor) -> Result<()> {
        if descriptor.name.is_empty() {
            return Err(OrganaError::contract("", "organizer name cannot be empty"));
        }
        self.insert(descriptor);
        Ok(())
    }

    pub(crate) fn insert(&self, descriptor: OrganizerDescriptor) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let name = descriptor.name.clone();

        let seq = match inner.items.get(&name).map(|existing| existing.seq) {
            Some(seq) => seq,
            None => {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                seq
            },
        };

        for names in inner.target_words.values_mut() {
            names.retain(|n| *n != name);
        }
        inner.target_words.retain(|_, names| !names.is_empty());
        for key in &descriptor.target_keys {
            inner
                .target_words
                .entry(key.clone())
                .or_default()
                .push(name.clone());
        }

        tracing::debug!(organizer = %name, order = descriptor.order, seq, "Registered organizer");
        inner
            .items
            .insert(name, Arc::new(Registration { descriptor, seq }));
    }

    /// Look up a registration by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Registration>> {
        self.read().items.get(name).cloned()
    }

    /// Registrations whose target words include `key`, in chain order.
    #[must_use]
    pub fn by_target_word(&self, key: &str) -> Vec<Arc<Registration>> {
        let inner = self.read();
        let mut found: Vec<_> = inner
            .target_words
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|name| inner.items.get(name).cloned())
            .collect();
        found.sort_by_key(|r| r.sort_key());
        found
    }

    /// Registrations whose descriptor targets `event`, in chain order.
    #[must_use]
    pub fn by_event(&self, event: &str) -> Vec<Arc<Registration>> {
        let mut found: Vec<_> = self
            .read()
            .items
            .values()
            .filter(|r| r.descriptor.target_events.matches(event))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.sort_key());
        found
    }

    /// Every registered name, in chain order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut all: Vec<_> = self.read().items.values().cloned().collect();
        all.sort_by_key(|r| r.sort_key());
        all.into_iter().map(|r| r.descriptor.name.clone()).collect()
    }

    /// Number of registered organizers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for OrganizerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrganizerRegistry")
            .field("organizers", &self.names())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::organizer::{HookFuture, Organizer};
    use organa_core::{Settings, TargetEvents};

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

    fn describe(name: &str, key: &str, order: i64) -> OrganizerDescriptor {
        OrganizerDescriptor::new(name, Arc::new(Noop))
            .with_target_key(key)
            .with_order(order)
    }

    #[test]
    fn empty_name_is_rejected() {
        let registry = OrganizerRegistry::new();
        assert!(matches!(
            registry.register(describe("", "x", 0)),
            Err(OrganaError::OrganizerContract { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn target_word_lookup_is_sorted_by_order_then_seq() {
        let registry = OrganizerRegistry::new();
        registry.register(describe("late", "layout", 200)).unwrap();
        registry.register(describe("tie-b", "layout", 100)).unwrap();
        registry.register(describe("tie-a", "layout", 100)).unwrap();
        registry.register(describe("other", "theme", 1)).unwrap();

        let names: Vec<_> = registry
            .by_target_word("layout")
            .iter()
            .map(|r| r.descriptor.name.clone())
            .collect();
        assert_eq!(names, vec!["tie-b", "tie-a", "late"]);
        assert!(registry.by_target_word("missing").is_empty());
    }

    #[test]
    fn re_registering_keeps_seq_and_moves_target_words() {
        let registry = OrganizerRegistry::new();
        registry.register(describe("a", "first", 0)).unwrap();
        registry.register(describe("b", "first", 0)).unwrap();
        registry.register(describe("a", "second", 0)).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("a").unwrap().seq, 0);
        assert_eq!(registry.by_target_word("first").len(), 1);
        assert_eq!(registry.by_target_word("second").len(), 1);
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn event_lookup_uses_descriptor_targets() {
        let registry = OrganizerRegistry::new();
        registry
            .register(describe("all", "x", 1).with_target_events(TargetEvents::All))
            .unwrap();
        registry
            .register(
                describe("open", "y", 0).with_target_events(TargetEvents::only(["beforeOpen"])),
            )
            .unwrap();

        assert_eq!(registry.by_event("beforeOpen").len(), 2);
        assert_eq!(registry.by_event("afterStart").len(), 1);
    }
}
