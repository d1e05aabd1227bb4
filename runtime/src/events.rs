//! Event handlers attached to a component.
//!
//! Handlers are async closures keyed by event name. Triggering an event runs
//! its handlers one after another in ascending order (registration order
//! breaks ties), stopping at the first failure.
//!
//! A component can also define *named* handlers that settings refer to by
//! name, e.g. `{"events": {"this": {"handlers": {"afterOpen": "focus"}}}}`.

use crate::component::Component;
use crate::organizer::HookFuture;
use organa_core::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

/// An event handler: receives the component and the trigger options.
pub type EventHandler = Arc<dyn Fn(Arc<Component>, Value) -> HookFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as an [`EventHandler`].
///
/// ```
/// use organa_runtime::events::handler;
///
/// let on_open = handler(|_component, options| async move {
///     assert!(options.is_object());
///     Ok(())
/// });
/// # let _ = on_open;
/// ```
pub fn handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Arc<Component>, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(
        move |component: Arc<Component>, options: Value| -> HookFuture<'static, ()> {
            Box::pin(f(component, options))
        },
    )
}

#[derive(Clone)]
struct Listener {
    handler: EventHandler,
    order: i64,
    seq: u64,
    label: Option<String>,
}

#[derive(Default)]
struct Tables {
    listeners: HashMap<String, Vec<Listener>>,
    named: HashMap<String, EventHandler>,
    next_seq: u64,
}

/// Handler tables of one component.
#[derive(Default)]
pub struct EventHandlers {
    tables: RwLock<Tables>,
}

impl EventHandlers {
    /// Empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to `event` with `handler` at position `order`.
    pub fn add(&self, event: &str, handler: EventHandler, order: i64) {
        self.insert(event, handler, order, None);
    }

    /// Listen to `event` with the named handler `name`, unless it is already
    /// listening. Returns `false` if `name` is not defined.
    pub fn add_named(&self, event: &str, name: &str, order: i64) -> bool {
        let Some(handler) = self.named(name) else {
            return false;
        };
        if !self.is_installed(event, name) {
            self.insert(event, handler, order, Some(name.to_string()));
        }
        true
    }

    /// Define a named handler.
    pub fn define(&self, name: impl Into<String>, handler: EventHandler) {
        self.write().named.insert(name.into(), handler);
    }

    /// Look up a named handler.
    #[must_use]
    pub fn named(&self, name: &str) -> Option<EventHandler> {
        self.read().named.get(name).cloned()
    }

    /// True if the named handler `name` listens to `event`.
    #[must_use]
    pub fn is_installed(&self, event: &str, name: &str) -> bool {
        self.read()
            .listeners
            .get(event)
            .is_some_and(|ls| ls.iter().any(|l| l.label.as_deref() == Some(name)))
    }

    /// Handlers for `event`, in the order they run.
    #[must_use]
    pub fn listeners(&self, event: &str) -> Vec<EventHandler> {
        self.read()
            .listeners
            .get(event)
            .map(|ls| ls.iter().map(|l| Arc::clone(&l.handler)).collect())
            .unwrap_or_default()
    }

    /// Number of handlers listening to `event`.
    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        self.read().listeners.get(event).map_or(0, Vec::len)
    }

    /// Remove every listener (named definitions are kept).
    pub fn clear(&self) {
        self.write().listeners.clear();
    }

    fn insert(&self, event: &str, handler: EventHandler, order: i64, label: Option<String>) {
        let mut tables = self.write();
        let seq = tables.next_seq;
        tables.next_seq += 1;
        let listeners = tables.listeners.entry(event.to_string()).or_default();
        listeners.push(Listener {
            handler,
            order,
            seq,
            label,
        });
        listeners.sort_by_key(|l| (l.order, l.seq));
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.read();
        let mut events: Vec<_> = tables.listeners.keys().cloned().collect();
        events.sort();
        f.debug_struct("EventHandlers")
            .field("events", &events)
            .field("named", &tables.named.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> EventHandler {
        handler(|_, _| async { Ok(()) })
    }

    #[test]
    fn listeners_sorted_by_order_then_registration() {
        let events = EventHandlers::new();
        let late = noop();
        let early = noop();
        let tie = noop();
        events.add("afterOpen", Arc::clone(&late), 10);
        events.add("afterOpen", Arc::clone(&early), -1);
        events.add("afterOpen", Arc::clone(&tie), 10);

        let order = events.listeners("afterOpen");
        assert!(Arc::ptr_eq(&order[0], &early));
        assert!(Arc::ptr_eq(&order[1], &late));
        assert!(Arc::ptr_eq(&order[2], &tie));
    }

    #[test]
    fn named_handlers_install_once() {
        let events = EventHandlers::new();
        assert!(!events.add_named("afterOpen", "focus", 0));

        events.define("focus", noop());
        assert!(events.add_named("afterOpen", "focus", 0));
        assert!(events.add_named("afterOpen", "focus", 0));
        assert_eq!(events.count("afterOpen"), 1);
        assert!(events.is_installed("afterOpen", "focus"));
        assert!(!events.is_installed("beforeOpen", "focus"));
    }
}
