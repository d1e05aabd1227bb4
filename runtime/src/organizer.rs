//! The organizer extension point.
//!
//! An organizer is a pluggable component extension. It is *activated* on a
//! component when the component's settings mention one of its target words
//! (or explicitly attach it), then *initialised* once and *organized* on
//! every lifecycle event it targets. Organizers on a component form a chain
//! sorted by ascending order; each may return a replacement settings object
//! which the next one receives.

use crate::component::Component;
use organa_core::{OrganaError, Result, Settings, TargetEvents};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by organizer hooks.
///
/// Hooks return explicit boxed futures so `dyn Organizer` stays object-safe.
pub type HookFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A pluggable component extension.
///
/// # Example
///
/// ```
/// use organa_runtime::{Component, HookFuture, Organizer};
/// use organa_core::Settings;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// struct Stamp;
///
/// impl Organizer for Stamp {
///     fn organize<'a>(
///         &'a self,
///         _event: &'a str,
///         _component: &'a Arc<Component>,
///         settings: &'a Settings,
///     ) -> HookFuture<'a, Option<Settings>> {
///         Box::pin(async move {
///             let mut next = settings.clone();
///             next["stamped"] = json!(true);
///             Ok(Some(next))
///         })
///     }
/// }
/// ```
pub trait Organizer: Send + Sync {
    /// Called once, right after the organizer is bound to `component`.
    fn init<'a>(
        &'a self,
        component: &'a Arc<Component>,
        settings: &'a Settings,
    ) -> HookFuture<'a, ()> {
        let _ = (component, settings);
        Box::pin(async { Ok(()) })
    }

    /// Called for every targeted lifecycle event.
    ///
    /// Returning `Some` replaces the settings seen by later organizers in the
    /// chain; `None` leaves them unchanged.
    fn organize<'a>(
        &'a self,
        event: &'a str,
        component: &'a Arc<Component>,
        settings: &'a Settings,
    ) -> HookFuture<'a, Option<Settings>>;

    /// Whether this organizer reacts to `event` on the component it is bound to.
    fn is_target(&self, event: &str, binding: &OrganizerBinding) -> bool {
        binding.target_events.matches(event)
    }
}

/// Registration record for an organizer.
#[derive(Clone)]
pub struct OrganizerDescriptor {
    /// Unique name; also the key under `settings.organizers`
    pub name: String,
    /// Top-level settings keys whose presence activates the organizer
    pub target_keys: BTreeSet<String>,
    /// Lifecycle events the organizer reacts to
    pub target_events: TargetEvents,
    /// Position in the chain, ascending
    pub order: i64,
    /// The organizer itself
    pub organizer: Arc<dyn Organizer>,
}

impl OrganizerDescriptor {
    /// Describe `organizer` under `name` with no target words, no target
    /// events and order 0.
    pub fn new(name: impl Into<String>, organizer: Arc<dyn Organizer>) -> Self {
        Self {
            name: name.into(),
            target_keys: BTreeSet::new(),
            target_events: TargetEvents::none(),
            order: 0,
            organizer,
        }
    }

    /// Add a target word.
    #[must_use]
    pub fn with_target_key(mut self, key: impl Into<String>) -> Self {
        self.target_keys.insert(key.into());
        self
    }

    /// Set the target events.
    #[must_use]
    pub fn with_target_events(mut self, events: TargetEvents) -> Self {
        self.target_events = events;
        self
    }

    /// Set the order.
    #[must_use]
    pub const fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }
}

impl fmt::Debug for OrganizerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrganizerDescriptor")
            .field("name", &self.name)
            .field("target_keys", &self.target_keys)
            .field("target_events", &self.target_events)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

/// An organizer activated on one component.
///
/// Carries the descriptor values with the component's override from
/// `settings.organizers.<name>` applied.
#[derive(Clone)]
pub struct OrganizerBinding {
    /// Organizer name
    pub name: String,
    /// Effective order
    pub order: i64,
    /// Registration sequence, used to break order ties
    pub seq: u64,
    /// Effective target events
    pub target_events: TargetEvents,
    /// The override object (or `Null` when the component has none)
    pub config: Value,
    /// The organizer itself
    pub organizer: Arc<dyn Organizer>,
}

impl OrganizerBinding {
    /// Bind `descriptor` using the component override, if any.
    ///
    /// Recognised override keys are `order` (integer) and `targetEvents`
    /// (`"*"`, a string or an array of strings). Everything else is kept in
    /// [`config`](Self::config) for the organizer to read.
    ///
    /// # Errors
    ///
    /// Returns [`OrganaError::OrganizerContract`] if the override is not an
    /// object or carries a malformed `order` or `targetEvents`.
    pub fn bind(descriptor: &OrganizerDescriptor, seq: u64, config: Option<&Value>) -> Result<Self> {
        let mut binding = Self {
            name: descriptor.name.clone(),
            order: descriptor.order,
            seq,
            target_events: descriptor.target_events.clone(),
            config: Value::Null,
            organizer: Arc::clone(&descriptor.organizer),
        };

        let Some(config) = config else {
            return Ok(binding);
        };
        let Some(fields) = config.as_object() else {
            return Err(OrganaError::contract(
                &descriptor.name,
                "override must be an object",
            ));
        };

        if let Some(order) = fields.get("order") {
            binding.order = order.as_i64().ok_or_else(|| {
                OrganaError::contract(&descriptor.name, format!("order must be an integer, got {order}"))
            })?;
        }
        if let Some(events) = fields.get("targetEvents") {
            binding.target_events = serde_json::from_value(events.clone()).map_err(|e| {
                OrganaError::contract(&descriptor.name, format!("invalid targetEvents: {e}"))
            })?;
        }
        binding.config = config.clone();
        Ok(binding)
    }

    /// Whether the bound organizer reacts to `event`.
    #[must_use]
    pub fn is_target(&self, event: &str) -> bool {
        self.organizer.is_target(event, self)
    }

    /// Chain sort key: ascending order, then registration sequence.
    #[must_use]
    pub const fn sort_key(&self) -> (i64, u64) {
        (self.order, self.seq)
    }
}

impl fmt::Debug for OrganizerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrganizerBinding")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("seq", &self.seq)
            .field("target_events", &self.target_events)
            .finish_non_exhaustive()
    }
}
