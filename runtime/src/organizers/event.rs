//! The `events` organizer: binds named handlers declared in settings.
//!
//! ```json
//! {
//!   "events": {
//!     "this": {
//!       "handlers": {
//!         "afterOpen": "focus",
//!         "beforeClose": ["save", { "handler": "log", "order": -1 }]
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Only the `this` element (the component itself) is bound; other elements
//! belong to a presentation layer and are skipped.

use crate::component::Component;
use crate::organizer::{HookFuture, Organizer};
use organa_core::{ComponentInfo, OrganaError, Result, Settings};
use serde_json::Value;
use std::sync::Arc;

/// Registered name of the event organizer.
pub const EVENT_ORGANIZER: &str = "events";

/// Settings key that activates the event organizer.
pub const EVENTS_KEY: &str = "events";

const SELF_ELEMENT: &str = "this";

/// Binds `settings.events.this.handlers` to the component's named handlers.
#[derive(Debug, Default)]
pub struct EventOrganizer;

impl EventOrganizer {
    /// Create the organizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn bind(component: &Component, settings: &Settings) -> Result<()> {
        let Some(elements) = settings.get(EVENTS_KEY).and_then(Value::as_object) else {
            return Ok(());
        };

        for (element, info) in elements {
            if element != SELF_ELEMENT {
                tracing::debug!(component = component.name(), element, "Skipping non-component event target");
                continue;
            }
            let Some(handlers) = info.get("handlers").and_then(Value::as_object) else {
                continue;
            };
            for (event, entry) in handlers {
                for (name, order) in handler_refs(entry)? {
                    if !component.events().add_named(event, &name, order) {
                        return Err(OrganaError::contract(
                            EVENT_ORGANIZER,
                            format!(
                                "Event handler is not a function. componentName={}, eventName={event}, handler={name}",
                                component.name()
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Flatten a handler entry into `(name, order)` pairs.
fn handler_refs(entry: &Value) -> Result<Vec<(String, i64)>> {
    match entry {
        Value::String(name) => Ok(vec![(name.clone(), 0)]),
        Value::Array(entries) => entries.iter().try_fold(Vec::new(), |mut refs, entry| {
            refs.extend(handler_refs(entry)?);
            Ok(refs)
        }),
        Value::Object(fields) => {
            let name = fields
                .get("handler")
                .and_then(Value::as_str)
                .ok_or_else(|| OrganaError::contract(EVENT_ORGANIZER, "handler entry needs a `handler` name"))?;
            let order = fields.get("order").and_then(Value::as_i64).unwrap_or(0);
            Ok(vec![(name.to_string(), order)])
        },
        other => Err(OrganaError::contract(
            EVENT_ORGANIZER,
            format!("unsupported handler entry: {other}"),
        )),
    }
}

impl Organizer for EventOrganizer {
    fn init<'a>(
        &'a self,
        component: &'a Arc<Component>,
        settings: &'a Settings,
    ) -> HookFuture<'a, ()> {
        Box::pin(async move { Self::bind(component, settings) })
    }

    fn organize<'a>(
        &'a self,
        _event: &'a str,
        component: &'a Arc<Component>,
        settings: &'a Settings,
    ) -> HookFuture<'a, Option<Settings>> {
        Box::pin(async move {
            Self::bind(component, settings)?;
            Ok(None)
        })
    }
}
