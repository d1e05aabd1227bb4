//! The `waitFor` organizer.

use crate::component::Component;
use crate::engine::StateEngine;
use crate::organizer::{HookFuture, Organizer};
use organa_core::{ComponentInfo, OrganaError, Settings, WaitlistItem};
use std::sync::Arc;
use std::time::Duration;

/// Registered name of the state organizer.
pub const STATE_ORGANIZER: &str = "state";

/// Settings key that activates the state organizer.
pub const WAIT_FOR_KEY: &str = "waitFor";

/// Optional per-component timeout for the `waitFor` list, in milliseconds.
pub const WAIT_FOR_TIMEOUT_KEY: &str = "waitForTimeout";

/// Blocks a component's lifecycle until its `waitFor` list is satisfied.
///
/// ```json
/// { "waitFor": [{ "name": "Header" }, { "id": "x1", "state": "started" }] }
/// ```
#[derive(Debug)]
pub struct StateOrganizer {
    engine: Arc<StateEngine>,
}

impl StateOrganizer {
    /// State organizer waiting through `engine`.
    #[must_use]
    pub const fn new(engine: Arc<StateEngine>) -> Self {
        Self { engine }
    }
}

impl Organizer for StateOrganizer {
    fn organize<'a>(
        &'a self,
        event: &'a str,
        component: &'a Arc<Component>,
        settings: &'a Settings,
    ) -> HookFuture<'a, Option<Settings>> {
        Box::pin(async move {
            let Some(raw) = settings.get(WAIT_FOR_KEY) else {
                return Ok(None);
            };
            let waitlist: Vec<WaitlistItem> = serde_json::from_value(raw.clone()).map_err(|e| {
                OrganaError::contract(STATE_ORGANIZER, format!("invalid {WAIT_FOR_KEY}: {e}"))
            })?;
            if waitlist.is_empty() {
                return Ok(None);
            }
            let timeout = settings
                .get(WAIT_FOR_TIMEOUT_KEY)
                .and_then(serde_json::Value::as_u64)
                .map(Duration::from_millis);

            tracing::debug!(
                component = component.name(),
                event,
                items = waitlist.len(),
                "Waiting before continuing lifecycle"
            );
            self.engine.wait_for(component.name(), waitlist, timeout).await?;
            Ok(None)
        })
    }
}
