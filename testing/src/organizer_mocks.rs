//! Organizers that record what the pipeline does to them.
//!
//! Every hook call is appended to a shared [`CallLog`]:
//! - `init:<label>` when the organizer is bound
//! - `organize:<label>:<event>` for each organize call
//! - `saw:<label>:<key>=<json>` when observing a settings key

#![allow(clippy::module_name_repetitions)]

use organa_core::merge::merged;
use organa_core::{OrganaError, Settings, TargetEvents};
use organa_runtime::{Component, HookFuture, Organizer, OrganizerDescriptor};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Shared, ordered log of calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.lock().push(entry.into());
    }

    /// Copy of every entry, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Entries starting with `prefix`, oldest first.
    #[must_use]
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// True if `entry` was logged.
    #[must_use]
    pub fn contains(&self, entry: &str) -> bool {
        self.lock().iter().any(|e| e == entry)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Organizer that logs its calls and optionally patches settings, observes
/// a key, sleeps or fails.
///
/// # Example
///
/// ```
/// use organa_testing::{CallLog, RecordingOrganizer};
/// use serde_json::json;
///
/// let log = CallLog::new();
/// let descriptor = RecordingOrganizer::new("first", &log)
///     .with_patch(json!({"seenBy": ["first"]}))
///     .descriptor("first", 50);
/// assert_eq!(descriptor.order, 50);
/// ```
#[derive(Debug, Clone)]
pub struct RecordingOrganizer {
    label: String,
    log: CallLog,
    patch: Option<Value>,
    observe: Option<String>,
    fail_on: Option<String>,
    delay: Option<Duration>,
}

impl RecordingOrganizer {
    /// Organizer logging into `log` under `label`.
    #[must_use]
    pub fn new(label: impl Into<String>, log: &CallLog) -> Self {
        Self {
            label: label.into(),
            log: log.clone(),
            patch: None,
            observe: None,
            fail_on: None,
            delay: None,
        }
    }

    /// Merge `patch` into the settings on every organize call.
    #[must_use]
    pub fn with_patch(mut self, patch: Value) -> Self {
        self.patch = Some(patch);
        self
    }

    /// Log the value of `key` in the incoming settings on every organize call.
    #[must_use]
    pub fn observing(mut self, key: impl Into<String>) -> Self {
        self.observe = Some(key.into());
        self
    }

    /// Fail when organizing `event`.
    #[must_use]
    pub fn failing_on(mut self, event: impl Into<String>) -> Self {
        self.fail_on = Some(event.into());
        self
    }

    /// Sleep for `delay` before each organize call returns.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Descriptor registering this organizer under its label, activated by
    /// `key`, targeting every event, at `order`.
    #[must_use]
    pub fn descriptor(self, key: &str, order: i64) -> OrganizerDescriptor {
        OrganizerDescriptor::new(self.label.clone(), Arc::new(self))
            .with_target_key(key)
            .with_target_events(TargetEvents::All)
            .with_order(order)
    }
}

impl Organizer for RecordingOrganizer {
    fn init<'a>(
        &'a self,
        _component: &'a Arc<Component>,
        _settings: &'a Settings,
    ) -> HookFuture<'a, ()> {
        Box::pin(async move {
            self.log.push(format!("init:{}", self.label));
            Ok(())
        })
    }

    fn organize<'a>(
        &'a self,
        event: &'a str,
        _component: &'a Arc<Component>,
        settings: &'a Settings,
    ) -> HookFuture<'a, Option<Settings>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.log.push(format!("organize:{}:{event}", self.label));
            if let Some(key) = &self.observe {
                let seen = settings.get(key).cloned().unwrap_or(Value::Null);
                self.log.push(format!("saw:{}:{key}={seen}", self.label));
            }
            if self.fail_on.as_deref() == Some(event) {
                return Err(OrganaError::organizer(&self.label, format!("refused {event}")));
            }
            Ok(self.patch.clone().map(|patch| merged(settings, patch)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_log_filters_by_prefix() {
        let log = CallLog::new();
        log.push("init:a");
        log.push("organize:a:afterStart");
        log.push("init:b");
        assert_eq!(log.matching("init:"), vec!["init:a", "init:b"]);
        assert!(log.contains("organize:a:afterStart"));
        assert_eq!(log.len(), 3);
    }
}
