//! Runtime configuration.
//!
//! Values come from code (builder methods) or from the environment via
//! [`RuntimeConfig::from_env`], falling back to defaults.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::env;
use std::time::Duration;

/// Environment variable overriding the default `waitFor` timeout.
pub const WAIT_TIMEOUT_ENV: &str = "ORGANA_WAIT_TIMEOUT_MS";

/// Configuration shared by every component of a [`Runtime`](crate::Runtime).
///
/// # Example
///
/// ```
/// use organa_runtime::RuntimeConfig;
/// use std::time::Duration;
///
/// let config = RuntimeConfig::default().with_wait_timeout(Duration::from_millis(500));
/// assert_eq!(config.wait_timeout(), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Timeout applied to `waitFor` calls that do not pass one, in milliseconds
    pub wait_timeout_ms: u64,
    /// Order of the built-in state organizer (`waitFor` key)
    pub state_organizer_order: i64,
    /// Order of the built-in event organizer (`events` key)
    pub event_organizer_order: i64,
    /// Events on which the settings phase consults its loader
    pub settings_phase_events: Vec<String>,
    /// Settings every component starts from; caller settings merge on top
    pub component_defaults: Value,
}

impl RuntimeConfig {
    /// Default `waitFor` timeout.
    pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(10_000);

    /// Load configuration from the environment, using defaults for anything unset
    /// or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env::var(WAIT_TIMEOUT_ENV)
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
        {
            config.wait_timeout_ms = ms;
        }
        config
    }

    /// The default `waitFor` timeout.
    #[must_use]
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    /// Set the default `waitFor` timeout.
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout_ms = millis(timeout);
        self
    }

    /// Set the order of the built-in state organizer.
    #[must_use]
    pub const fn with_state_organizer_order(mut self, order: i64) -> Self {
        self.state_organizer_order = order;
        self
    }

    /// Set the order of the built-in event organizer.
    #[must_use]
    pub const fn with_event_organizer_order(mut self, order: i64) -> Self {
        self.event_organizer_order = order;
        self
    }

    /// Set the events on which the settings phase runs its loader.
    #[must_use]
    pub fn with_settings_phase_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings_phase_events = events.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the component defaults.
    #[must_use]
    pub fn with_component_defaults(mut self, defaults: Value) -> Self {
        self.component_defaults = defaults;
        self
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: millis(Self::DEFAULT_WAIT_TIMEOUT),
            state_organizer_order: 120,
            event_organizer_order: 160,
            settings_phase_events: vec!["beforeStart".to_string()],
            component_defaults: json!({
                "autoOpen": true,
                "autoSetupOnStart": false,
                "autoSetup": true,
                "autoRefresh": true,
                "autoFill": false,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.wait_timeout(), Duration::from_secs(10));
        assert_eq!(config.state_organizer_order, 120);
        assert_eq!(config.component_defaults["autoOpen"], json!(true));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: RuntimeConfig = serde_json::from_str(r#"{"waitTimeoutMs": 250}"#).unwrap();
        assert_eq!(config.wait_timeout(), Duration::from_millis(250));
        assert_eq!(config.event_organizer_order, 160);
    }

    #[test]
    fn builder_overrides() {
        let config = RuntimeConfig::default()
            .with_state_organizer_order(5)
            .with_settings_phase_events(["afterSettingsLoad"]);
        assert_eq!(config.state_organizer_order, 5);
        assert_eq!(config.settings_phase_events, vec!["afterSettingsLoad".to_string()]);
    }

    #[test]
    fn oversized_timeout_saturates() {
        let config = RuntimeConfig::default().with_wait_timeout(Duration::MAX);
        assert_eq!(config.wait_timeout_ms, u64::MAX);
        assert_eq!(config.wait_timeout(), Duration::from_millis(u64::MAX));
    }
}
