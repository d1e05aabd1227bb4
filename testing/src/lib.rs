//! # Organa Testing
//!
//! Testing utilities and helpers for the Organa component framework.
//!
//! This crate provides:
//! - Mock components and node resolvers for driving the state engine directly
//! - Recording organizers that log every hook call into a shared [`CallLog`]
//! - Helpers for recording event handlers and test tracing
//! - proptest strategies for lifecycle states
//!
//! ## Example
//!
//! ```
//! use organa_testing::{CallLog, RecordingOrganizer};
//! use organa_runtime::{Runtime, RuntimeConfig};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let runtime = Runtime::bare(RuntimeConfig::default());
//! let log = CallLog::new();
//! runtime
//!     .register(RecordingOrganizer::new("audit", &log).descriptor("audit", 10))
//!     .unwrap();
//!
//! let component = runtime.component("Form");
//! component.start(json!({"audit": true, "autoOpen": false})).await.unwrap();
//! assert!(log.contains("init:audit"));
//! # });
//! ```

/// Recording and failing organizers
pub mod organizer_mocks;

/// Mock components and node resolvers.
pub mod mocks {
    use organa_core::{ComponentId, ComponentInfo, LifecycleState, NodeResolver};
    use std::collections::HashMap;
    use std::sync::{Arc, PoisonError, RwLock};

    /// Bare [`ComponentInfo`] for exercising the state engine without a runtime.
    ///
    /// # Example
    ///
    /// ```
    /// use organa_testing::mocks::TestComponent;
    /// use organa_core::{ComponentInfo, LifecycleState};
    ///
    /// let menu = TestComponent::arc("Menu");
    /// assert_eq!(menu.state(), LifecycleState::Initial);
    /// ```
    #[derive(Debug)]
    pub struct TestComponent {
        id: ComponentId,
        name: String,
        state: RwLock<LifecycleState>,
    }

    impl TestComponent {
        /// Component called `name` with a fresh id.
        #[must_use]
        pub fn new(name: impl Into<String>) -> Self {
            Self::with_id(ComponentId::generate(), name)
        }

        /// Component called `name` with the given id.
        #[must_use]
        pub fn with_id(id: impl Into<ComponentId>, name: impl Into<String>) -> Self {
            Self {
                id: id.into(),
                name: name.into(),
                state: RwLock::new(LifecycleState::Initial),
            }
        }

        /// [`TestComponent::new`] wrapped in an `Arc`.
        #[must_use]
        pub fn arc(name: impl Into<String>) -> Arc<Self> {
            Arc::new(Self::new(name))
        }
    }

    impl ComponentInfo for TestComponent {
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

    /// Node resolver backed by a mutable selector table.
    #[derive(Debug, Default)]
    pub struct StaticNodeResolver {
        nodes: RwLock<HashMap<String, ComponentId>>,
    }

    impl StaticNodeResolver {
        /// Empty resolver: nothing is mounted.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Mount the component `id` at `selector`.
        pub fn mount(&self, selector: impl Into<String>, id: ComponentId) {
            self.nodes
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(selector.into(), id);
        }

        /// Remove whatever is mounted at `selector`.
        pub fn unmount(&self, selector: &str) {
            self.nodes
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(selector);
        }
    }

    impl NodeResolver for StaticNodeResolver {
        fn resolve(&self, selector: &str) -> Option<ComponentId> {
            self.nodes
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(selector)
                .cloned()
        }
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use crate::organizer_mocks::CallLog;
    use organa_runtime::{EventHandler, handler};

    /// Event handler that appends `"<label>:<event>"` to `log`.
    #[must_use]
    pub fn recording_handler(log: &CallLog, label: &str, event: &str) -> EventHandler {
        let log = log.clone();
        let entry = format!("{label}:{event}");
        handler(move |_, _| {
            let log = log.clone();
            let entry = entry.clone();
            async move {
                log.push(entry);
                Ok(())
            }
        })
    }

    /// Install a test-friendly tracing subscriber honouring `RUST_LOG`.
    ///
    /// Safe to call from every test; only the first call installs anything.
    pub fn init_test_tracing() {
        use tracing_subscriber::EnvFilter;

        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use organa_core::LifecycleState;
    use proptest::prelude::*;

    /// Any lifecycle state.
    pub fn arb_state() -> impl Strategy<Value = LifecycleState> {
        proptest::sample::select(LifecycleState::ALL.to_vec())
    }

    /// A sequence of requested states, as a component might receive them.
    pub fn arb_transitions(max: usize) -> impl Strategy<Value = Vec<LifecycleState>> {
        proptest::collection::vec(arb_state(), 0..max)
    }
}

// Re-export commonly used items
pub use helpers::{init_test_tracing, recording_handler};
pub use mocks::{StaticNodeResolver, TestComponent};
pub use organizer_mocks::{CallLog, RecordingOrganizer};
