//! # Organa Runtime
//!
//! Runtime for the Organa component framework.
//!
//! ## Core Components
//!
//! - **Organizer registry**: every organizer known to the runtime, indexed by target word
//! - **Organizer pipeline**: per-component activation and ordered `organize` chains
//! - **State engine**: lifecycle transitions and `waitFor` coordination between components
//! - **Component**: the lifecycle driver (`start`, `open`, `close`, `stop`, ...)
//! - **Runtime**: the container wiring the above together
//!
//! ## Example
//!
//! ```
//! use organa_runtime::{ComponentInfo, LifecycleState, Runtime, RuntimeConfig};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let runtime = Runtime::new(RuntimeConfig::default());
//! let header = runtime.component("Header");
//! let page = runtime.component("Page");
//!
//! let waiting = tokio::spawn({
//!     let page = page.clone();
//!     async move { page.start(json!({"waitFor": [{"name": "Header"}]})).await }
//! });
//!
//! header.start(json!({})).await.unwrap();
//! waiting.await.unwrap().unwrap();
//! assert_eq!(page.state(), LifecycleState::Opened);
//! # });
//! ```

/// Runtime configuration
pub mod config;

/// Components and their lifecycle
pub mod component;

/// State engine
pub mod engine;

/// Event handlers
pub mod events;

/// Organizer trait and bindings
pub mod organizer;

/// Built-in organizers
pub mod organizers;

/// Per-component organizer pipeline
pub mod pipeline;

/// Organizer registry
pub mod registry;

/// Runtime container
pub mod runtime;

pub use component::Component;
pub use config::RuntimeConfig;
pub use engine::{ComponentSnapshot, StateEngine, WaitFuture};
pub use events::{EventHandler, EventHandlers, handler};
pub use organizer::{HookFuture, Organizer, OrganizerBinding, OrganizerDescriptor};
pub use organizers::{EventOrganizer, SettingsLoader, SettingsOrganizer, StateOrganizer};
pub use pipeline::{OrganizerPipeline, activation_set};
pub use registry::{OrganizerRegistry, Registration};
pub use runtime::{Runtime, RuntimeBuilder};

pub use organa_core::{
    ComponentId, ComponentInfo, LifecycleState, OrganaError, Result, Settings, SettingsStore,
    TargetEvents, WaitlistItem,
};
