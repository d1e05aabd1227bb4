//! # Organa Core
//!
//! Core types for the Organa component framework.
//!
//! This crate holds the leaf building blocks that the runtime composes:
//!
//! - **Settings**: chainable, dot-path addressed key-value stores with deep merge
//! - **Lifecycle**: the fixed set of component states and their transition rules
//! - **Component identity**: ids, the `ComponentInfo` capability and node resolution
//! - **Waitlists**: the conditions a component can block on
//! - **Targets**: which lifecycle events an organizer reacts to
//! - **Errors**: the shared [`OrganaError`] taxonomy
//!
//! Nothing here schedules work. The organizer pipeline and the state engine
//! live in `organa-runtime`.
//!
//! ## Example
//!
//! ```
//! use organa_core::{LifecycleState, SettingsStore};
//! use serde_json::json;
//!
//! let settings = SettingsStore::from_value(json!({"autoOpen": true}));
//! assert_eq!(settings.flag("autoOpen"), Some(true));
//!
//! assert!(LifecycleState::Opening.can_transition_to(LifecycleState::Opened));
//! assert!(!LifecycleState::Opening.can_transition_to(LifecycleState::Closed));
//! ```

/// Component identity and capabilities
pub mod component;

/// Error taxonomy
pub mod error;

/// Lifecycle states and transition legality
pub mod lifecycle;

/// Deep merge for settings values
pub mod merge;

/// Chainable settings store
pub mod settings;

/// Organizer event targeting
pub mod target;

/// Waitlist items
pub mod waitlist;

pub use component::{ComponentId, ComponentInfo, DetachedNodes, NodeResolver};
pub use error::{OrganaError, Result};
pub use lifecycle::LifecycleState;
pub use settings::{ChainableStore, SettingsStore};
pub use target::TargetEvents;
pub use waitlist::WaitlistItem;

/// Settings value threaded through organizer chains.
pub type Settings = serde_json::Value;
