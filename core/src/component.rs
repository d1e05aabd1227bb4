//! Component identity and the capability surface the core relies on.
//!
//! The core never owns components. It addresses them through
//! [`ComponentInfo`] (id, name, mutable state) and resolves node selectors
//! through a [`NodeResolver`] supplied by the embedding host.

use crate::lifecycle::LifecycleState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `ComponentId` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid component ID: {0}")]
pub struct ParseComponentIdError(String);

/// Unique identifier for a component instance.
///
/// # Examples
///
/// ```
/// use organa_core::component::ComponentId;
///
/// let id = ComponentId::new("menu-1");
/// assert_eq!(id.as_str(), "menu-1");
///
/// let generated = ComponentId::generate();
/// assert_ne!(generated, ComponentId::generate());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(String);

impl ComponentId {
    /// Create a `ComponentId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ComponentId {
    type Err = ParseComponentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseComponentIdError(
                "Component ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for ComponentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ComponentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// What the state engine needs to know about a component.
pub trait ComponentInfo: Send + Sync {
    /// Unique id of the instance.
    fn id(&self) -> &ComponentId;

    /// Component name (shared by every instance of the same kind).
    fn name(&self) -> &str;

    /// Current lifecycle state.
    fn state(&self) -> LifecycleState;

    /// Overwrite the lifecycle state. Legality is checked by the caller.
    fn set_state(&self, state: LifecycleState);
}

/// Resolves a node selector to the component mounted there, if any.
///
/// Stands in for the host document: a selector that resolves to `Some`
/// is "present".
pub trait NodeResolver: Send + Sync {
    /// Id of the component mounted at `selector`, or `None` if nothing matches.
    fn resolve(&self, selector: &str) -> Option<ComponentId>;
}

/// Resolver for hosts without a node tree. Nothing is ever present.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedNodes;

impl NodeResolver for DetachedNodes {
    fn resolve(&self, _selector: &str) -> Option<ComponentId> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_id_is_rejected_when_parsing() {
        assert!("".parse::<ComponentId>().is_err());
        assert_eq!("a".parse::<ComponentId>(), Ok(ComponentId::new("a")));
    }

    #[test]
    fn detached_nodes_resolve_nothing() {
        assert_eq!(DetachedNodes.resolve("#main"), None);
    }
}
