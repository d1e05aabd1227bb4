//! Waitlist items: the conditions a component can block on.

use crate::component::{ComponentId, ComponentInfo};
use crate::lifecycle::LifecycleState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};

/// One condition of a waitlist.
///
/// Every discriminator that is set (`component`, `id`, `name`, `root_node`)
/// must match; discriminators left unset are ignored. The target state
/// defaults to `opened`.
///
/// Deserializes from the settings form used under the `waitFor` key:
///
/// ```
/// use organa_core::waitlist::WaitlistItem;
/// use organa_core::lifecycle::LifecycleState;
///
/// let items: Vec<WaitlistItem> =
///     serde_json::from_str(r#"[{"name": "Header"}, {"id": "x1", "state": "started"}]"#).unwrap();
/// assert_eq!(items[0].target_state(), LifecycleState::Opened);
/// assert_eq!(items[1].target_state(), LifecycleState::Started);
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistItem {
    /// Component instance id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ComponentId>,

    /// Component name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Node selector that must be present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_node: Option<String>,

    /// Exact instance to wait for
    #[serde(skip)]
    pub component: Option<Weak<dyn ComponentInfo>>,

    /// Target state; unset (or empty) means `opened`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<LifecycleState>,
}

impl WaitlistItem {
    /// Wait for any component called `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Wait for the component with `id`.
    #[must_use]
    pub fn with_id(id: impl Into<ComponentId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Wait for whatever component is mounted at `selector`.
    #[must_use]
    pub fn node(selector: impl Into<String>) -> Self {
        Self {
            root_node: Some(selector.into()),
            ..Self::default()
        }
    }

    /// Wait for this exact instance.
    #[must_use]
    pub fn instance<C: ComponentInfo + 'static>(component: &Arc<C>) -> Self {
        let component: Arc<dyn ComponentInfo> = component.clone();
        Self {
            id: Some(component.id().clone()),
            component: Some(Arc::downgrade(&component)),
            ..Self::default()
        }
    }

    /// Set the target state.
    #[must_use]
    pub const fn in_state(mut self, state: LifecycleState) -> Self {
        self.state = Some(state);
        self
    }

    /// Target state with the `opened` default applied.
    #[must_use]
    pub fn target_state(&self) -> LifecycleState {
        match self.state {
            None | Some(LifecycleState::Initial) => LifecycleState::Opened,
            Some(state) => state,
        }
    }

    /// Serialize a waitlist for diagnostics, with every target state spelled out.
    #[must_use]
    pub fn describe(items: &[Self]) -> String {
        let resolved: Vec<Self> = items
            .iter()
            .map(|item| item.clone().in_state(item.target_state()))
            .collect();
        serde_json::to_string(&resolved).unwrap_or_else(|_| format!("{items:?}"))
    }
}

impl fmt::Debug for WaitlistItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitlistItem")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("root_node", &self.root_node)
            .field("component", &self.component.as_ref().map(|_| "<instance>"))
            .field("state", &self.target_state())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_state_defaults_to_opened() {
        let item: WaitlistItem = serde_json::from_str(r#"{"name": "A", "state": ""}"#).unwrap();
        assert_eq!(item.target_state(), LifecycleState::Opened);
    }

    #[test]
    fn describe_serializes_discriminators() {
        let list = vec![WaitlistItem::named("Ghost").in_state(LifecycleState::Opened)];
        assert_eq!(
            WaitlistItem::describe(&list),
            r#"[{"name":"Ghost","state":"opened"}]"#
        );
    }

    #[test]
    fn describe_spells_out_default_state() {
        let list = vec![
            WaitlistItem::named("Ghost"),
            WaitlistItem::node("#nav").in_state(LifecycleState::Started),
        ];
        assert_eq!(
            WaitlistItem::describe(&list),
            r##"[{"name":"Ghost","state":"opened"},{"rootNode":"#nav","state":"started"}]"##
        );
    }

    #[test]
    fn root_node_uses_camel_case() {
        let item: WaitlistItem = serde_json::from_str(r##"{"rootNode": "#nav"}"##).unwrap();
        assert_eq!(item.root_node.as_deref(), Some("#nav"));
    }
}
