//! Chainable key-value settings store.
//!
//! A [`SettingsStore`] holds a JSON object addressed by dot-separated paths
//! (`"system.appBaseUrl"`). A store may be chained to a parent: lookups that
//! miss locally fall through to the parent, so local values always win over
//! inherited ones and explicit `set` calls always win over both.
//!
//! # Example
//!
//! ```
//! use organa_core::settings::{ChainableStore, SettingsStore};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let parent: Arc<dyn ChainableStore> = Arc::new(SettingsStore::from_value(json!({"a": 2, "b": 3})));
//! let local = SettingsStore::from_value(json!({"a": 1}));
//! local.chain(&parent).unwrap();
//!
//! assert_eq!(local.get("a"), Some(json!(1)));
//! assert_eq!(local.get("b"), Some(json!(3)));
//! ```

use crate::error::{OrganaError, Result};
use crate::merge::deep_merge;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Capability required of a store that others may chain to.
pub trait ChainableStore: Send + Sync {
    /// Look a dot-path key up, following this store's own chain on a miss.
    fn lookup(&self, key: &str) -> Option<Value>;

    /// The store this one falls back to, if it is chained and still alive.
    fn parent(&self) -> Option<Arc<dyn ChainableStore>>;
}

/// Per-component settings with dot-path access and optional fallback chain.
pub struct SettingsStore {
    items: RwLock<Value>,
    chain: RwLock<Option<Weak<dyn ChainableStore>>>,
}

impl SettingsStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::from_value(Value::Object(Map::new()))
    }

    /// Create a store holding `items`. A non-object value yields an empty store.
    #[must_use]
    pub fn from_value(items: Value) -> Self {
        let items = if items.is_object() {
            items
        } else {
            Value::Object(Map::new())
        };
        Self {
            items: RwLock::new(items),
            chain: RwLock::new(None),
        }
    }

    /// Get the value at `key`, consulting the chained parent on a local miss.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.get_local(key) {
            return Some(value);
        }
        self.parent().and_then(|parent| parent.lookup(key))
    }

    /// Get the value at `key`, or `default` when absent everywhere.
    #[must_use]
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Get and deserialize the value at `key`. Returns `None` when the value is
    /// absent or has the wrong shape.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Convenience accessor for boolean flags.
    #[must_use]
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|value| value.as_bool())
    }

    /// Get the value at `key` from this store only.
    #[must_use]
    pub fn get_local(&self, key: &str) -> Option<Value> {
        let items = self.read_items();
        lookup_path(&items, key).cloned()
    }

    /// Whether `key` exists locally. The chain is not consulted.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        let items = self.read_items();
        lookup_path(&items, key).is_some()
    }

    /// Whether `key` exists locally or anywhere up the chain.
    #[must_use]
    pub fn has_in_chain(&self, key: &str) -> bool {
        self.has(key) || self.parent().is_some_and(|parent| parent.lookup(key).is_some())
    }

    /// Set `value` at `key`.
    ///
    /// When both the existing value and `value` are objects they are deep
    /// merged; otherwise the existing value is overwritten. Missing or scalar
    /// intermediate path segments are replaced by objects.
    pub fn set(&self, key: &str, value: Value) {
        let mut items = self.write_items();
        let slot = slot_for_path(&mut *items, key);
        if slot.is_object() && value.is_object() {
            deep_merge(slot, value);
        } else {
            *slot = value;
        }
    }

    /// Remove `key` locally, returning the removed value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut items = self.write_items();
        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        let parent = match parent_path {
            Some(path) => lookup_path_mut(&mut *items, path)?,
            None => &mut *items,
        };
        parent.as_object_mut()?.remove(leaf)
    }

    /// Deep merge each of `items` into the store, in order.
    pub fn merge<I>(&self, items: I)
    where
        I: IntoIterator<Item = Value>,
    {
        self.merge_with(items, deep_merge);
    }

    /// Merge each of `items` into the store with a custom merger.
    pub fn merge_with<I, F>(&self, items: I, mut merger: F)
    where
        I: IntoIterator<Item = Value>,
        F: FnMut(&mut Value, Value),
    {
        let mut current = self.write_items();
        for item in items {
            merger(&mut *current, item);
        }
    }

    /// Declare `parent` as the fallback store.
    ///
    /// The store keeps only a weak reference; once the parent is dropped the
    /// chain silently stops contributing values.
    ///
    /// # Errors
    ///
    /// Returns [`OrganaError::NotChainable`] if `parent` is this store or
    /// already falls back to it (the chain would loop).
    pub fn chain(&self, parent: &Arc<dyn ChainableStore>) -> Result<()> {
        let this = std::ptr::from_ref(self).cast::<()>();
        let mut cursor = Some(Arc::clone(parent));
        while let Some(store) = cursor {
            if std::ptr::addr_eq(Arc::as_ptr(&store), this) {
                return Err(OrganaError::NotChainable(
                    "chaining would create a cycle".to_string(),
                ));
            }
            cursor = store.parent();
        }

        *self.chain.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(parent));
        Ok(())
    }

    /// Drop the fallback store.
    pub fn unchain(&self) {
        *self.chain.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Snapshot of the local items.
    #[must_use]
    pub fn items(&self) -> Value {
        self.read_items().clone()
    }

    /// Replace the local items. A non-object value clears the store.
    pub fn replace(&self, items: Value) {
        let items = if items.is_object() {
            items
        } else {
            Value::Object(Map::new())
        };
        *self.write_items() = items;
    }

    /// Remove every local item.
    pub fn clear(&self) {
        self.replace(Value::Object(Map::new()));
    }

    fn read_items(&self) -> RwLockReadGuard<'_, Value> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_items(&self) -> RwLockWriteGuard<'_, Value> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("items", &*self.read_items())
            .field("chained", &self.parent().is_some())
            .finish()
    }
}

impl ChainableStore for SettingsStore {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.get(key)
    }

    fn parent(&self) -> Option<Arc<dyn ChainableStore>> {
        self.chain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }
}

/// Follow a dot path through nested objects. An empty key addresses the root.
#[must_use]
pub fn lookup_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    if key.is_empty() {
        return Some(root);
    }
    key.split('.')
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

fn lookup_path_mut<'a>(root: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    if key.is_empty() {
        return Some(root);
    }
    key.split('.')
        .try_fold(root, |node, segment| node.as_object_mut()?.get_mut(segment))
}

fn slot_for_path<'a>(root: &'a mut Value, key: &str) -> &'a mut Value {
    if key.is_empty() {
        return root;
    }
    let mut node = root;
    for segment in key.split('.') {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            other => other,
        };
    }
    node
}
