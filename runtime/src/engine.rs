//! State engine: lifecycle transitions and `waitFor` coordination.
//!
//! The engine keeps a snapshot (name and state) of every component that has
//! changed state, plus the set of pending waits. Pending waits are indexed by
//! `(name, state)` and `(id, state)` so a state change only re-checks the
//! waits that could have been unblocked by it. Waits whose items carry no
//! name or id sit in an unindexed list that is re-checked on every change.
//!
//! A waitlist is satisfied once every item is ready at the same moment.
//! Satisfied waits are resolved and removed from every index in the same
//! critical section, so each resolves exactly once. Timed-out waits are
//! removed eagerly.

use futures::future::BoxFuture;
use organa_core::{
    ComponentId, ComponentInfo, DetachedNodes, LifecycleState, NodeResolver, OrganaError, Result,
    WaitlistItem,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Future returned by [`StateEngine::wait_for`].
pub type WaitFuture = BoxFuture<'static, Result<()>>;

/// What the engine last saw of a component.
#[derive(Clone)]
pub struct ComponentSnapshot {
    /// Component id
    pub id: ComponentId,
    /// Component name
    pub name: String,
    /// State recorded at the last change
    pub state: LifecycleState,
    instance: Weak<dyn ComponentInfo>,
}

impl ComponentSnapshot {
    /// True if the snapshot was taken of `instance`.
    fn is_instance(&self, instance: &Weak<dyn ComponentInfo>) -> bool {
        Weak::ptr_eq(&self.instance, instance)
    }
}

impl std::fmt::Debug for ComponentSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSnapshot")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

type WaitId = u64;

/// Deadline used when `now + timeout` does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Owned by a wait future; removes the wait when the future goes away,
/// whether it completed, timed out or was dropped unfinished.
struct WaitGuard {
    engine: Weak<StateEngine>,
    id: WaitId,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        let removed = engine.lock().remove_wait(self.id).is_some();
        if removed {
            tracing::trace!(wait = self.id, "Discarded abandoned wait");
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum IndexKey {
    Name(String, LifecycleState),
    Id(ComponentId, LifecycleState),
    Unindexed,
}

impl IndexKey {
    fn for_item(item: &WaitlistItem) -> Self {
        let state = item.target_state();
        if let Some(id) = &item.id {
            Self::Id(id.clone(), state)
        } else if let Some(name) = &item.name {
            Self::Name(name.clone(), state)
        } else {
            Self::Unindexed
        }
    }
}

struct PendingWait {
    waitlist: Vec<WaitlistItem>,
    keys: Vec<IndexKey>,
    resolve: oneshot::Sender<()>,
}

#[derive(Default)]
struct EngineState {
    components: HashMap<ComponentId, ComponentSnapshot>,
    waiting: HashMap<WaitId, PendingWait>,
    index: HashMap<IndexKey, Vec<WaitId>>,
    next_wait: WaitId,
}

impl EngineState {
    fn upsert(&mut self, component: &Arc<dyn ComponentInfo>, state: LifecycleState) {
        self.components.insert(
            component.id().clone(),
            ComponentSnapshot {
                id: component.id().clone(),
                name: component.name().to_string(),
                state,
                instance: Arc::downgrade(component),
            },
        );
    }

    fn insert_wait(&mut self, waitlist: Vec<WaitlistItem>, resolve: oneshot::Sender<()>) -> WaitId {
        let id = self.next_wait;
        self.next_wait += 1;

        let mut keys: Vec<IndexKey> = waitlist.iter().map(IndexKey::for_item).collect();
        keys.dedup();
        for key in &keys {
            let ids = self.index.entry(key.clone()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        self.waiting.insert(
            id,
            PendingWait {
                waitlist,
                keys,
                resolve,
            },
        );
        id
    }

    fn remove_wait(&mut self, id: WaitId) -> Option<PendingWait> {
        let wait = self.waiting.remove(&id)?;
        for key in &wait.keys {
            if let Some(ids) = self.index.get_mut(key) {
                ids.retain(|w| *w != id);
                if ids.is_empty() {
                    self.index.remove(key);
                }
            }
        }
        Some(wait)
    }

    /// Remove and return the senders of every wait unblocked by `component`
    /// entering `state`.
    fn take_ready(
        &mut self,
        component: &ComponentId,
        name: &str,
        state: LifecycleState,
        resolver: &dyn NodeResolver,
    ) -> Vec<oneshot::Sender<()>> {
        let mut candidates: Vec<WaitId> = [
            IndexKey::Id(component.clone(), state),
            IndexKey::Name(name.to_string(), state),
            IndexKey::Unindexed,
        ]
        .iter()
        .filter_map(|key| self.index.get(key))
        .flatten()
        .copied()
        .collect();
        candidates.sort_unstable();
        candidates.dedup();
        tracing::trace!(candidates = candidates.len(), state = %state, "Processing waiting list");

        let mut ready = Vec::new();
        for id in candidates {
            let satisfied = self
                .waiting
                .get(&id)
                .is_some_and(|wait| self.all_ready(&wait.waitlist, resolver));
            if satisfied {
                ready.extend(self.remove_wait(id).map(|wait| wait.resolve));
            }
        }
        ready
    }

    fn all_ready(&self, waitlist: &[WaitlistItem], resolver: &dyn NodeResolver) -> bool {
        waitlist.iter().all(|item| self.is_ready(item, resolver))
    }

    fn is_ready(&self, item: &WaitlistItem, resolver: &dyn NodeResolver) -> bool {
        let expected = item.target_state();
        self.candidates(item, resolver)
            .into_iter()
            .any(|snapshot| matches_item(item, snapshot, resolver) && snapshot.state.satisfies(expected))
    }

    /// Snapshots an item could refer to: by id, else by name, else by node,
    /// else by instance.
    fn candidates(&self, item: &WaitlistItem, resolver: &dyn NodeResolver) -> Vec<&ComponentSnapshot> {
        if let Some(id) = &item.id {
            return self.components.get(id).into_iter().collect();
        }
        if let Some(name) = &item.name {
            return self.components.values().filter(|s| s.name == *name).collect();
        }
        if let Some(selector) = &item.root_node {
            return resolver
                .resolve(selector)
                .and_then(|id| self.components.get(&id))
                .into_iter()
                .collect();
        }
        if let Some(instance) = item.component.as_ref().and_then(Weak::upgrade) {
            return self.components.get(instance.id()).into_iter().collect();
        }
        Vec::new()
    }

    fn unmet(&self, waitlist: &[WaitlistItem], resolver: &dyn NodeResolver) -> Vec<WaitlistItem> {
        waitlist
            .iter()
            .filter(|item| !self.is_ready(item, resolver))
            .cloned()
            .collect()
    }
}

/// Every discriminator set on `item` must agree with `snapshot`.
fn matches_item(item: &WaitlistItem, snapshot: &ComponentSnapshot, resolver: &dyn NodeResolver) -> bool {
    if item
        .component
        .as_ref()
        .is_some_and(|instance| !snapshot.is_instance(instance))
    {
        return false;
    }
    if item.id.as_ref().is_some_and(|id| *id != snapshot.id) {
        return false;
    }
    if item.name.as_ref().is_some_and(|name| *name != snapshot.name) {
        return false;
    }
    item.root_node
        .as_ref()
        .is_none_or(|selector| resolver.resolve(selector).is_some())
}

/// Coordinates lifecycle transitions and waits between components.
pub struct StateEngine {
    state: Mutex<EngineState>,
    resolver: Arc<dyn NodeResolver>,
    default_timeout: Duration,
}

impl StateEngine {
    /// Create an engine with no node tree and the given default `waitFor` timeout.
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            resolver: Arc::new(DetachedNodes),
            default_timeout,
        }
    }

    /// Use `resolver` to decide which node selectors are present.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn NodeResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Default timeout for waits that do not specify one.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Record `component` in its current state without a transition.
    pub fn register<C: ComponentInfo + 'static>(&self, component: &Arc<C>) {
        let component: Arc<dyn ComponentInfo> = component.clone();
        let state = component.state();
        self.lock().upsert(&component, state);
    }

    /// Move `component` to `new_state` and resolve every wait it unblocks.
    ///
    /// The legality check, the state write and the resolution of waits happen
    /// under one lock, so concurrent changes are serialized.
    ///
    /// # Errors
    ///
    /// Returns [`OrganaError::IllegalTransition`] if the component is in a
    /// transitional state and `new_state` is not one of its successors. The
    /// component's state is left unchanged.
    pub fn change_state<C: ComponentInfo + 'static>(
        &self,
        component: &Arc<C>,
        new_state: LifecycleState,
    ) -> Result<()> {
        let component: Arc<dyn ComponentInfo> = component.clone();
        let ready = {
            let mut state = self.lock();
            let current = component.state();
            if !current.can_transition_to(new_state) {
                tracing::warn!(
                    component = component.name(),
                    from = %current,
                    to = %new_state,
                    "Rejected illegal transition"
                );
                return Err(OrganaError::IllegalTransition {
                    name: component.name().to_string(),
                    from: current,
                    to: new_state,
                });
            }

            component.set_state(new_state);
            state.upsert(&component, new_state);
            state.take_ready(component.id(), component.name(), new_state, &*self.resolver)
        };

        metrics::counter!("organa.state.transitions", "to" => new_state.as_str()).increment(1);
        tracing::debug!(
            component = component.name(),
            id = %component.id(),
            state = %new_state,
            resolved = ready.len(),
            "State changed"
        );

        for resolve in ready {
            // The waiter may have timed out and gone away.
            let _ = resolve.send(());
        }
        Ok(())
    }

    /// Wait until every item of `waitlist` is ready at once.
    ///
    /// The wait is registered before this returns; the timeout counts from
    /// the call, not from the first poll. A waitlist that is already
    /// satisfied returns an immediately-ready future and registers nothing.
    ///
    /// The future fails with [`OrganaError::WaitTimeout`] after `timeout`
    /// (or the engine default), naming `waiter` and the items still unmet,
    /// and with [`OrganaError::WaitAbandoned`] if the engine is cleared first.
    pub fn wait_for(
        self: &Arc<Self>,
        waiter: &str,
        waitlist: Vec<WaitlistItem>,
        timeout: Option<Duration>,
    ) -> WaitFuture {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now + FAR_FUTURE);
        let waiter = waiter.to_string();

        let (id, receiver) = {
            let mut state = self.lock();
            if state.all_ready(&waitlist, &*self.resolver) {
                tracing::trace!(waiter = %waiter, "Waitlist already satisfied");
                return Box::pin(async { Ok(()) });
            }
            let (resolve, receiver) = oneshot::channel();
            (state.insert_wait(waitlist, resolve), receiver)
        };

        metrics::counter!("organa.wait.registered").increment(1);
        tracing::debug!(waiter = %waiter, wait = id, ?timeout, "Registered wait");

        let engine = Arc::clone(self);
        let guard = WaitGuard {
            engine: Arc::downgrade(self),
            id,
        };
        Box::pin(async move {
            let _guard = guard;
            match tokio::time::timeout_at(deadline, receiver).await {
                Ok(Ok(())) => {
                    metrics::counter!("organa.wait.resolved").increment(1);
                    Ok(())
                },
                Ok(Err(_)) => Err(OrganaError::WaitAbandoned { waiter }),
                Err(_) => match engine.expire(id) {
                    // Resolved between the deadline and the expiry.
                    None => Ok(()),
                    Some(unmet) => {
                        metrics::counter!("organa.wait.timeout").increment(1);
                        tracing::warn!(waiter = %waiter, unmet = %unmet, "waitFor timed out");
                        Err(OrganaError::WaitTimeout {
                            waiter,
                            waitlist: unmet,
                            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        })
                    },
                },
            }
        })
    }

    /// Wait for the component `id` to reach `state`.
    pub fn wait_for_single(
        self: &Arc<Self>,
        waiter: &str,
        id: ComponentId,
        state: LifecycleState,
        timeout: Option<Duration>,
    ) -> WaitFuture {
        self.wait_for(waiter, vec![WaitlistItem::with_id(id).in_state(state)], timeout)
    }

    /// Drop a timed-out wait, returning its unmet items (serialized), or
    /// `None` if it already resolved.
    fn expire(&self, id: WaitId) -> Option<String> {
        let mut state = self.lock();
        let wait = state.remove_wait(id)?;
        let unmet = state.unmet(&wait.waitlist, &*self.resolver);
        let unmet = if unmet.is_empty() { wait.waitlist } else { unmet };
        Some(WaitlistItem::describe(&unmet))
    }

    /// True if `component` has been initialised (not in the initial state).
    #[must_use]
    pub fn is_initialized(&self, component: &dyn ComponentInfo) -> bool {
        component.state().is_initialized()
    }

    /// Last recorded state of the component `id`.
    #[must_use]
    pub fn state_of(&self, id: &ComponentId) -> Option<LifecycleState> {
        self.lock().components.get(id).map(|s| s.state)
    }

    /// Last recorded snapshot of the component `id`.
    #[must_use]
    pub fn snapshot(&self, id: &ComponentId) -> Option<ComponentSnapshot> {
        self.lock().components.get(id).cloned()
    }

    /// Number of waits still pending.
    #[must_use]
    pub fn pending_waits(&self) -> usize {
        self.lock().waiting.len()
    }

    /// Number of index entries across all keys.
    #[must_use]
    pub fn indexed_entries(&self) -> usize {
        self.lock().index.values().map(Vec::len).sum()
    }

    /// Forget the snapshot of component `id`. Pending waits are untouched.
    pub fn forget(&self, id: &ComponentId) {
        self.lock().components.remove(id);
    }

    /// Drop every snapshot and pending wait. Pending waits fail with
    /// [`OrganaError::WaitAbandoned`].
    pub fn clear(&self) {
        let dropped = {
            let mut state = self.lock();
            state.components.clear();
            state.index.clear();
            state.waiting.drain().count()
        };
        if dropped > 0 {
            tracing::info!(dropped, "Cleared state engine with pending waits");
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for StateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("StateEngine")
            .field("components", &state.components.len())
            .field("pending_waits", &state.waiting.len())
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use organa_testing::properties::arb_transitions;
    use organa_testing::{StaticNodeResolver, TestComponent};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn snapshot_tracks_component_through_any_request_sequence(requests in arb_transitions(24)) {
            let engine = engine();
            let component = TestComponent::arc("Fuzz");
            engine.register(&component);
            for requested in requests {
                let before = component.state();
                let outcome = engine.change_state(&component, requested);
                prop_assert_eq!(outcome.is_ok(), before.can_transition_to(requested));
                let expected = if outcome.is_ok() { requested } else { before };
                prop_assert_eq!(component.state(), expected);
            }
            prop_assert_eq!(engine.state_of(component.id()), Some(component.state()));
        }
    }

    fn engine() -> Arc<StateEngine> {
        Arc::new(StateEngine::new(Duration::from_secs(5)))
    }

    #[test]
    fn illegal_transition_leaves_state_unchanged() {
        let engine = engine();
        let menu = TestComponent::arc("Menu");
        engine.change_state(&menu, LifecycleState::Opening).unwrap();

        let err = engine.change_state(&menu, LifecycleState::Closed).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Illegal transition. name=Menu, fromState=opening, toState=closed"
        );
        assert_eq!(menu.state(), LifecycleState::Opening);
        assert_eq!(engine.state_of(menu.id()), Some(LifecycleState::Opening));
    }

    #[tokio::test]
    async fn satisfied_waitlist_takes_the_fast_path() {
        let engine = engine();
        let header = TestComponent::arc("Header");
        engine.change_state(&header, LifecycleState::Opened).unwrap();

        engine
            .wait_for("Page", vec![WaitlistItem::named("Header")], None)
            .await
            .unwrap();
        assert_eq!(engine.pending_waits(), 0);
    }

    #[tokio::test]
    async fn wait_resolves_only_when_every_item_is_ready() {
        let engine = engine();
        let a = TestComponent::arc("A");
        let b = TestComponent::arc("B");

        let wait = engine.wait_for(
            "C",
            vec![WaitlistItem::named("A"), WaitlistItem::named("B")],
            None,
        );
        assert_eq!(engine.pending_waits(), 1);

        engine.change_state(&a, LifecycleState::Opened).unwrap();
        assert_eq!(engine.pending_waits(), 1);

        engine.change_state(&b, LifecycleState::Opened).unwrap();
        assert_eq!(engine.pending_waits(), 0);
        assert_eq!(engine.indexed_entries(), 0);
        wait.await.unwrap();
    }

    #[tokio::test]
    async fn started_target_is_met_by_any_later_state() {
        let engine = engine();
        let a = TestComponent::arc("A");
        engine.change_state(&a, LifecycleState::Opened).unwrap();

        engine
            .wait_for(
                "B",
                vec![WaitlistItem::named("A").in_state(LifecycleState::Started)],
                None,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn id_items_ignore_other_instances_with_the_same_name() {
        let engine = engine();
        let first = TestComponent::arc("Tab");
        let second = TestComponent::arc("Tab");

        let wait = engine.wait_for_single("Panel", first.id().clone(), LifecycleState::Opened, None);
        engine.change_state(&second, LifecycleState::Opened).unwrap();
        assert_eq!(engine.pending_waits(), 1);

        engine.change_state(&first, LifecycleState::Opened).unwrap();
        wait.await.unwrap();
    }

    #[tokio::test]
    async fn instance_items_match_the_exact_component() {
        let engine = engine();
        let target = TestComponent::arc("Grid");
        let item = WaitlistItem::instance(&target).in_state(LifecycleState::Started);

        let wait = engine.wait_for("Toolbar", vec![item], None);
        engine.change_state(&target, LifecycleState::Starting).unwrap();
        engine.change_state(&target, LifecycleState::Started).unwrap();
        wait.await.unwrap();
    }

    #[tokio::test]
    async fn root_node_items_need_the_node_to_be_present() {
        let resolver = Arc::new(StaticNodeResolver::new());
        let engine = Arc::new(StateEngine::new(Duration::from_secs(5)).with_resolver(resolver.clone()));
        let nav = TestComponent::arc("Nav");

        let wait = engine.wait_for("Page", vec![WaitlistItem::node("#nav")], None);
        engine.change_state(&nav, LifecycleState::Opened).unwrap();
        assert_eq!(engine.pending_waits(), 1);

        resolver.mount("#nav", nav.id().clone());
        engine.change_state(&nav, LifecycleState::Opened).unwrap();
        wait.await.unwrap();
    }

    #[tokio::test]
    async fn timeout_names_waiter_and_unmet_items() {
        let engine = engine();
        let a = TestComponent::arc("A");
        engine.change_state(&a, LifecycleState::Opened).unwrap();

        let err = engine
            .wait_for(
                "Page",
                vec![WaitlistItem::named("A"), WaitlistItem::named("Ghost")],
                Some(Duration::from_millis(30)),
            )
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        let message = err.to_string();
        assert!(message.contains("30 milliseconds"), "{message}");
        assert!(message.contains("Ghost"), "{message}");
        assert!(message.contains("name=Page"), "{message}");
        assert!(!message.contains(r#""name":"A""#), "{message}");
        assert_eq!(engine.pending_waits(), 0);
        assert_eq!(engine.indexed_entries(), 0);
    }

    #[tokio::test]
    async fn dropping_a_pending_wait_unregisters_it() {
        let engine = engine();
        let wait = engine.wait_for("Page", vec![WaitlistItem::named("Ghost")], None);
        assert_eq!(engine.pending_waits(), 1);
        assert_eq!(engine.indexed_entries(), 1);

        drop(wait);
        assert_eq!(engine.pending_waits(), 0);
        assert_eq!(engine.indexed_entries(), 0);
    }

    #[tokio::test]
    async fn outer_timeout_unregisters_the_wait() {
        let engine = engine();
        let wait = engine.wait_for(
            "Page",
            vec![WaitlistItem::named("Ghost"), WaitlistItem::node("#ghost")],
            Some(Duration::from_secs(60)),
        );

        let outcome = tokio::time::timeout(Duration::from_millis(5), wait).await;
        assert!(outcome.is_err());
        assert_eq!(engine.pending_waits(), 0);
        assert_eq!(engine.indexed_entries(), 0);
    }

    #[tokio::test]
    async fn oversized_timeout_does_not_overflow_the_deadline() {
        let engine = engine();
        let a = TestComponent::arc("A");
        let wait = engine.wait_for("B", vec![WaitlistItem::named("A")], Some(Duration::MAX));
        engine.change_state(&a, LifecycleState::Opened).unwrap();
        wait.await.unwrap();
    }

    #[tokio::test]
    async fn clear_abandons_pending_waits() {
        let engine = engine();
        let wait = engine.wait_for("Page", vec![WaitlistItem::named("Never")], None);
        engine.clear();
        assert!(matches!(wait.await, Err(OrganaError::WaitAbandoned { .. })));
    }

    #[tokio::test]
    async fn waits_resolve_exactly_once_across_repeated_changes() {
        let engine = engine();
        let a = TestComponent::arc("A");
        let wait = engine.wait_for("B", vec![WaitlistItem::named("A")], None);

        engine.change_state(&a, LifecycleState::Opened).unwrap();
        engine.change_state(&a, LifecycleState::Opened).unwrap();
        wait.await.unwrap();
        assert_eq!(engine.pending_waits(), 0);
    }
}
