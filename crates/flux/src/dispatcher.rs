//! Dispatcher: routes actions to a fixed registry of stores.
//!
//! This module implements the **dispatch pattern** of the coordination core:
//!
//! ```text
//! invoke(action creator)
//!   ↓
//! dispatch(action, payload)
//!   ↓
//! 1. Validate every registered store can receive actions
//!   ↓
//! 2. Watch every store for its next `change` (before any handler runs)
//!   ↓
//! 3. Run `action:<name>` on every store, in registry order
//!   ↓
//! 4. Settlement resolves once all stores changed → `change:all`
//! ```
//!
//! ## Failure policy
//!
//! Handlers run synchronously. The first handler that fails aborts the
//! dispatch: stores later in the registry never see the action, stores that
//! already ran keep their state (there is no automatic rollback; a handler
//! that needs one can `emit_rollback`), the pending settlement is cancelled and
//! the error is returned to the caller.
//!
//! ## Rollback broadcast
//!
//! On construction the dispatcher listens for `rollback` on every store; any
//! store emitting it makes the dispatcher emit `__rollback` on all stores,
//! itself included.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use fluxcore_core::{FluxError, FluxResult, StoreName};
use fluxcore_events::{CHANGE_ALL, EventChannel, ListenerId, ROLLBACK, ROLLBACK_BROADCAST};

use crate::config::FluxConfig;
use crate::definition::StoreDefinition;
use crate::settlement::{OnSettled, Settlement};
use crate::store::{Store, WeakStore};

/// Action creator registered on a dispatcher.
pub type ActionCallback =
    Arc<dyn Fn(&ActionScope<'_>, Value) -> FluxResult<Settlement> + Send + Sync>;

/// Names that cannot be registered as actions.
pub const RESERVED_ACTIONS: &[&str] = &[
    "dispatch",
    "wait_for",
    "wait_for_timeout",
    "register_action",
    "invoke",
    "get_store",
    "get_stores",
    "stores",
    "on",
    "off",
    "emit",
];

const DISPATCHER_OWNER: &str = "dispatcher";

struct DispatcherInner {
    stores: Vec<(StoreName, Store)>,
    listener: EventChannel<Value>,
    actions: RwLock<HashMap<String, ActionCallback>>,
    config: FluxConfig,
    rollback_wiring: Vec<(WeakStore, ListenerId)>,
}

impl Drop for DispatcherInner {
    fn drop(&mut self) {
        for (store, id) in self.rollback_wiring.drain(..) {
            if let Some(store) = store.upgrade() {
                store.listener().off(id);
            }
        }
    }
}

/// Owner of a store registry. `Clone` shares the same dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub fn new<N>(stores: impl IntoIterator<Item = (N, Store)>) -> FluxResult<Self>
    where
        N: Into<String>,
    {
        Self::with_config(stores, FluxConfig::default())
    }

    /// Build a dispatcher over `stores` (registry order = iteration order).
    pub fn with_config<N>(
        stores: impl IntoIterator<Item = (N, Store)>,
        config: FluxConfig,
    ) -> FluxResult<Self>
    where
        N: Into<String>,
    {
        let mut registry: Vec<(StoreName, Store)> = Vec::new();
        for (name, store) in stores {
            let name = StoreName::new(name)?;
            if registry.iter().any(|(existing, _)| *existing == name) {
                return Err(FluxError::invalid_store(format!(
                    "store name '{name}' is registered twice"
                )));
            }
            if let Some((existing, _)) = registry.iter().find(|(_, s)| s.ptr_eq(&store)) {
                return Err(FluxError::invalid_store(format!(
                    "store '{}' is already registered as '{existing}'",
                    store.name()
                )));
            }
            registry.push((name, store));
        }

        let rollback_wiring = wire_rollback(&registry);

        debug!(stores = registry.len(), "dispatcher constructed");
        Ok(Self {
            inner: Arc::new(DispatcherInner {
                stores: registry,
                listener: EventChannel::new(),
                actions: RwLock::new(HashMap::new()),
                config,
                rollback_wiring,
            }),
        })
    }

    pub fn config(&self) -> &FluxConfig {
        &self.inner.config
    }

    /// Send `action` to every registered store.
    ///
    /// The returned settlement resolves once every store emitted `change`.
    pub fn dispatch(&self, action: &str, payload: Value) -> FluxResult<Settlement> {
        let stores = self.validated_stores()?;
        let settlement = self.wait_for(&stores)?;
        let dispatch_id = settlement.id();

        debug!(%dispatch_id, action, stores = stores.len(), "dispatching action");

        for store in &stores {
            let handled = store.dispatch_action(action, &payload).inspect_err(|e| {
                warn!(
                    %dispatch_id,
                    action,
                    store = store.name(),
                    error = %e,
                    "handler failed; aborting dispatch"
                )
            })?;
            if self.inner.config.trace_dispatch {
                debug!(%dispatch_id, action, store = store.name(), handled, "store reached");
            }
        }
        Ok(settlement)
    }

    /// Settlement over the next `change` of each store in `stores`.
    ///
    /// Blocking waits use the configured default timeout.
    pub fn wait_for(&self, stores: &[Store]) -> FluxResult<Settlement> {
        Settlement::watch(stores, self.inner.config.settle_timeout, Some(self.on_settled()))
    }

    /// Like [`wait_for`](Self::wait_for), with an explicit bound for blocking waits.
    pub fn wait_for_timeout(&self, stores: &[Store], timeout: Duration) -> FluxResult<Settlement> {
        Settlement::watch(stores, Some(timeout), Some(self.on_settled()))
    }

    /// Register an action creator under `name`.
    ///
    /// The callback receives an [`ActionScope`] whose `dispatch` routes through
    /// this dispatcher. Re-registering a name replaces the previous callback.
    pub fn register_action<F>(&self, name: &str, callback: F) -> FluxResult<()>
    where
        F: Fn(&ActionScope<'_>, Value) -> FluxResult<Settlement> + Send + Sync + 'static,
    {
        self.register_action_callback(name, Arc::new(callback))
    }

    pub fn register_action_callback(&self, name: &str, callback: ActionCallback) -> FluxResult<()> {
        if name.trim().is_empty() {
            return Err(FluxError::invalid_callback("action name must not be blank"));
        }
        if RESERVED_ACTIONS.contains(&name) {
            return Err(FluxError::invalid_callback(format!(
                "'{name}' is a built-in dispatcher operation"
            )));
        }

        self.inner
            .actions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.to_string(), callback);
        debug!(action = name, "action registered");
        Ok(())
    }

    /// Call the action creator registered under `name`.
    pub fn invoke(&self, name: &str, payload: Value) -> FluxResult<Settlement> {
        let callback = self
            .inner
            .actions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| FluxError::invalid_callback(format!("no action registered as '{name}'")))?;

        callback(&ActionScope { dispatcher: self }, payload)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.inner
            .actions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(name)
    }

    /// Definition of the store registered as `name`.
    pub fn get_store(&self, name: &str) -> FluxResult<Arc<StoreDefinition>> {
        self.store(name).map(|store| store.definition().clone())
    }

    /// The store registered as `name`.
    pub fn store(&self, name: &str) -> FluxResult<&Store> {
        self.inner
            .stores
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, store)| store)
            .ok_or_else(|| FluxError::store_not_found(name))
    }

    /// Registry entries, in dispatch order.
    pub fn stores(&self) -> impl Iterator<Item = (&str, &Store)> {
        self.inner.stores.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn store_count(&self) -> usize {
        self.inner.stores.len()
    }

    /// Subscribe to a dispatcher-level event (e.g. `change:all`).
    pub fn on<F>(&self, event: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.listener.on(event, callback)
    }

    pub fn off(&self, listener: ListenerId) -> bool {
        self.inner.listener.off(listener)
    }

    pub fn emit(&self, event: &str, payload: &Value) -> FluxResult<usize> {
        self.inner
            .listener
            .emit(event, payload)
            .map_err(|e| FluxError::handler(DISPATCHER_OWNER, e.event, e.source))
    }

    fn validated_stores(&self) -> FluxResult<Vec<Store>> {
        self.inner
            .stores
            .iter()
            .map(|(name, store)| {
                if store.is_closed() {
                    Err(FluxError::invalid_store(format!(
                        "store '{name}' is closed and cannot receive actions"
                    )))
                } else {
                    Ok(store.clone())
                }
            })
            .collect()
    }

    fn on_settled(&self) -> OnSettled {
        let weak: Weak<DispatcherInner> = Arc::downgrade(&self.inner);
        Box::new(move |dispatch_id| {
            let Some(inner) = weak.upgrade() else {
                return Ok(());
            };
            debug!(%dispatch_id, "all stores changed");
            inner
                .listener
                .emit(CHANGE_ALL, &Value::Null)
                .map(|_| ())
                .map_err(Into::into)
        })
    }
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("stores", &self.inner.stores.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>())
            .field("config", &self.inner.config)
            .finish()
    }
}

// Removed again when the dispatcher is dropped.
fn wire_rollback(registry: &[(StoreName, Store)]) -> Vec<(WeakStore, ListenerId)> {
    let targets: Arc<[WeakStore]> = registry.iter().map(|(_, s)| s.downgrade()).collect();

    registry
        .iter()
        .map(|(name, store)| {
            let targets = targets.clone();
            let origin = name.to_string();
            let id = store.listener().on(ROLLBACK, move |payload: &Value| {
                debug!(store = %origin, targets = targets.len(), "broadcasting rollback");
                for target in targets.iter() {
                    if let Some(store) = target.upgrade() {
                        store.emit(ROLLBACK_BROADCAST, payload)?;
                    }
                }
                Ok(())
            });
            (store.downgrade(), id)
        })
        .collect()
}

/// What an action creator can reach: the store registry and the owning
/// dispatcher's `dispatch`.
#[derive(Debug, Clone, Copy)]
pub struct ActionScope<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> ActionScope<'a> {
    pub fn dispatch(&self, action: &str, payload: Value) -> FluxResult<Settlement> {
        self.dispatcher.dispatch(action, payload)
    }

    pub fn wait_for(&self, stores: &[Store]) -> FluxResult<Settlement> {
        self.dispatcher.wait_for(stores)
    }

    pub fn store(&self, name: &str) -> FluxResult<&'a Store> {
        self.dispatcher.store(name)
    }

    pub fn stores(&self) -> impl Iterator<Item = (&'a str, &'a Store)> {
        self.dispatcher.stores()
    }

    pub fn dispatcher(&self) -> &'a Dispatcher {
        self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use fluxcore_core::Schema;
    use proptest::prelude::*;
    use serde_json::json;

    fn list_store(name: &str) -> Store {
        let def = StoreDefinition::new(name)
            .with_schema(Schema::from_value(&json!({"list": {"default": []}})).unwrap())
            .with_handler("addItem", |ctx, payload| {
                let mut list = ctx.get("list").unwrap_or_else(|| json!([]));
                if let Value::Array(items) = &mut list {
                    items.push(payload.clone());
                }
                ctx.set_state("list", list)?;
                Ok(())
            });
        Store::new(def, &[]).unwrap()
    }

    fn list_len(store: &Store) -> usize {
        store.get_state()["list"].as_array().map_or(0, Vec::len)
    }

    #[test]
    fn dispatch_reaches_every_store_and_settles() {
        let (a, b) = (list_store("a"), list_store("b"));
        let dispatcher = Dispatcher::new([("a", a.clone()), ("b", b.clone())]).unwrap();

        let settlement = dispatcher.dispatch("addItem", json!("x")).unwrap();
        assert!(settlement.is_settled());
        assert_eq!(list_len(&a), 1);
        assert_eq!(list_len(&b), 1);
    }

    #[test]
    fn change_all_fires_once_per_settled_dispatch() {
        let dispatcher =
            Dispatcher::new([("a", list_store("a")), ("b", list_store("b"))]).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        dispatcher.on(CHANGE_ALL, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        dispatcher.dispatch("addItem", json!(1)).unwrap().wait().unwrap();
        dispatcher.dispatch("addItem", json!(2)).unwrap().wait().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn store_that_ignores_action_keeps_settlement_pending() {
        let quiet = Store::new(StoreDefinition::new("quiet"), &[]).unwrap();
        let dispatcher =
            Dispatcher::new([("a", list_store("a")), ("quiet", quiet.clone())]).unwrap();

        let settlement = dispatcher.dispatch("addItem", json!(1)).unwrap();
        assert!(!settlement.is_settled());
        assert_eq!(settlement.pending_stores(), vec!["quiet".to_string()]);
        assert!(quiet.raw_data().is_empty());

        assert!(matches!(
            settlement.wait_timeout(Duration::from_millis(10)),
            Err(FluxError::SettlementTimeout { pending: 1, .. })
        ));
    }

    #[test]
    fn handlers_run_in_registry_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let make = |name: &'static str| {
            let order = order.clone();
            let def = StoreDefinition::new(name).with_handler("ping", move |ctx, _| {
                order.lock().unwrap().push(ctx.store_name().to_string());
                ctx.emit_change()?;
                Ok(())
            });
            Store::new(def, &[]).unwrap()
        };
        let dispatcher =
            Dispatcher::new([("z", make("z")), ("a", make("a")), ("m", make("m"))]).unwrap();

        dispatcher.dispatch("ping", Value::Null).unwrap().wait().unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["z", "a", "m"]);
    }

    #[test]
    fn failing_handler_aborts_remaining_stores() {
        let failing = Store::new(
            StoreDefinition::new("failing")
                .with_handler("addItem", |_, _| Err(anyhow::anyhow!("rejected"))),
            &[],
        )
        .unwrap();
        let (first, last) = (list_store("first"), list_store("last"));
        let dispatcher = Dispatcher::new([
            ("first", first.clone()),
            ("failing", failing.clone()),
            ("last", last.clone()),
        ])
        .unwrap();

        let err = dispatcher.dispatch("addItem", json!(1)).unwrap_err();
        assert!(matches!(err, FluxError::Handler { ref owner, .. } if owner == "failing"));
        assert_eq!(list_len(&first), 1);
        assert_eq!(list_len(&last), 0);

        // The aborted settlement no longer listens.
        assert_eq!(last.listener().listener_count(fluxcore_events::CHANGE), 0);
    }

    #[test]
    fn closed_store_is_rejected_before_any_handler_runs() {
        let (a, b) = (list_store("a"), list_store("b"));
        let dispatcher = Dispatcher::new([("a", a.clone()), ("b", b.clone())]).unwrap();
        b.close();

        assert!(matches!(
            dispatcher.dispatch("addItem", json!(1)),
            Err(FluxError::InvalidStore(_))
        ));
        assert_eq!(list_len(&a), 0);
    }

    #[test]
    fn duplicate_or_blank_registry_names_are_rejected() {
        let a = list_store("a");
        assert!(matches!(
            Dispatcher::new([("a", a.clone()), ("a", a.clone())]),
            Err(FluxError::InvalidStore(_))
        ));
        assert!(matches!(
            Dispatcher::new([("", a)]),
            Err(FluxError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn rollback_reaches_every_store_exactly_once() {
        let hits = Arc::new(Mutex::new(HashMap::<String, usize>::new()));
        let make = |name: &'static str| {
            let hits = hits.clone();
            let def = StoreDefinition::new(name).with_rollback_handler(move |ctx, _| {
                *hits
                    .lock()
                    .unwrap()
                    .entry(ctx.store_name().to_string())
                    .or_default() += 1;
                Ok(())
            });
            Store::new(def, &[]).unwrap()
        };
        let (a, b, c) = (make("a"), make("b"), make("c"));
        let _dispatcher =
            Dispatcher::new([("a", a.clone()), ("b", b.clone()), ("c", c.clone())]).unwrap();

        b.emit_rollback().unwrap();

        let hits = hits.lock().unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.values().all(|&n| n == 1));
    }

    fn counting_rollback_store(name: &'static str, hits: &Arc<AtomicUsize>) -> Store {
        let hits = hits.clone();
        let def = StoreDefinition::new(name).with_rollback_handler(move |_, _| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        Store::new(def, &[]).unwrap()
    }

    #[test]
    fn dropped_dispatcher_stops_broadcasting_rollback() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (a, b) = (
            counting_rollback_store("a", &hits),
            counting_rollback_store("b", &hits),
        );

        let first = Dispatcher::new([("a", a.clone()), ("b", b.clone())]).unwrap();
        assert_eq!(a.listener().listener_count(ROLLBACK), 1);
        drop(first);
        assert_eq!(a.listener().listener_count(ROLLBACK), 0);

        let _second = Dispatcher::new([("a", a.clone()), ("b", b.clone())]).unwrap();
        a.emit_rollback().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn rollback_wiring_outlives_dispatcher_clones() {
        let hits = Arc::new(AtomicUsize::new(0));
        let a = counting_rollback_store("a", &hits);
        let dispatcher = Dispatcher::new([("a", a.clone())]).unwrap();

        drop(dispatcher.clone());
        a.emit_rollback().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn same_store_under_two_names_is_rejected() {
        let hits = Arc::new(AtomicUsize::new(0));
        let a = counting_rollback_store("a", &hits);

        assert!(matches!(
            Dispatcher::new([("x", a.clone()), ("y", a.clone())]),
            Err(FluxError::InvalidStore(_))
        ));
        // The rejected registry installed nothing.
        assert_eq!(a.listener().listener_count(ROLLBACK), 0);
        a.emit_rollback().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn wait_for_timeout_reports_pending_stores() {
        let (a, b) = (list_store("a"), list_store("b"));
        let dispatcher = Dispatcher::new([("a", a.clone()), ("b", b.clone())]).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        dispatcher.on(CHANGE_ALL, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let settlement = dispatcher
            .wait_for_timeout(&[a.clone(), b.clone()], Duration::from_millis(10))
            .unwrap();
        a.emit_change().unwrap();
        assert!(matches!(
            settlement.wait(),
            Err(FluxError::SettlementTimeout { pending: 1, .. })
        ));
        assert_eq!(settlement.pending_stores(), vec!["b".to_string()]);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        b.emit_change().unwrap();
        settlement.wait().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn action_scope_wait_for_emits_change_all() {
        let (a, b) = (list_store("a"), list_store("b"));
        let dispatcher = Dispatcher::new([("a", a.clone()), ("b", b.clone())]).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        dispatcher.on(CHANGE_ALL, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        dispatcher
            .register_action("touchFirst", |scope, _| {
                let first = scope.store("a")?.clone();
                let settlement = scope.wait_for(std::slice::from_ref(&first))?;
                first.emit_change()?;
                Ok(settlement)
            })
            .unwrap();

        let settlement = dispatcher.invoke("touchFirst", Value::Null).unwrap();
        assert!(settlement.is_settled());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(list_len(&b), 0);
    }

    #[test]
    fn registered_action_routes_through_dispatcher() {
        let a = list_store("a");
        let dispatcher = Dispatcher::new([("a", a.clone())]).unwrap();
        let seen_stores = Arc::new(Mutex::new(Vec::new()));
        let sink = seen_stores.clone();

        dispatcher
            .register_action("addItem", move |scope, payload| {
                sink.lock()
                    .unwrap()
                    .extend(scope.stores().map(|(name, _)| name.to_string()));
                scope.dispatch("addItem", payload)
            })
            .unwrap();

        let settlement = dispatcher.invoke("addItem", json!("hello")).unwrap();
        assert!(settlement.is_settled());
        assert_eq!(list_len(&a), 1);
        assert_eq!(*seen_stores.lock().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn register_action_rejects_reserved_and_blank_names() {
        let dispatcher = Dispatcher::new(Vec::<(String, Store)>::new()).unwrap();
        for name in ["dispatch", "get_stores", " "] {
            assert!(matches!(
                dispatcher.register_action(name, |_, _| Ok(Settlement::resolved())),
                Err(FluxError::InvalidCallback(_))
            ));
        }
        assert!(matches!(
            dispatcher.invoke("missing", Value::Null),
            Err(FluxError::InvalidCallback(_))
        ));
    }

    #[test]
    fn get_store_returns_definition_or_not_found() {
        let dispatcher = Dispatcher::new([("a", list_store("a"))]).unwrap();
        assert_eq!(dispatcher.get_store("a").unwrap().name(), "a");
        assert!(matches!(
            dispatcher.get_store("nope"),
            Err(FluxError::StoreNotFound(name)) if name == "nope"
        ));
    }

    #[test]
    fn empty_registry_settles_immediately() {
        let dispatcher = Dispatcher::new(Vec::<(String, Store)>::new()).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        dispatcher.on(CHANGE_ALL, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(dispatcher.dispatch("anything", Value::Null).unwrap().is_settled());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: every dispatch reaches every store exactly once and
        /// settles exactly once, whatever the registry size.
        #[test]
        fn every_dispatch_reaches_every_store(store_count in 1usize..8, dispatches in 0usize..12) {
            let stores: Vec<Store> = (0..store_count)
                .map(|i| list_store(&format!("s{i}")))
                .collect();
            let dispatcher = Dispatcher::new(
                stores.iter().map(|s| (s.name().to_string(), s.clone())),
            )
            .unwrap();
            let settled = Arc::new(AtomicUsize::new(0));
            let counter = settled.clone();
            dispatcher.on(CHANGE_ALL, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });

            for i in 0..dispatches {
                let settlement = dispatcher.dispatch("addItem", json!(i)).unwrap();
                prop_assert!(settlement.is_settled());
            }

            for store in &stores {
                prop_assert_eq!(list_len(store), dispatches);
            }
            prop_assert_eq!(settled.load(Ordering::SeqCst), dispatches);
        }
    }
}
