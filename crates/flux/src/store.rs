//! Store runtime: one state container bound to a definition.
//!
//! A `Store` owns:
//!
//! - a private [`EventChannel`] carrying `action:<name>`, `change`, `rollback`
//!   and `__rollback` events,
//! - the committed data map (only this store's handlers write to it),
//! - its own copy of the definition's state projection, if any.
//!
//! Construction binds every declared action, runs `initialize` once and seeds
//! schema defaults. `Store` is a cheap handle (`Clone` shares the same store).
//! Listeners installed by the store itself hold a [`WeakStore`], so dropping the
//! last handle releases the store even though its channel still holds closures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::Value;
use tracing::{debug, error, warn};

use fluxcore_core::{FluxError, FluxResult, StateMap, StoreName, merge_property, project};
use fluxcore_events::{
    CHANGE, ChangeObserver, EmitError, EventChannel, ListenerId, ROLLBACK, ROLLBACK_BROADCAST,
    action_event,
};

use crate::context::StoreContext;
use crate::definition::{ActionHandler, StateProjection, StoreDefinition};

struct StoreInner {
    name: StoreName,
    definition: Arc<StoreDefinition>,
    listener: EventChannel<Value>,
    data: Mutex<StateMap>,
    projection: Option<StateProjection>,
    observer: Option<Arc<dyn ChangeObserver>>,
    auto_observing: AtomicBool,
    closed: AtomicBool,
}

/// Live store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Non-owning store handle.
#[derive(Clone)]
pub struct WeakStore(Weak<StoreInner>);

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.0.upgrade().map(|inner| Store { inner })
    }
}

impl core::fmt::Debug for WeakStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.upgrade() {
            Some(store) => write!(f, "WeakStore({})", store.name()),
            None => f.write_str("WeakStore(<dropped>)"),
        }
    }
}

impl Store {
    /// Build a store in explicit-emit mode (no change observer).
    pub fn new(definition: impl Into<Arc<StoreDefinition>>, args: &[Value]) -> FluxResult<Self> {
        Self::with_observer(definition, args, None)
    }

    /// Build a store that may switch to automatic change detection.
    pub fn with_observer(
        definition: impl Into<Arc<StoreDefinition>>,
        args: &[Value],
        observer: Option<Arc<dyn ChangeObserver>>,
    ) -> FluxResult<Self> {
        let definition = definition.into();
        let name = StoreName::new(definition.name())?;
        let projection = definition.state_projection().cloned();

        let store = Store {
            inner: Arc::new(StoreInner {
                name,
                definition,
                listener: EventChannel::new(),
                data: Mutex::new(StateMap::new()),
                projection,
                observer,
                auto_observing: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        };

        store.bind_actions()?;

        if let Some(initialize) = store.inner.definition.initialize().cloned() {
            initialize(&StoreContext::new(&store), args)
                .map_err(|source| FluxError::handler(store.name(), "initialize", source))?;
        }

        if store.inner.projection.is_none() {
            match store.inner.definition.schema() {
                Some(schema) => {
                    for key in schema.keys() {
                        store.set_state(key, Value::Null)?;
                    }
                }
                None => warn!(
                    store = %store.inner.name,
                    "store has neither a schema nor a state projection; get_state returns raw data"
                ),
            }
        }

        debug!(
            store = %store.inner.name,
            actions = store.inner.definition.actions().count(),
            "store constructed"
        );
        Ok(store)
    }

    pub fn name(&self) -> &str {
        self.inner.name.as_str()
    }

    pub fn store_name(&self) -> &StoreName {
        &self.inner.name
    }

    pub fn definition(&self) -> &Arc<StoreDefinition> {
        &self.inner.definition
    }

    /// The store's event channel (e.g. to `remove_all(CHANGE)`).
    pub fn listener(&self) -> &EventChannel<Value> {
        &self.inner.listener
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore(Arc::downgrade(&self.inner))
    }

    /// Whether both handles refer to the same store.
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Route an action to the handler bound for it.
    ///
    /// Returns `false` when the definition does not declare the action.
    pub fn dispatch_action(&self, action: &str, payload: &Value) -> FluxResult<bool> {
        self.inner
            .listener
            .emit(&action_event(action), payload)
            .map(|invoked| invoked > 0)
            .map_err(|e| self.listener_error(e))
    }

    /// Merge `data` into `property`, then emit `change` unless changes are
    /// detected automatically.
    pub fn set_state(&self, property: &str, data: Value) -> FluxResult<()> {
        {
            let mut committed = self.lock_data();
            merge_property(&mut committed, self.inner.definition.schema(), property, data);
        }
        if !self.is_auto_observing() {
            self.emit_change()?;
        }
        Ok(())
    }

    /// Derived snapshot of the committed data.
    pub fn get_state(&self) -> StateMap {
        let data = self.raw_data();
        match &self.inner.projection {
            Some(projection) => projection(&data),
            None => project(&data, self.inner.definition.schema()),
        }
    }

    /// Copy of the committed data, before projection.
    pub fn raw_data(&self) -> StateMap {
        self.lock_data().clone()
    }

    pub fn raw_value(&self, key: &str) -> Option<Value> {
        self.lock_data().get(key).cloned()
    }

    /// Mutate committed data in place. Emits nothing.
    ///
    /// `f` runs under the data lock and must not call back into this store.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut StateMap) -> R) -> R {
        f(&mut self.lock_data())
    }

    pub fn emit(&self, event: &str, payload: &Value) -> FluxResult<usize> {
        self.inner
            .listener
            .emit(event, payload)
            .map_err(|e| self.listener_error(e))
    }

    pub fn emit_change(&self) -> FluxResult<()> {
        self.emit(CHANGE, &Value::Null).map(|_| ())
    }

    pub fn emit_rollback(&self) -> FluxResult<()> {
        self.emit(ROLLBACK, &Value::Null).map(|_| ())
    }

    pub fn on_change<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.listener.on(CHANGE, callback)
    }

    pub fn on_rollback<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&StoreContext<'_>, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bind(ROLLBACK_BROADCAST.to_string(), Arc::new(handler))
    }

    /// Hand `key`'s value to the change observer and switch to automatic mode.
    ///
    /// Without an observer this logs and returns `CapabilityUnavailable`; the
    /// store stays in explicit-emit mode and keeps working.
    pub fn listen_changes(&self, key: &str) -> FluxResult<()> {
        let Some(observer) = self.inner.observer.as_ref() else {
            error!(
                store = %self.inner.name,
                key,
                "automatic change detection is unavailable; emit changes manually"
            );
            return Err(FluxError::capability_unavailable(format!(
                "store '{}' has no change observer",
                self.inner.name
            )));
        };

        let current = self.raw_value(key).unwrap_or(Value::Null);
        let weak = self.downgrade();
        observer
            .observe(
                key,
                &current,
                Box::new(move |changes: Value| -> anyhow::Result<()> {
                    match weak.upgrade() {
                        Some(store) => store.emit(CHANGE, &changes).map(|_| ()).map_err(Into::into),
                        None => Ok(()),
                    }
                }),
            )
            .map_err(|e| {
                FluxError::capability_unavailable(format!(
                    "observer rejected '{key}' on store '{}': {e}",
                    self.inner.name
                ))
            })?;

        self.inner.auto_observing.store(true, Ordering::SeqCst);
        debug!(store = %self.inner.name, key, "automatic change detection enabled");
        Ok(())
    }

    pub fn is_auto_observing(&self) -> bool {
        self.inner.auto_observing.load(Ordering::SeqCst)
    }

    /// Detach the store: every listener is removed and dispatchers refuse it.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            self.inner.listener.clear();
            debug!(store = %self.inner.name, "store closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn bind_actions(&self) -> FluxResult<()> {
        let definition = self.inner.definition.clone();
        for (action, method) in definition.actions() {
            let handler = definition.method(method).cloned().ok_or_else(|| {
                FluxError::invalid_callback(format!(
                    "store '{}' routes action '{action}' to unknown method '{method}'",
                    self.inner.name
                ))
            })?;
            self.bind(action_event(action), handler);
        }
        if let Some(handler) = definition.rollback_handler().cloned() {
            self.bind(ROLLBACK_BROADCAST.to_string(), handler);
        }
        Ok(())
    }

    fn bind(&self, event: String, handler: ActionHandler) -> ListenerId {
        let weak = self.downgrade();
        self.inner
            .listener
            .on(event, move |payload: &Value| match weak.upgrade() {
                Some(store) => handler(&StoreContext::new(&store), payload),
                None => Ok(()),
            })
    }

    fn listener_error(&self, err: EmitError) -> FluxError {
        FluxError::handler(self.name(), err.event, err.source)
    }

    // A panic inside `mutate` leaves the map usable; keep serving it.
    fn lock_data(&self) -> MutexGuard<'_, StateMap> {
        self.inner
            .data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl core::fmt::Debug for Store {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.name)
            .field("auto_observing", &self.is_auto_observing())
            .field("closed", &self.is_closed())
            .finish()
    }
}
