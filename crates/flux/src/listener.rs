//! View-side subscription to a dispatcher's stores.
//!
//! A UI layer (or any other consumer) attaches a `StoreListener` to the
//! dispatcher it was handed explicitly. The listener reports which store
//! changed, can react to `change:all`, and collects every store's derived
//! state as `{"stores": {<name>: <state>}}`. Detaching (or dropping) removes
//! only the listeners it installed.

use std::sync::Arc;

use serde_json::{Map, Value};

use fluxcore_core::{FluxResult, StateMap};
use fluxcore_events::{CHANGE_ALL, ListenerId};

use crate::dispatcher::Dispatcher;
use crate::store::WeakStore;

/// Change subscriptions for every store of one dispatcher.
pub struct StoreListener {
    dispatcher: Dispatcher,
    subscriptions: Vec<(WeakStore, ListenerId)>,
    all_changed: Option<ListenerId>,
}

impl StoreListener {
    /// Subscribe to `change` on every registered store.
    ///
    /// `on_store_change` receives the registry name of the store and the
    /// payload of its `change` event.
    pub fn attach<F>(dispatcher: &Dispatcher, on_store_change: F) -> Self
    where
        F: Fn(&str, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let on_store_change = Arc::new(on_store_change);
        let subscriptions = dispatcher
            .stores()
            .map(|(name, store)| {
                let callback = on_store_change.clone();
                let name = name.to_string();
                let id = store.on_change(move |payload| callback(name.as_str(), payload));
                (store.downgrade(), id)
            })
            .collect();

        Self {
            dispatcher: dispatcher.clone(),
            subscriptions,
            all_changed: None,
        }
    }

    /// Also react once every store changed after a dispatch.
    pub fn on_all_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        if let Some(previous) = self.all_changed.take() {
            self.dispatcher.off(previous);
        }
        self.all_changed = Some(self.dispatcher.on(CHANGE_ALL, move |_| callback()));
        self
    }

    /// `{"stores": {name: state}}` for every registered store.
    pub fn store_states(&self) -> Value {
        let stores: Map<String, Value> = self
            .dispatcher
            .stores()
            .map(|(name, store)| (name.to_string(), Value::Object(store.get_state())))
            .collect();

        let mut state = Map::new();
        state.insert("stores".to_string(), Value::Object(stores));
        Value::Object(state)
    }

    /// Derived state of the store registered as `name`.
    pub fn store_state(&self, name: &str) -> FluxResult<StateMap> {
        self.dispatcher.store(name).map(|store| store.get_state())
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn detach(self) {}
}

impl Drop for StoreListener {
    fn drop(&mut self) {
        for (store, id) in self.subscriptions.drain(..) {
            if let Some(store) = store.upgrade() {
                store.listener().off(id);
            }
        }
        if let Some(id) = self.all_changed.take() {
            self.dispatcher.off(id);
        }
    }
}

impl core::fmt::Debug for StoreListener {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StoreListener")
            .field("stores", &self.subscriptions.len())
            .field("all_changed", &self.all_changed.is_some())
            .finish()
    }
}
