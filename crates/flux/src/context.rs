//! Capabilities handed to store handlers.
//!
//! Handlers never see the `Store` wrapper directly. They receive a
//! `StoreContext` that lets them read and write their own store's state and
//! emit or subscribe to that store's events. There is no way to reach another
//! store from here, which keeps every store single-writer.

use serde_json::Value;

use fluxcore_core::{FluxResult, StateMap};
use fluxcore_events::ListenerId;

use crate::store::Store;

/// Handler-side view of one store.
#[derive(Debug, Clone, Copy)]
pub struct StoreContext<'a> {
    store: &'a Store,
}

impl<'a> StoreContext<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Committed value of `key`, if set.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.raw_value(key)
    }

    /// Copy of the committed data.
    pub fn data(&self) -> StateMap {
        self.store.raw_data()
    }

    /// Derived snapshot, as consumers see it.
    pub fn state(&self) -> StateMap {
        self.store.get_state()
    }

    /// Merge `data` into `property` and (in explicit mode) emit `change`.
    pub fn set_state(&self, property: &str, data: Value) -> FluxResult<()> {
        self.store.set_state(property, data)
    }

    /// Mutate committed data in place without emitting anything.
    ///
    /// Pair with [`emit_change`](Self::emit_change) once the mutation is done.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut StateMap) -> R) -> R {
        self.store.mutate(f)
    }

    pub fn emit(&self, event: &str, payload: &Value) -> FluxResult<usize> {
        self.store.emit(event, payload)
    }

    pub fn emit_change(&self) -> FluxResult<()> {
        self.store.emit_change()
    }

    /// Ask every store of the owning dispatcher to roll back.
    pub fn emit_rollback(&self) -> FluxResult<()> {
        self.store.emit_rollback()
    }

    /// Subscribe to the dispatcher-wide rollback broadcast.
    pub fn on_rollback<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&StoreContext<'_>, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.store.on_rollback(handler)
    }

    /// Switch to automatic change detection for `key`.
    pub fn listen_changes(&self, key: &str) -> FluxResult<()> {
        self.store.listen_changes(key)
    }
}
