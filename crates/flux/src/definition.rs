//! Store definitions: what a store declares before it is instantiated.
//!
//! A definition names the store, declares its schema, maps action names to
//! handler methods and optionally overrides how state is projected. It is
//! immutable once built and shared (through `Arc`) by every store created from
//! it; stores never write back into it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::{Map, Value};

use fluxcore_core::Schema;

use crate::context::StoreContext;

/// Handler bound to an action (or to the rollback broadcast).
pub type ActionHandler = Arc<dyn Fn(&StoreContext<'_>, &Value) -> anyhow::Result<()> + Send + Sync>;

/// Runs once when a store is constructed, with the constructor arguments.
pub type InitializeFn = Arc<dyn Fn(&StoreContext<'_>, &[Value]) -> anyhow::Result<()> + Send + Sync>;

/// Replaces the schema-driven projection of a store's committed data.
pub type StateProjection = Arc<dyn Fn(&Map<String, Value>) -> Map<String, Value> + Send + Sync>;

/// Blueprint for a store.
#[derive(Clone, Default)]
pub struct StoreDefinition {
    name: String,
    schema: Option<Schema>,
    actions: BTreeMap<String, String>,
    methods: HashMap<String, ActionHandler>,
    initialize: Option<InitializeFn>,
    projection: Option<StateProjection>,
    rollback: Option<ActionHandler>,
}

impl StoreDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Route `action` to the method registered as `method`.
    pub fn with_action(mut self, action: impl Into<String>, method: impl Into<String>) -> Self {
        self.actions.insert(action.into(), method.into());
        self
    }

    /// Register a named method that actions can be routed to.
    pub fn with_method<F>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&StoreContext<'_>, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.methods.insert(method.into(), Arc::new(handler));
        self
    }

    /// Shorthand for a method named after the action it handles.
    pub fn with_handler<F>(self, action: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&StoreContext<'_>, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let action = action.into();
        self.with_method(action.clone(), handler)
            .with_action(action.clone(), action)
    }

    pub fn with_initialize<F>(mut self, initialize: F) -> Self
    where
        F: Fn(&StoreContext<'_>, &[Value]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.initialize = Some(Arc::new(initialize));
        self
    }

    /// Override `get_state` for stores built from this definition.
    pub fn with_state_projection<F>(mut self, projection: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.projection = Some(Arc::new(projection));
        self
    }

    /// Handler for the dispatcher-wide rollback broadcast.
    pub fn with_rollback_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&StoreContext<'_>, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.rollback = Some(Arc::new(handler));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Declared `(action, method)` pairs.
    pub fn actions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.actions.iter().map(|(a, m)| (a.as_str(), m.as_str()))
    }

    pub fn declares(&self, action: &str) -> bool {
        self.actions.contains_key(action)
    }

    pub fn method(&self, name: &str) -> Option<&ActionHandler> {
        self.methods.get(name)
    }

    pub fn initialize(&self) -> Option<&InitializeFn> {
        self.initialize.as_ref()
    }

    pub fn state_projection(&self) -> Option<&StateProjection> {
        self.projection.as_ref()
    }

    pub fn rollback_handler(&self) -> Option<&ActionHandler> {
        self.rollback.as_ref()
    }
}

impl core::fmt::Debug for StoreDefinition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut methods: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        methods.sort_unstable();
        f.debug_struct("StoreDefinition")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("actions", &self.actions)
            .field("methods", &methods)
            .field("initialize", &self.initialize.is_some())
            .field("projection", &self.projection.is_some())
            .field("rollback", &self.rollback.is_some())
            .finish()
    }
}
