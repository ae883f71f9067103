//! Construction entry points.

use std::sync::Arc;

use serde_json::Value;

use fluxcore_core::FluxResult;
use fluxcore_events::ChangeObserver;

use crate::config::FluxConfig;
use crate::dispatcher::{ActionCallback, ActionScope, Dispatcher};
use crate::definition::StoreDefinition;
use crate::settlement::Settlement;
use crate::store::Store;

type StoresSupplier = Box<dyn FnOnce() -> Vec<(String, Store)> + Send>;

/// Builds stores and dispatchers with shared configuration.
#[derive(Clone, Default)]
pub struct Flux {
    config: FluxConfig,
    observer: Option<Arc<dyn ChangeObserver>>,
}

impl Flux {
    pub fn new(config: FluxConfig) -> Self {
        Self {
            config,
            observer: None,
        }
    }

    /// Configuration read from `FLUXCORE_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(FluxConfig::from_env())
    }

    /// Enable `listen_changes` on stores created by this facade.
    pub fn with_observer(mut self, observer: Arc<dyn ChangeObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &FluxConfig {
        &self.config
    }

    /// Constructor for stores of `definition`.
    pub fn create_store(&self, definition: StoreDefinition) -> StoreFactory {
        StoreFactory {
            definition: Arc::new(definition),
            observer: self.observer.clone(),
        }
    }

    /// Build a dispatcher over `definition`'s stores and register its actions.
    pub fn create_dispatcher(&self, definition: DispatcherDefinition) -> FluxResult<Dispatcher> {
        let DispatcherDefinition { stores, actions } = definition;
        let stores = stores.map(|supply| supply()).unwrap_or_default();

        let dispatcher = Dispatcher::with_config(stores, self.config.clone())?;
        for (name, callback) in actions {
            dispatcher.register_action_callback(&name, callback)?;
        }
        Ok(dispatcher)
    }
}

impl core::fmt::Debug for Flux {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Flux")
            .field("config", &self.config)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Creates stores that share one definition.
#[derive(Clone)]
pub struct StoreFactory {
    definition: Arc<StoreDefinition>,
    observer: Option<Arc<dyn ChangeObserver>>,
}

impl StoreFactory {
    /// Instantiate a store; `args` are handed to the definition's `initialize`.
    pub fn create(&self, args: &[Value]) -> FluxResult<Store> {
        Store::with_observer(self.definition.clone(), args, self.observer.clone())
    }

    pub fn definition(&self) -> &Arc<StoreDefinition> {
        &self.definition
    }
}

impl core::fmt::Debug for StoreFactory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StoreFactory")
            .field("store", &self.definition.name())
            .finish()
    }
}

/// Stores plus action creators for a dispatcher.
#[derive(Default)]
pub struct DispatcherDefinition {
    stores: Option<StoresSupplier>,
    actions: Vec<(String, ActionCallback)>,
}

impl DispatcherDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies the store registry (called once, when the dispatcher is built).
    pub fn with_stores<F>(mut self, supply: F) -> Self
    where
        F: FnOnce() -> Vec<(String, Store)> + Send + 'static,
    {
        self.stores = Some(Box::new(supply));
        self
    }

    pub fn with_action<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&ActionScope<'_>, Value) -> FluxResult<Settlement> + Send + Sync + 'static,
    {
        self.actions.push((name.into(), Arc::new(callback)));
        self
    }
}

impl core::fmt::Debug for DispatcherDefinition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DispatcherDefinition")
            .field("stores", &self.stores.is_some())
            .field(
                "actions",
                &self.actions.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
