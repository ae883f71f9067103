//! `fluxcore` — unidirectional data-flow coordination.
//!
//! - [`Store`]: schema-driven state container reacting to actions
//! - [`Dispatcher`]: fans actions out to a registry of stores and reports
//!   settlement
//! - [`Flux`]: builds both from definitions
//!
//! ```ignore
//! let flux = Flux::default();
//! let todos = flux
//!     .create_store(
//!         StoreDefinition::new("todos")
//!             .with_schema(Schema::from_value(&json!({"list": {"default": []}}))?)
//!             .with_handler("addItem", |ctx, item| {
//!                 let mut list = ctx.get("list").unwrap_or_else(|| json!([]));
//!                 if let Value::Array(items) = &mut list {
//!                     items.push(item.clone());
//!                 }
//!                 ctx.set_state("list", list)?;
//!                 Ok(())
//!             }),
//!     )
//!     .create(&[])?;
//!
//! let dispatcher = flux.create_dispatcher(
//!     DispatcherDefinition::new()
//!         .with_stores(move || vec![("todos".to_string(), todos)])
//!         .with_action("addItem", |scope, item| scope.dispatch("addItem", item)),
//! )?;
//!
//! dispatcher.invoke("addItem", json!("write docs"))?.wait()?;
//! ```

pub mod config;
pub mod context;
pub mod definition;
pub mod dispatcher;
pub mod facade;
pub mod listener;
pub mod settlement;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use config::FluxConfig;
pub use context::StoreContext;
pub use definition::{ActionHandler, InitializeFn, StateProjection, StoreDefinition};
pub use dispatcher::{ActionCallback, ActionScope, Dispatcher, RESERVED_ACTIONS};
pub use facade::{DispatcherDefinition, Flux, StoreFactory};
pub use listener::StoreListener;
pub use settlement::{DispatchId, Settlement};
pub use store::{Store, WeakStore};

pub use fluxcore_core::{FluxError, FluxResult, PropertySpec, Schema, StateMap};
pub use fluxcore_events::{ChangeCallback, ChangeObserver, EventChannel, ListenerId};
