//! `fluxcore-core` — state-model building blocks.
//!
//! This crate contains the **pure** parts of the coordination core: the error
//! taxonomy, validated names, the store schema and the merge/projection rules
//! that turn mutation requests into committed data and committed data into a
//! derived snapshot. No event plumbing lives here.

pub mod error;
pub mod name;
pub mod schema;
pub mod state;

pub use error::{FluxError, FluxResult};
pub use name::{ActionName, StoreName};
pub use schema::{CalculatedFn, PropertySpec, Schema};
pub use state::{StateMap, is_composite, merge_property, project};
