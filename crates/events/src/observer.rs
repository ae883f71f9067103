//! Automatic change detection seam.
//!
//! A store normally announces its own changes. A store may instead hand one of
//! its values to a [`ChangeObserver`], which reports mutations back through a
//! callback; the store then re-emits them as `change` events and stops emitting
//! on every state write.

use serde_json::Value;

/// Invoked by an observer with a description of what changed.
pub type ChangeCallback = Box<dyn Fn(Value) -> anyhow::Result<()> + Send + Sync>;

/// Watches a store value and reports its mutations.
pub trait ChangeObserver: Send + Sync {
    /// Start watching `value` (stored under `key`). `on_change` must be called
    /// for every detected mutation until the observer is dropped.
    fn observe(&self, key: &str, value: &Value, on_change: ChangeCallback) -> anyhow::Result<()>;
}
