//! Store and dispatcher event plumbing.
//!
//! - [`EventChannel`]: named-event pub/sub with one-shot subscriptions
//! - [`event`]: the event names the coordination core agrees on
//! - [`ChangeObserver`]: seam for automatic change detection

pub mod channel;
pub mod event;
pub mod observer;

pub use channel::{EmitError, EventChannel, ListenerId};
pub use event::{ACTION_PREFIX, CHANGE, CHANGE_ALL, ROLLBACK, ROLLBACK_BROADCAST, action_event};
pub use observer::{ChangeCallback, ChangeObserver};
