//! Event names shared by stores and dispatchers.

/// Emitted by a store after its state changed.
pub const CHANGE: &str = "change";

/// Emitted by a store to ask every store of its dispatcher to revert.
pub const ROLLBACK: &str = "rollback";

/// Emitted by the dispatcher on every store when any store requested a rollback.
pub const ROLLBACK_BROADCAST: &str = "__rollback";

/// Emitted by the dispatcher once a settlement resolved.
pub const CHANGE_ALL: &str = "change:all";

/// Namespace for action events on a store's private channel.
pub const ACTION_PREFIX: &str = "action:";

/// Channel event that carries `action` to its bound handler.
pub fn action_event(action: &str) -> String {
    format!("{ACTION_PREFIX}{action}")
}
