//! Error model shared by every fluxcore crate.

use std::time::Duration;

use thiserror::Error;

/// Result type used across fluxcore.
pub type FluxResult<T> = Result<T, FluxError>;

/// Coordination-core error.
///
/// Setup failures (`InvalidDefinition`, `InvalidCallback`, `InvalidStore`,
/// `StoreNotFound`) are raised at the call that detects them and are meant to
/// fail fast. `CapabilityUnavailable` is recoverable: the store keeps working in
/// explicit-emit mode.
#[derive(Debug, Error)]
pub enum FluxError {
    /// A store definition (or one of its parts) is unusable.
    #[error("invalid store definition: {0}")]
    InvalidDefinition(String),

    /// A value expected to be invocable is missing or cannot be registered.
    #[error("invalid callback: {0}")]
    InvalidCallback(String),

    /// A registry entry cannot receive actions.
    #[error("invalid store: {0}")]
    InvalidStore(String),

    /// Lookup by store name missed.
    #[error("store '{0}' does not exist")]
    StoreNotFound(String),

    /// Automatic change detection was requested but no observer is available.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A handler or listener bound to `event` on `owner` failed.
    #[error("listener for '{event}' on '{owner}' failed: {source}")]
    Handler {
        owner: String,
        event: String,
        #[source]
        source: anyhow::Error,
    },

    /// A blocking wait on a settlement gave up before every store changed.
    #[error("settlement timed out after {waited:?} with {pending} store(s) pending")]
    SettlementTimeout { waited: Duration, pending: usize },
}

impl FluxError {
    pub fn invalid_definition(msg: impl Into<String>) -> Self {
        Self::InvalidDefinition(msg.into())
    }

    pub fn invalid_callback(msg: impl Into<String>) -> Self {
        Self::InvalidCallback(msg.into())
    }

    pub fn invalid_store(msg: impl Into<String>) -> Self {
        Self::InvalidStore(msg.into())
    }

    pub fn store_not_found(name: impl Into<String>) -> Self {
        Self::StoreNotFound(name.into())
    }

    pub fn capability_unavailable(msg: impl Into<String>) -> Self {
        Self::CapabilityUnavailable(msg.into())
    }

    pub fn handler(
        owner: impl Into<String>,
        event: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        Self::Handler {
            owner: owner.into(),
            event: event.into(),
            source,
        }
    }

    /// Whether the caller may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CapabilityUnavailable(_))
    }
}
