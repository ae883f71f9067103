//! Named-event publish/subscribe (mechanics only).
//!
//! Every store and every dispatcher owns one [`EventChannel`]. Listeners are
//! registered under an event name and invoked synchronously, in registration
//! order, by [`EventChannel::emit`].
//!
//! ## Semantics
//!
//! - **Synchronous fan-out**: `emit` returns after every matching listener ran.
//! - **One-shot listeners**: a `once` listener is removed right before it runs,
//!   so a re-entrant emit of the same event never invokes it twice. One that
//!   was not reached (an earlier listener failed) stays registered.
//! - **Snapshot delivery**: listeners added while an emit is in progress only see
//!   later emissions.
//! - **Fail fast**: the first listener error aborts the remaining listeners of
//!   that emission and is returned to the emitter.
//!
//! ## Re-entrancy
//!
//! The registry lock is held only while the matching listeners are collected,
//! never while a listener runs. Listeners may therefore subscribe, unsubscribe
//! and emit on the same channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::trace;

/// Listener callback stored by the channel.
pub type Listener<P> = Arc<dyn Fn(&P) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by `on`/`once`, used to unsubscribe.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// A listener failed while an event was being emitted.
#[derive(Debug, Error)]
#[error("listener for '{event}' failed: {source}")]
pub struct EmitError {
    pub event: String,
    #[source]
    pub source: anyhow::Error,
}

struct Registration<P> {
    id: ListenerId,
    event: String,
    once: bool,
    callback: Listener<P>,
}

/// In-process event channel.
pub struct EventChannel<P> {
    registrations: Mutex<Vec<Registration<P>>>,
    next_id: AtomicU64,
}

impl<P> EventChannel<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every emission of `event`.
    pub fn on<F>(&self, event: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&P) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(event.into(), false, Arc::new(callback))
    }

    /// Subscribe to the next emission of `event` only.
    pub fn once<F>(&self, event: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&P) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(event.into(), true, Arc::new(callback))
    }

    /// Remove one listener. Returns `false` if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut regs = self.lock();
        let before = regs.len();
        regs.retain(|r| r.id != id);
        regs.len() != before
    }

    /// Remove every listener of `event`. Returns how many were removed.
    pub fn remove_all(&self, event: &str) -> usize {
        let mut regs = self.lock();
        let before = regs.len();
        regs.retain(|r| r.event != event);
        before - regs.len()
    }

    /// Remove every listener of every event.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().iter().filter(|r| r.event == event).count()
    }

    /// Invoke the listeners of `event` with `payload`.
    ///
    /// Returns how many listeners were invoked.
    pub fn emit(&self, event: &str, payload: &P) -> Result<usize, EmitError> {
        let targets: Vec<(ListenerId, bool, Listener<P>)> = self
            .lock()
            .iter()
            .filter(|r| r.event == event)
            .map(|r| (r.id, r.once, r.callback.clone()))
            .collect();

        trace!(event, listeners = targets.len(), "emit");

        let mut invoked = 0;
        for (id, once, callback) in targets {
            // Already consumed by a re-entrant emit (or removed with `off`).
            if once && !self.off(id) {
                continue;
            }
            invoked += 1;
            callback(payload).map_err(|source| EmitError {
                event: event.to_string(),
                source,
            })?;
        }
        Ok(invoked)
    }

    fn register(&self, event: String, once: bool, callback: Listener<P>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Registration {
            id,
            event,
            once,
            callback,
        });
        id
    }

    // Listeners never run under the lock, so a poisoned registry is still
    // structurally sound.
    fn lock(&self) -> MutexGuard<'_, Vec<Registration<P>>> {
        self.registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<P> Default for EventChannel<P> {
    fn default() -> Self {
        Self {
            registrations: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<P> core::fmt::Debug for EventChannel<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventChannel")
            .field("listeners", &self.lock().len())
            .finish()
    }
}
