//! Settlement: "every targeted store changed at least once".
//!
//! A settlement subscribes once to the next `change` event of each store it
//! watches and resolves when all of them fired. It is an all-of combinator:
//! a store that never changes keeps it pending.
//!
//! ## Waiting
//!
//! - `Future`: `settlement.await` (no timer of its own; wrap it in the
//!   runtime's timeout if needed).
//! - `wait()` / `wait_timeout(d)`: block the current thread. In the
//!   single-threaded model a settlement that is still pending after
//!   `dispatch` returned only resolves if some other thread (or an observer)
//!   emits the missing changes, so prefer a bounded wait.
//!
//! ## Cancellation
//!
//! Dropping (or `cancel`-ing) a pending settlement removes its outstanding
//! subscriptions; it will never resolve. `detach` keeps the subscriptions so
//! the resolution side effect (`change:all`) still happens later.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use fluxcore_core::{FluxError, FluxResult};
use fluxcore_events::{CHANGE, ListenerId};

use crate::store::{Store, WeakStore};

/// Identifier correlating one dispatch (or `wait_for`) with its settlement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DispatchId(Uuid);

impl DispatchId {
    /// Time-ordered (UUIDv7) identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DispatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for DispatchId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Runs once, when the last watched store changed.
pub(crate) type OnSettled = Box<dyn FnOnce(DispatchId) -> anyhow::Result<()> + Send>;

struct Slot {
    store: String,
    fired: bool,
}

struct Progress {
    slots: Vec<Slot>,
    remaining: usize,
    waker: Option<Waker>,
    on_settled: Option<OnSettled>,
}

struct Shared {
    id: DispatchId,
    progress: Mutex<Progress>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Progress> {
        self.progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fire(&self, slot: usize) -> anyhow::Result<()> {
        {
            let mut progress = self.lock();
            let Some(entry) = progress.slots.get_mut(slot) else {
                return Ok(());
            };
            if entry.fired {
                return Ok(());
            }
            entry.fired = true;
            progress.remaining -= 1;
            if progress.remaining > 0 {
                return Ok(());
            }
        }
        self.settle()
    }

    fn settle(&self) -> anyhow::Result<()> {
        let (waker, on_settled) = {
            let mut progress = self.lock();
            (progress.waker.take(), progress.on_settled.take())
        };
        self.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
        debug!(dispatch_id = %self.id, "settled");
        match on_settled {
            Some(callback) => callback(self.id),
            None => Ok(()),
        }
    }
}

/// Pending (or resolved) all-of over the next `change` of a set of stores.
#[must_use = "dropping a pending settlement cancels it"]
pub struct Settlement {
    shared: Arc<Shared>,
    subscriptions: Vec<(WeakStore, ListenerId)>,
    default_timeout: Option<Duration>,
}

impl Settlement {
    /// Subscribe to the next `change` of every store in `stores`.
    ///
    /// With no stores the settlement resolves immediately (and `on_settled`
    /// runs before this returns).
    pub(crate) fn watch(
        stores: &[Store],
        default_timeout: Option<Duration>,
        on_settled: Option<OnSettled>,
    ) -> FluxResult<Self> {
        let id = DispatchId::new();
        let shared = Arc::new(Shared {
            id,
            progress: Mutex::new(Progress {
                slots: stores
                    .iter()
                    .map(|s| Slot {
                        store: s.name().to_string(),
                        fired: false,
                    })
                    .collect(),
                remaining: stores.len(),
                waker: None,
                on_settled,
            }),
            ready: Condvar::new(),
        });

        let subscriptions = stores
            .iter()
            .enumerate()
            .map(|(slot, store)| {
                let shared = shared.clone();
                let listener = store
                    .listener()
                    .once(CHANGE, move |_| shared.fire(slot));
                (store.downgrade(), listener)
            })
            .collect();

        if stores.is_empty() {
            shared
                .settle()
                .map_err(|source| FluxError::handler("dispatcher", "change:all", source))?;
        }

        debug!(dispatch_id = %id, stores = stores.len(), "watching for settlement");
        Ok(Self {
            shared,
            subscriptions,
            default_timeout,
        })
    }

    /// An already-resolved settlement (nothing to wait for).
    pub fn resolved() -> Self {
        Self {
            shared: Arc::new(Shared {
                id: DispatchId::new(),
                progress: Mutex::new(Progress {
                    slots: Vec::new(),
                    remaining: 0,
                    waker: None,
                    on_settled: None,
                }),
                ready: Condvar::new(),
            }),
            subscriptions: Vec::new(),
            default_timeout: None,
        }
    }

    pub fn id(&self) -> DispatchId {
        self.shared.id
    }

    pub fn is_settled(&self) -> bool {
        self.shared.lock().remaining == 0
    }

    /// Number of stores that have not changed yet.
    pub fn pending(&self) -> usize {
        self.shared.lock().remaining
    }

    /// Names of the stores that have not changed yet.
    pub fn pending_stores(&self) -> Vec<String> {
        self.shared
            .lock()
            .slots
            .iter()
            .filter(|s| !s.fired)
            .map(|s| s.store.clone())
            .collect()
    }

    /// Block until settled, bounded by the configured default timeout (if any).
    pub fn wait(&self) -> FluxResult<()> {
        if let Some(timeout) = self.default_timeout {
            return self.wait_timeout(timeout);
        }
        let progress = self.shared.lock();
        let _settled = self
            .shared
            .ready
            .wait_while(progress, |p| p.remaining > 0)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(())
    }

    /// Block until settled or until `timeout` elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> FluxResult<()> {
        let progress = self.shared.lock();
        let (progress, _) = self
            .shared
            .ready
            .wait_timeout_while(progress, timeout, |p| p.remaining > 0)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if progress.remaining > 0 {
            return Err(FluxError::SettlementTimeout {
                waited: timeout,
                pending: progress.remaining,
            });
        }
        Ok(())
    }

    /// Stop waiting. Outstanding subscriptions are removed.
    pub fn cancel(self) {
        if !self.is_settled() {
            debug!(dispatch_id = %self.id(), pending = self.pending(), "settlement cancelled");
        }
    }

    /// Give up the handle but keep listening, so the resolution still happens.
    pub fn detach(mut self) {
        self.subscriptions.clear();
    }
}

impl Future for Settlement {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut progress = self.shared.lock();
        if progress.remaining == 0 {
            Poll::Ready(())
        } else {
            progress.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

impl Drop for Settlement {
    fn drop(&mut self) {
        for (store, listener) in self.subscriptions.drain(..) {
            if let Some(store) = store.upgrade() {
                store.listener().off(listener);
            }
        }
    }
}

impl core::fmt::Debug for Settlement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Settlement")
            .field("id", &self.id())
            .field("pending", &self.pending())
            .finish()
    }
}
