//! Test doubles shared by unit and integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use fluxcore_events::{ChangeCallback, ChangeObserver};

use crate::store::Store;

/// Observer that records what it watches and reports changes on demand.
#[derive(Default)]
pub(crate) struct ManualObserver {
    watched: Mutex<Vec<(String, Value, ChangeCallback)>>,
}

impl ManualObserver {
    pub(crate) fn watched(&self) -> Vec<(String, Value)> {
        self.watched
            .lock()
            .unwrap()
            .iter()
            .map(|(key, value, _)| (key.clone(), value.clone()))
            .collect()
    }

    /// Report `changes` to every callback watching `key`.
    pub(crate) fn notify(&self, key: &str, changes: Value) -> anyhow::Result<()> {
        let watched = self.watched.lock().unwrap();
        for (_, _, callback) in watched.iter().filter(|(k, _, _)| k == key) {
            callback(changes.clone())?;
        }
        Ok(())
    }
}

impl ChangeObserver for ManualObserver {
    fn observe(&self, key: &str, value: &Value, on_change: ChangeCallback) -> anyhow::Result<()> {
        self.watched
            .lock()
            .unwrap()
            .push((key.to_string(), value.clone(), on_change));
        Ok(())
    }
}

/// Count emissions of `event` on `store`.
pub(crate) fn count_events(store: &Store, event: &str) -> Arc<AtomicUsize> {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    store.listener().on(event, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    hits
}
