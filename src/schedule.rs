use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::debug;
use tokio::task::AbortHandle;

type Pending<K> = Arc<Mutex<HashMap<K, (u64, AbortHandle)>>>;

/// Delayed tasks on the tokio runtime, at most one pending per key. A task
/// drops its own entry once it has run.
pub struct Deferred<K> {
    pending: Pending<K>,
    next_id: AtomicU64,
}

impl<K> Default for Deferred<K> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<K: Eq + Hash + Clone + std::fmt::Debug + Send + 'static> Deferred<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `task` after `delay`, replacing whatever was pending for `key`.
    pub fn schedule<F>(&self, key: K, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let pending = self.pending.clone();
        let own_key = key.clone();

        // Held until the handle is stored, so the task cannot clean up first
        let mut map = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
            let mut map = pending.lock().unwrap_or_else(PoisonError::into_inner);
            if map.get(&own_key).is_some_and(|(current, _)| *current == id) {
                map.remove(&own_key);
            }
        })
        .abort_handle();

        if let Some((_, previous)) = map.insert(key.clone(), (id, handle)) {
            debug!("Replacing deferred task for {:?}", key);
            previous.abort();
        }
    }

    /// Aborts the task pending for `key`, if any.
    pub fn cancel(&self, key: &K) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if let Some((_, handle)) = pending {
            debug!("Cancelling deferred task for {:?}", key);
            handle.abort();
        }
    }

    /// Number of tasks still waiting to run.
    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
