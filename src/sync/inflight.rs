//! De-duplication of concurrent work for the same key.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::SyncError;

type SharedResult<V> = Shared<BoxFuture<'static, Result<V, SyncError>>>;

/// Map of in-flight operations keyed by `K`.
///
/// While an operation for a key is running, later callers for the same key
/// await the running one instead of starting their own. The entry is removed
/// as soon as the operation completes, so the next call starts fresh.
pub struct InFlight<K, V> {
  pending: Mutex<HashMap<K, SharedResult<V>>>,
}

impl<K, V> InFlight<K, V>
where
  K: Eq + Hash + Clone + std::fmt::Debug,
  V: Clone + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      pending: Mutex::new(HashMap::new()),
    }
  }

  /// Run `start()` for `key`, or join the run already in progress.
  pub async fn run<F, Fut>(&self, key: K, start: F) -> Result<V, SyncError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, SyncError>> + Send + 'static,
  {
    let shared = {
      let mut pending = self.lock();
      match pending.get(&key) {
        Some(running) => {
          debug!(?key, "joining in-flight operation");
          running.clone()
        }
        None => {
          let fresh = start().boxed().shared();
          pending.insert(key.clone(), fresh.clone());
          fresh
        }
      }
    };

    let result = shared.clone().await;

    let mut pending = self.lock();
    if pending
      .get(&key)
      .is_some_and(|current| current.ptr_eq(&shared))
    {
      pending.remove(&key);
    }

    result
  }

  /// Number of keys with an operation in progress.
  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<K, SharedResult<V>>> {
    // The map is left consistent between statements, so a poisoned lock is still usable.
    self.pending.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<K, V> Default for InFlight<K, V>
where
  K: Eq + Hash + Clone + std::fmt::Debug,
  V: Clone + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}
