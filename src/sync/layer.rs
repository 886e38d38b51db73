//! Read-through layer that fills the local store from the backend on a miss.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{RemoteError, StoreError, SyncError};
use crate::store::{Record, Storage};

use super::inflight::InFlight;

/// Which local records answer a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
  /// Every record in the collection
  All,
  /// Records whose indexed field equals `value`
  Index { name: &'static str, value: u64 },
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Served from the local store
  Store,
  /// Fetched from the backend (and backfilled when possible)
  Network,
}

/// Result of a read, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  pub fn from_store(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Store,
    }
  }

  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }
}

/// Read-through cache for one record type.
///
/// Once the store holds records for a lookup they are returned as they are,
/// with no expiry. Only an empty lookup goes to the backend.
pub struct ReadThrough<S: Storage, T: Record> {
  storage: Arc<S>,
  inflight: InFlight<Lookup, CacheResult<Vec<T>>>,
}

impl<S: Storage, T: Record> ReadThrough<S, T> {
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      storage,
      inflight: InFlight::new(),
    }
  }

  /// Return the local records for `lookup`, or fetch, backfill, and return them.
  ///
  /// Concurrent calls for the same lookup share one local check and at most
  /// one backend request.
  pub async fn fetch<F, Fut>(
    &self,
    lookup: Lookup,
    fetcher: F,
  ) -> Result<CacheResult<Vec<T>>, SyncError>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>, RemoteError>> + Send + 'static,
  {
    let storage = Arc::clone(&self.storage);
    self
      .inflight
      .run(lookup, move || populate(storage, lookup, fetcher))
      .await
  }

  /// Lookups with a population in progress.
  pub fn in_flight(&self) -> usize {
    self.inflight.len()
  }
}

fn read_local<S: Storage, T: Record>(storage: &S, lookup: Lookup) -> Result<Vec<T>, StoreError> {
  let stored = match lookup {
    Lookup::All => storage.get_all::<T>()?,
    Lookup::Index { name, value } => storage.get_by_index::<T>(name, value)?,
  };
  Ok(stored.into_iter().map(|stored| stored.record).collect())
}

async fn populate<S, T, F, Fut>(
  storage: Arc<S>,
  lookup: Lookup,
  fetcher: F,
) -> Result<CacheResult<Vec<T>>, SyncError>
where
  S: Storage,
  T: Record,
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<Vec<T>, RemoteError>>,
{
  let collection = T::collection().name();

  // Check the store first
  match read_local::<S, T>(&storage, lookup) {
    Ok(records) if !records.is_empty() => {
      debug!(collection, ?lookup, count = records.len(), "served from local store");
      return Ok(CacheResult::from_store(records));
    }
    Ok(_) => {}
    Err(e) => {
      warn!(collection, ?lookup, error = %e, "local read failed; treating as a miss");
    }
  }

  // Nothing local, must fetch from network
  let fetched = fetcher().await.map_err(|e| {
    warn!(collection, ?lookup, error = %e, "remote fetch failed");
    SyncError::remote(e)
  })?;

  match storage.put_all(&fetched) {
    Ok(keys) => info!(collection, ?lookup, count = keys.len(), "backfilled local store"),
    Err(e) => warn!(collection, ?lookup, error = %e, "backfill failed; serving remote data only"),
  }

  Ok(CacheResult::from_network(fetched))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::fake::{restaurant, review, FakeApi};
  use crate::remote::DirectoryApi;
  use crate::store::{NoopStorage, SqliteStorage, CURRENT_RESTAURANT};
  use crate::types::{Restaurant, Review};
  use std::time::Duration;

  fn restaurants_via<'a>(
    layer: &'a ReadThrough<SqliteStorage, Restaurant>,
    api: &Arc<FakeApi>,
  ) -> impl Future<Output = Result<CacheResult<Vec<Restaurant>>, SyncError>> + 'a {
    let api = Arc::clone(api);
    layer.fetch(Lookup::All, move || async move { api.fetch_restaurants().await })
  }

  #[tokio::test]
  async fn test_miss_fetches_and_backfills() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let api = Arc::new(FakeApi::new(vec![restaurant(1, "A", "Italian", "X")]));
    let layer = ReadThrough::new(Arc::clone(&storage));

    let first = restaurants_via(&layer, &api).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(storage.count::<Restaurant>().unwrap(), 1);

    let second = restaurants_via(&layer, &api).await.unwrap();
    assert_eq!(second.source, CacheSource::Store);
    assert_eq!(api.restaurant_calls(), 1);
    assert_eq!(
      serde_json::to_vec(&first.data).unwrap(),
      serde_json::to_vec(&second.data).unwrap()
    );
  }

  #[tokio::test]
  async fn test_populated_store_never_calls_remote() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    storage
      .put_all(&[restaurant(2, "B", "Mexican", "Y")])
      .unwrap();
    let api = Arc::new(FakeApi::new(vec![restaurant(9, "Z", "Thai", "W")]));
    api.set_offline(true);
    let layer = ReadThrough::new(Arc::clone(&storage));

    for _ in 0..3 {
      let result = restaurants_via(&layer, &api).await.unwrap();
      assert_eq!(result.data.len(), 1);
      assert_eq!(result.data[0].id, 2);
    }
    assert_eq!(api.restaurant_calls(), 0);
  }

  #[tokio::test]
  async fn test_concurrent_misses_fetch_once() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let api = Arc::new(FakeApi::new(vec![
      restaurant(1, "A", "Italian", "X"),
      restaurant(2, "B", "Mexican", "Y"),
    ]));
    api.set_latency(Duration::from_millis(20));
    let layer = ReadThrough::new(Arc::clone(&storage));

    let calls = (0..8).map(|_| restaurants_via(&layer, &api));
    let results = futures::future::join_all(calls).await;

    assert_eq!(api.restaurant_calls(), 1);
    for result in results {
      assert_eq!(result.unwrap().data.len(), 2);
    }
    assert_eq!(storage.count::<Restaurant>().unwrap(), 2);
    assert_eq!(layer.in_flight(), 0);
  }

  #[tokio::test]
  async fn test_remote_failure_is_surfaced_without_writes() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let api = Arc::new(FakeApi::new(vec![restaurant(1, "A", "Italian", "X")]));
    api.set_offline(true);
    let layer = ReadThrough::new(Arc::clone(&storage));

    let err = restaurants_via(&layer, &api).await.unwrap_err();
    assert!(err.is_remote());
    assert_eq!(storage.count::<Restaurant>().unwrap(), 0);

    // Not retried by the layer itself, but the next call tries again.
    api.set_offline(false);
    assert!(restaurants_via(&layer, &api).await.is_ok());
    assert_eq!(api.restaurant_calls(), 2);
  }

  #[tokio::test]
  async fn test_index_lookup_backfills_per_key() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let api = Arc::new(
      FakeApi::new(Vec::new()).with_reviews(vec![review(1, 1, "Ana"), review(2, 2, "Bo")]),
    );
    let layer: ReadThrough<SqliteStorage, Review> = ReadThrough::new(Arc::clone(&storage));

    for id in [1, 2, 1, 2] {
      let api = Arc::clone(&api);
      let result = layer
        .fetch(
          Lookup::Index {
            name: CURRENT_RESTAURANT.name,
            value: id,
          },
          move || async move { api.fetch_reviews(id).await },
        )
        .await
        .unwrap();
      assert_eq!(result.data.len(), 1);
      assert_eq!(result.data[0].restaurant_id, id);
    }

    assert_eq!(api.review_calls(), 2);
    assert_eq!(storage.count::<Review>().unwrap(), 2);
  }

  #[tokio::test]
  async fn test_noop_storage_degrades_to_remote_only() {
    let api = Arc::new(FakeApi::new(vec![restaurant(1, "A", "Italian", "X")]));
    let layer: ReadThrough<NoopStorage, Restaurant> = ReadThrough::new(Arc::new(NoopStorage));

    for _ in 0..2 {
      let api = Arc::clone(&api);
      let result = layer
        .fetch(Lookup::All, move || async move { api.fetch_restaurants().await })
        .await
        .unwrap();
      assert_eq!(result.source, CacheSource::Network);
    }
    assert_eq!(api.restaurant_calls(), 2);
  }
}
