//! Storage trait and its SQLite and no-op implementations.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::StoreError;

use super::schema;
use super::traits::{Collection, Record, StoredRecord};

/// Trait for store backends.
///
/// Every call is atomic on its own. `put_all` writes all records or none.
pub trait Storage: Send + Sync + 'static {
  /// Whether writes survive the process. `false` means reads always miss.
  fn is_persistent(&self) -> bool;

  /// All records of a collection in key order.
  fn get_all<T: Record>(&self) -> Result<Vec<StoredRecord<T>>, StoreError>;

  /// Records whose indexed field equals `key`, in key order.
  fn get_by_index<T: Record>(&self, index: &str, key: u64)
    -> Result<Vec<StoredRecord<T>>, StoreError>;

  /// Insert or replace a record, returning its key.
  fn put<T: Record>(&self, record: &T) -> Result<i64, StoreError>;

  /// Insert or replace several records in one transaction.
  fn put_all<T: Record>(&self, records: &[T]) -> Result<Vec<i64>, StoreError>;

  /// Remove a record by key. Removing a missing key is not an error.
  fn delete<T: Record>(&self, key: i64) -> Result<(), StoreError>;

  /// Number of records in a collection.
  fn count<T: Record>(&self) -> Result<usize, StoreError>;
}

/// Storage implementation that doesn't keep anything.
/// Used when no persistence is available - every read misses.
pub struct NoopStorage;

impl Storage for NoopStorage {
  fn is_persistent(&self) -> bool {
    false
  }

  fn get_all<T: Record>(&self) -> Result<Vec<StoredRecord<T>>, StoreError> {
    Ok(Vec::new()) // Always miss
  }

  fn get_by_index<T: Record>(
    &self,
    _index: &str,
    _key: u64,
  ) -> Result<Vec<StoredRecord<T>>, StoreError> {
    Ok(Vec::new()) // Always miss
  }

  fn put<T: Record>(&self, _record: &T) -> Result<i64, StoreError> {
    Ok(0) // Discard
  }

  fn put_all<T: Record>(&self, records: &[T]) -> Result<Vec<i64>, StoreError> {
    Ok(vec![0; records.len()]) // Discard
  }

  fn delete<T: Record>(&self, _key: i64) -> Result<(), StoreError> {
    Ok(())
  }

  fn count<T: Record>(&self) -> Result<usize, StoreError> {
    Ok(0)
  }
}

/// SQLite-backed storage. One table per collection, records stored as JSON.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (creating if needed) the store at `path` and bring its schema up to date.
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        StoreError::Unavailable(format!(
          "failed to create store directory {}: {}",
          parent.display(),
          e
        ))
      })?;
    }

    let conn = Connection::open(path).map_err(|e| {
      StoreError::Unavailable(format!(
        "failed to open store at {}: {}",
        path.display(),
        e
      ))
    })?;

    let storage = Self::with_connection(conn)?;
    info!(path = %path.display(), "opened local store");
    Ok(storage)
  }

  /// Open a store that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self, StoreError> {
    let conn = Connection::open_in_memory()
      .map_err(|e| StoreError::Unavailable(format!("failed to open in-memory store: {}", e)))?;
    Self::with_connection(conn)
  }

  fn with_connection(mut conn: Connection) -> Result<Self, StoreError> {
    schema::migrate(&mut conn)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default store location.
  pub fn default_path() -> Result<PathBuf, StoreError> {
    let data_dir = Config::data_dir()
      .ok_or_else(|| StoreError::Unavailable("could not determine data directory".to_string()))?;

    Ok(data_dir.join("store.db"))
  }

  /// Schema version recorded in the store.
  pub fn version(&self) -> Result<u32, StoreError> {
    schema::current_version(&*self.lock()?)
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
    self.conn.lock().map_err(|_| StoreError::LockPoisoned)
  }
}

/// Write one record through `conn`. Shared by `put` and `put_all`.
fn insert<T: Record>(conn: &Connection, record: &T) -> Result<i64, StoreError> {
  let collection = T::collection();
  let mut columns = Vec::new();
  let mut values = Vec::new();

  let explicit_key = match record.primary_key() {
    Some(key) => Some(i64::try_from(key).map_err(|_| StoreError::KeyOutOfRange(key))?),
    None => None,
  };
  if let Some(key) = explicit_key {
    columns.push(collection.key_column());
    values.push(SqlValue::Integer(key));
  }

  for index in collection.indexes() {
    columns.push(index.field);
    values.push(match record.index_value(index.field) {
      Some(value) => SqlValue::Integer(
        i64::try_from(value).map_err(|_| StoreError::KeyOutOfRange(value))?,
      ),
      None => SqlValue::Null,
    });
  }

  columns.push("data");
  values.push(SqlValue::Blob(serde_json::to_vec(record)?));

  let sql = format!(
    "INSERT OR REPLACE INTO \"{}\" ({}) VALUES ({})",
    collection.name(),
    columns
      .iter()
      .map(|column| format!("\"{}\"", column))
      .collect::<Vec<_>>()
      .join(", "),
    vec!["?"; columns.len()].join(", ")
  );

  conn.execute(&sql, params_from_iter(values))?;

  Ok(explicit_key.unwrap_or_else(|| conn.last_insert_rowid()))
}

/// Run a keyed select and decode every row.
fn select<T: Record>(
  conn: &Connection,
  sql: &str,
  args: &[SqlValue],
) -> Result<Vec<StoredRecord<T>>, StoreError> {
  let mut stmt = conn.prepare(sql)?;
  let rows = stmt
    .query_map(params_from_iter(args.iter()), |row| {
      Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
    })?
    .collect::<Result<Vec<_>, _>>()?;

  rows
    .into_iter()
    .map(|(key, data)| -> Result<StoredRecord<T>, StoreError> {
      let record = serde_json::from_slice(&data)?;
      Ok(StoredRecord { key, record })
    })
    .collect()
}

fn quoted(collection: Collection) -> (String, String) {
  (
    format!("\"{}\"", collection.name()),
    format!("\"{}\"", collection.key_column()),
  )
}

impl Storage for SqliteStorage {
  fn is_persistent(&self) -> bool {
    true
  }

  fn get_all<T: Record>(&self) -> Result<Vec<StoredRecord<T>>, StoreError> {
    let conn = self.lock()?;
    let (table, key) = quoted(T::collection());

    select(
      &conn,
      &format!("SELECT {key}, data FROM {table} ORDER BY {key}"),
      &[],
    )
  }

  fn get_by_index<T: Record>(
    &self,
    index: &str,
    value: u64,
  ) -> Result<Vec<StoredRecord<T>>, StoreError> {
    let collection = T::collection();
    let def = collection
      .index(index)
      .ok_or_else(|| StoreError::UnknownIndex {
        collection: collection.name(),
        index: index.to_string(),
      })?;
    let value = i64::try_from(value).map_err(|_| StoreError::KeyOutOfRange(value))?;

    let conn = self.lock()?;
    let (table, key) = quoted(collection);

    select(
      &conn,
      &format!(
        "SELECT {key}, data FROM {table} WHERE \"{}\" = ? ORDER BY {key}",
        def.field
      ),
      &[SqlValue::Integer(value)],
    )
  }

  fn put<T: Record>(&self, record: &T) -> Result<i64, StoreError> {
    let conn = self.lock()?;
    insert(&conn, record)
  }

  fn put_all<T: Record>(&self, records: &[T]) -> Result<Vec<i64>, StoreError> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;

    let keys = records
      .iter()
      .map(|record| insert(&tx, record))
      .collect::<Result<Vec<_>, _>>()?;

    tx.commit()?;
    debug!(
      collection = T::collection().name(),
      count = keys.len(),
      "stored batch"
    );
    Ok(keys)
  }

  fn delete<T: Record>(&self, key: i64) -> Result<(), StoreError> {
    let conn = self.lock()?;
    let (table, key_column) = quoted(T::collection());

    conn.execute(
      &format!("DELETE FROM {table} WHERE {key_column} = ?"),
      params![key],
    )?;
    Ok(())
  }

  fn count<T: Record>(&self) -> Result<usize, StoreError> {
    let conn = self.lock()?;
    let (table, _) = quoted(T::collection());

    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
      row.get(0)
    })?;
    Ok(count as usize)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::traits::CURRENT_RESTAURANT;
  use crate::types::{PendingReview, Restaurant, Review};
  use serde_json::json;

  fn restaurant(id: u64, name: &str) -> Restaurant {
    serde_json::from_value(json!({
      "id": id,
      "name": name,
      "neighborhood": "Manhattan",
      "cuisine_type": "Asian"
    }))
    .unwrap()
  }

  fn review(restaurant_id: u64, name: &str) -> Review {
    serde_json::from_value(json!({
      "restaurant_id": restaurant_id,
      "name": name,
      "rating": 4,
      "comments": "fine"
    }))
    .unwrap()
  }

  #[test]
  fn test_put_upserts_by_explicit_key() {
    let storage = SqliteStorage::open_in_memory().unwrap();

    assert_eq!(storage.put(&restaurant(1, "A")).unwrap(), 1);
    assert_eq!(storage.put(&restaurant(1, "B")).unwrap(), 1);

    let all = storage.get_all::<Restaurant>().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].key, 1);
    assert_eq!(all[0].record.name, "B");
  }

  #[test]
  fn test_put_assigns_increasing_keys() {
    let storage = SqliteStorage::open_in_memory().unwrap();

    let first = storage.put(&review(1, "Ana")).unwrap();
    let second = storage.put(&review(1, "Ana")).unwrap();
    assert!(second > first);
    assert_eq!(storage.count::<Review>().unwrap(), 2);
  }

  #[test]
  fn test_get_by_index() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .put_all(&[review(1, "Ana"), review(2, "Bo"), review(1, "Cy")])
      .unwrap();

    let names: Vec<String> = storage
      .get_by_index::<Review>(CURRENT_RESTAURANT.name, 1)
      .unwrap()
      .into_iter()
      .map(|stored| stored.record.name)
      .collect();
    assert_eq!(names, vec!["Ana", "Cy"]);

    assert!(storage
      .get_by_index::<Review>(CURRENT_RESTAURANT.name, 3)
      .unwrap()
      .is_empty());
  }

  #[test]
  fn test_unknown_index_is_rejected() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let err = storage
      .get_by_index::<PendingReview>(CURRENT_RESTAURANT.name, 1)
      .unwrap_err();
    assert!(matches!(err, StoreError::UnknownIndex { .. }));
  }

  #[test]
  fn test_collections_are_separate() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put(&review(1, "Ana")).unwrap();
    storage.put(&PendingReview(review(1, "Ana"))).unwrap();

    assert_eq!(storage.count::<Review>().unwrap(), 1);
    assert_eq!(storage.count::<PendingReview>().unwrap(), 1);

    let pending = storage.get_all::<PendingReview>().unwrap();
    storage.delete::<PendingReview>(pending[0].key).unwrap();
    assert_eq!(storage.count::<PendingReview>().unwrap(), 0);
    assert_eq!(storage.count::<Review>().unwrap(), 1);
  }

  #[test]
  fn test_failed_batch_is_not_observable() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let too_big = restaurant(u64::MAX, "overflow");

    let err = storage
      .put_all(&[restaurant(1, "A"), restaurant(2, "B"), too_big])
      .unwrap_err();
    assert!(matches!(err, StoreError::KeyOutOfRange(_)));
    assert_eq!(storage.count::<Restaurant>().unwrap(), 0);
  }

  #[test]
  fn test_round_trip_is_exact() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let original: Restaurant = serde_json::from_value(json!({
      "id": 5,
      "name": "Hometown BBQ",
      "neighborhood": "Brooklyn",
      "cuisine_type": "American",
      "latlng": {"lat": 40.675, "lng": -74.016},
      "operating_hours": {"Monday": "Closed", "Tuesday": "12:00 pm - 10:00 pm"},
      "is_favorite": "true",
      "updatedAt": "2018-07-01T00:00:00.000Z"
    }))
    .unwrap();

    storage.put(&original).unwrap();
    let stored = storage.get_all::<Restaurant>().unwrap();
    assert_eq!(stored[0].record, original);
    assert_eq!(
      serde_json::to_vec(&stored[0].record).unwrap(),
      serde_json::to_vec(&original).unwrap()
    );
  }

  #[test]
  fn test_open_on_disk_creates_parent() {
    let dir = std::env::temp_dir().join(format!("dinecache-test-{}", std::process::id()));
    let path = dir.join("nested").join("store.db");

    let storage = SqliteStorage::open(&path).unwrap();
    assert_eq!(storage.version().unwrap(), schema::target_version());
    storage.put(&restaurant(1, "A")).unwrap();
    drop(storage);

    let reopened = SqliteStorage::open(&path).unwrap();
    assert_eq!(reopened.count::<Restaurant>().unwrap(), 1);

    let _ = std::fs::remove_dir_all(dir);
  }

  #[test]
  fn test_noop_storage_always_misses() {
    let storage = NoopStorage;
    storage.put(&restaurant(1, "A")).unwrap();
    assert!(!storage.is_persistent());
    assert!(storage.get_all::<Restaurant>().unwrap().is_empty());
  }
}
