//! Error types for the store, the remote client, and the consumer API.
//!
//! `StoreError` and `RemoteError` stay inside the crate's layers. Everything
//! handed to callers of [`crate::Directory`] is a [`SyncError`].

use std::sync::Arc;

use thiserror::Error;

/// Failures of the local persistent store.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("persistent storage unavailable: {0}")]
  Unavailable(String),

  #[error("SQLite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("Record serialization error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("Store lock poisoned")]
  LockPoisoned,

  #[error("Collection {collection} has no index named {index}")]
  UnknownIndex {
    collection: &'static str,
    index: String,
  },

  #[error("Store schema version {found} is newer than supported version {supported}")]
  VersionTooNew { found: u32, supported: u32 },

  #[error("Key {0} does not fit in a store key")]
  KeyOutOfRange(u64),
}

/// Failures talking to the backend.
#[derive(Debug, Error)]
pub enum RemoteError {
  #[error("HTTP request error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Backend responded with status {0}")]
  Status(reqwest::StatusCode),

  #[error("URL error: {0}")]
  Url(#[from] url::ParseError),

  #[error("Failed to decode response: {0}")]
  Decode(#[from] serde_json::Error),
}

/// Errors surfaced by the consumer-facing API.
///
/// Cloneable so one in-flight population can hand the same outcome to every
/// caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
  #[error("local storage is unavailable")]
  StorageUnavailable,

  #[error("remote backend unavailable: {0}")]
  RemoteUnavailable(#[source] Arc<RemoteError>),

  #[error("restaurant {0} does not exist")]
  NotFound(u64),

  #[error("invalid review: {0}")]
  InvalidReview(String),
}

impl SyncError {
  pub fn remote(err: RemoteError) -> Self {
    Self::RemoteUnavailable(Arc::new(err))
  }

  pub fn is_remote(&self) -> bool {
    matches!(self, Self::RemoteUnavailable(_))
  }
}

impl From<StoreError> for SyncError {
  fn from(_: StoreError) -> Self {
    Self::StorageUnavailable
  }
}

impl From<RemoteError> for SyncError {
  fn from(err: RemoteError) -> Self {
    Self::remote(err)
  }
}
