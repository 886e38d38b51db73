//! Collections, indexes, and the record trait the store is generic over.

use serde::{de::DeserializeOwned, Serialize};

/// A secondary index on a collection.
#[derive(Debug, PartialEq, Eq)]
pub struct IndexDef {
  pub name: &'static str,
  /// Record field the index is built from; mirrored into a column of the same name.
  pub field: &'static str,
}

/// Reviews by the restaurant they belong to.
pub const CURRENT_RESTAURANT: IndexDef = IndexDef {
  name: "current-restaurant",
  field: "restaurant_id",
};

static REVIEW_INDEXES: [IndexDef; 1] = [CURRENT_RESTAURANT];

/// How a collection's primary key is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPath {
  /// Taken from a record field
  Field(&'static str),
  /// Assigned by the store on insert
  AutoIncrement,
}

/// The fixed set of collections kept in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
  Restaurants,
  Reviews,
  PendingReviews,
}

impl Collection {
  pub const ALL: [Collection; 3] = [
    Collection::Restaurants,
    Collection::Reviews,
    Collection::PendingReviews,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Collection::Restaurants => "restaurants",
      Collection::Reviews => "reviews",
      Collection::PendingReviews => "reviews-pending",
    }
  }

  pub fn key_path(self) -> KeyPath {
    match self {
      Collection::Restaurants => KeyPath::Field("id"),
      Collection::Reviews | Collection::PendingReviews => KeyPath::AutoIncrement,
    }
  }

  /// Column holding the primary key.
  pub fn key_column(self) -> &'static str {
    match self.key_path() {
      KeyPath::Field(field) => field,
      KeyPath::AutoIncrement => "key",
    }
  }

  pub fn indexes(self) -> &'static [IndexDef] {
    match self {
      Collection::Reviews => &REVIEW_INDEXES,
      Collection::Restaurants | Collection::PendingReviews => &[],
    }
  }

  pub fn index(self, name: &str) -> Option<&'static IndexDef> {
    self.indexes().iter().find(|index| index.name == name)
  }
}

/// Trait for records that live in one of the store's collections.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Collection the record type is stored in
  fn collection() -> Collection;

  /// Explicit primary key. `None` for collections with store-assigned keys.
  fn primary_key(&self) -> Option<u64>;

  /// Value of an indexed field.
  fn index_value(&self, field: &str) -> Option<u64>;
}

/// A record read back from the store together with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord<T> {
  pub key: i64,
  pub record: T,
}
