//! Local persistent store.
//!
//! This module provides a small document store over SQLite that:
//! - Keeps three fixed collections (restaurants, reviews, pending reviews)
//! - Supports one secondary index (reviews by restaurant)
//! - Upgrades its layout forward through versioned, idempotent steps
//! - Falls back to a no-op backend when nothing can be persisted

mod records;
pub mod schema;
mod storage;
mod traits;

pub use storage::{NoopStorage, SqliteStorage, Storage};
pub use traits::{Collection, IndexDef, KeyPath, Record, StoredRecord, CURRENT_RESTAURANT};
