//! Versioned store layout and the forward-only upgrade path.
//!
//! The layout is declared as an ordered list of [`Step`]s. Each step only
//! ensures that a table or index exists, so applying a step twice leaves the
//! store unchanged. The applied version is kept in SQLite's `user_version`.

use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

use crate::error::StoreError;

use super::traits::{Collection, IndexDef, KeyPath, CURRENT_RESTAURANT};

/// A single layout change.
#[derive(Debug, Clone, Copy)]
pub enum Change {
  EnsureCollection(Collection),
  EnsureIndex {
    collection: Collection,
    index: &'static IndexDef,
  },
}

impl Change {
  /// SQL that performs the change if it hasn't been made yet.
  pub fn sql(&self) -> String {
    match self {
      Change::EnsureCollection(collection) => {
        let key = match collection.key_path() {
          KeyPath::Field(field) => format!("\"{}\" INTEGER PRIMARY KEY", field),
          KeyPath::AutoIncrement => {
            format!("\"{}\" INTEGER PRIMARY KEY AUTOINCREMENT", collection.key_column())
          }
        };
        let mut columns = vec![key];
        columns.extend(
          collection
            .indexes()
            .iter()
            .map(|index| format!("\"{}\" INTEGER", index.field)),
        );
        columns.push("data BLOB NOT NULL".to_string());

        format!(
          "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
          collection.name(),
          columns.join(", ")
        )
      }
      Change::EnsureIndex { collection, index } => format!(
        "CREATE INDEX IF NOT EXISTS \"{}\" ON \"{}\" (\"{}\")",
        index.name,
        collection.name(),
        index.field
      ),
    }
  }
}

/// A versioned group of changes.
#[derive(Debug)]
pub struct Step {
  pub version: u32,
  pub description: &'static str,
  pub changes: &'static [Change],
}

/// Every step, in ascending version order.
pub const STEPS: &[Step] = &[
  Step {
    version: 1,
    description: "restaurants keyed by id",
    changes: &[Change::EnsureCollection(Collection::Restaurants)],
  },
  Step {
    version: 2,
    description: "reviews with store-assigned keys",
    changes: &[Change::EnsureCollection(Collection::Reviews)],
  },
  Step {
    version: 3,
    description: "reviews indexed by restaurant",
    changes: &[Change::EnsureIndex {
      collection: Collection::Reviews,
      index: &CURRENT_RESTAURANT,
    }],
  },
  Step {
    version: 4,
    description: "pending reviews awaiting delivery",
    changes: &[Change::EnsureCollection(Collection::PendingReviews)],
  },
];

/// Version the store ends up at after a successful upgrade.
pub fn target_version() -> u32 {
  target_of(STEPS)
}

fn target_of(steps: &[Step]) -> u32 {
  steps.iter().map(|step| step.version).max().unwrap_or(0)
}

/// Read the version recorded in the store.
pub fn current_version(conn: &Connection) -> Result<u32, StoreError> {
  let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
  Ok(version)
}

/// Bring the store up to [`target_version`].
pub fn migrate(conn: &mut Connection) -> Result<u32, StoreError> {
  upgrade(conn, STEPS)
}

/// Apply every step newer than the recorded version inside one transaction.
///
/// Nothing is committed unless every step succeeds.
pub fn upgrade(conn: &mut Connection, steps: &[Step]) -> Result<u32, StoreError> {
  let found = current_version(conn)?;
  let target = target_of(steps);

  if found > target {
    return Err(StoreError::VersionTooNew {
      found,
      supported: target,
    });
  }
  if found == target {
    debug!(version = found, "store schema up to date");
    return Ok(found);
  }

  let tx = conn.transaction()?;
  apply_steps(&tx, steps, found)?;
  tx.pragma_update(None, "user_version", target)?;
  tx.commit()?;

  info!(from = found, to = target, "upgraded store schema");
  Ok(target)
}

/// Apply the steps whose version is greater than `from`, in ascending order.
pub fn apply_steps(tx: &Transaction<'_>, steps: &[Step], from: u32) -> Result<(), StoreError> {
  let mut pending: Vec<&Step> = steps.iter().filter(|step| step.version > from).collect();
  pending.sort_by_key(|step| step.version);

  for step in pending {
    debug!(version = step.version, description = step.description, "applying schema step");
    for change in step.changes {
      tx.execute_batch(&change.sql())?;
    }
  }

  Ok(())
}

/// Tables and indexes currently in the store, as `(kind, name)` pairs.
pub fn layout(conn: &Connection) -> Result<Vec<(String, String)>, StoreError> {
  let mut stmt = conn.prepare(
    "SELECT type, name FROM sqlite_master
     WHERE type IN ('table', 'index') AND name NOT LIKE 'sqlite_%'
     ORDER BY type, name",
  )?;

  let rows = stmt
    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
    .collect::<Result<Vec<(String, String)>, _>>()?;

  Ok(rows)
}
