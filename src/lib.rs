//! Offline-first data layer for a restaurant directory.
//!
//! Restaurants and reviews are read through a local SQLite store that is
//! filled from the backend on first use. New reviews are written locally
//! first and queued for delivery when the backend is unreachable.

pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod query;
pub mod remote;
pub mod store;
pub mod sync;
pub mod types;

pub use config::Config;
pub use context::RestaurantPage;
pub use directory::Directory;
pub use error::{RemoteError, StoreError, SyncError};
pub use query::Choice;
pub use remote::{DirectoryApi, HttpClient};
pub use store::{NoopStorage, SqliteStorage, Storage};
pub use sync::{DrainReport, SubmitOutcome};
pub use types::{Favorite, LatLng, PendingReview, Restaurant, Review, ReviewDraft};
