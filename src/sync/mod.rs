//! Coordination between the local store and the backend.
//!
//! - [`ReadThrough`] serves reads from the store and fills it on a miss
//! - [`WriteBehind`] handles favorites, review submission, and the pending queue
//! - [`InFlight`] keeps concurrent callers from repeating the same work

mod inflight;
mod layer;
mod writes;

pub use inflight::InFlight;
pub use layer::{CacheResult, CacheSource, Lookup, ReadThrough};
pub use writes::{DrainReport, SubmitOutcome, WriteBehind};
