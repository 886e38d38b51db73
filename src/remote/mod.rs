//! Client for the restaurant backend.

mod client;
#[cfg(test)]
pub(crate) mod fake;

pub use client::{DirectoryApi, HttpClient};
