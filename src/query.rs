//! Filters and projections over the restaurant list.
//!
//! Everything here is a linear scan that keeps the input order. No I/O.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::types::Restaurant;

/// A filter value that either matches everything or one exact value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
  All,
  Only(String),
}

impl Choice {
  /// `"all"` selects everything; anything else is an exact match.
  pub fn new(value: &str) -> Self {
    match value {
      "all" => Choice::All,
      other => Choice::Only(other.to_string()),
    }
  }

  pub fn matches(&self, value: &str) -> bool {
    match self {
      Choice::All => true,
      Choice::Only(expected) => expected == value,
    }
  }
}

impl FromStr for Choice {
  type Err = std::convert::Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(Choice::new(s))
  }
}

impl From<Option<&str>> for Choice {
  fn from(value: Option<&str>) -> Self {
    value.map_or(Choice::All, Choice::new)
  }
}

impl fmt::Display for Choice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Choice::All => f.write_str("all"),
      Choice::Only(value) => f.write_str(value),
    }
  }
}

pub fn by_id(restaurants: &[Restaurant], id: u64) -> Option<&Restaurant> {
  restaurants.iter().find(|r| r.id == id)
}

pub fn by_cuisine(restaurants: &[Restaurant], cuisine: &str) -> Vec<Restaurant> {
  restaurants
    .iter()
    .filter(|r| r.cuisine_type == cuisine)
    .cloned()
    .collect()
}

pub fn by_neighborhood(restaurants: &[Restaurant], neighborhood: &str) -> Vec<Restaurant> {
  restaurants
    .iter()
    .filter(|r| r.neighborhood == neighborhood)
    .cloned()
    .collect()
}

pub fn by_cuisine_and_neighborhood(
  restaurants: &[Restaurant],
  cuisine: &Choice,
  neighborhood: &Choice,
) -> Vec<Restaurant> {
  restaurants
    .iter()
    .filter(|r| cuisine.matches(&r.cuisine_type) && neighborhood.matches(&r.neighborhood))
    .cloned()
    .collect()
}

/// Distinct neighborhoods in order of first appearance.
pub fn neighborhoods(restaurants: &[Restaurant]) -> Vec<String> {
  distinct(restaurants.iter().map(|r| r.neighborhood.as_str()))
}

/// Distinct cuisines in order of first appearance.
pub fn cuisines(restaurants: &[Restaurant]) -> Vec<String> {
  distinct(restaurants.iter().map(|r| r.cuisine_type.as_str()))
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
  let mut seen = HashSet::new();
  values
    .filter(|value| seen.insert(*value))
    .map(String::from)
    .collect()
}
