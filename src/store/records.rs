//! Record implementations for the domain types.

use crate::types::{PendingReview, Restaurant, Review};

use super::traits::{Collection, Record};

impl Record for Restaurant {
  fn collection() -> Collection {
    Collection::Restaurants
  }

  fn primary_key(&self) -> Option<u64> {
    Some(self.id)
  }

  fn index_value(&self, _field: &str) -> Option<u64> {
    None
  }
}

impl Record for Review {
  fn collection() -> Collection {
    Collection::Reviews
  }

  fn primary_key(&self) -> Option<u64> {
    None
  }

  fn index_value(&self, field: &str) -> Option<u64> {
    match field {
      "restaurant_id" => Some(self.restaurant_id),
      _ => None,
    }
  }
}

impl Record for PendingReview {
  fn collection() -> Collection {
    Collection::PendingReviews
  }

  fn primary_key(&self) -> Option<u64> {
    None
  }

  fn index_value(&self, field: &str) -> Option<u64> {
    self.0.index_value(field)
  }
}
