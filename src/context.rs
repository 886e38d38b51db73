//! State of one restaurant detail page.

use tracing::warn;

use crate::directory::Directory;
use crate::error::SyncError;
use crate::remote::DirectoryApi;
use crate::store::Storage;
use crate::sync::SubmitOutcome;
use crate::types::{Restaurant, Review, ReviewDraft};

/// The restaurant a page shows and the reviews loaded for it.
///
/// Built by [`Directory::load_restaurant_page`] and passed explicitly to
/// whatever renders or mutates the page.
#[derive(Debug, Clone, PartialEq)]
pub struct RestaurantPage {
  pub restaurant: Restaurant,
  pub reviews: Vec<Review>,
}

impl RestaurantPage {
  pub fn new(restaurant: Restaurant, reviews: Vec<Review>) -> Self {
    Self {
      restaurant,
      reviews,
    }
  }

  pub fn restaurant_id(&self) -> u64 {
    self.restaurant.id
  }

  /// Flip the favorite flag. The page only changes once the backend confirms.
  pub async fn toggle_favorite<S: Storage, R: DirectoryApi>(
    &mut self,
    directory: &Directory<S, R>,
  ) -> Result<&Restaurant, SyncError> {
    let updated = directory
      .set_favorite(self.restaurant.id, self.restaurant.is_favorite.toggled())
      .await?;
    self.restaurant = updated;
    Ok(&self.restaurant)
  }

  /// Submit a review for this restaurant and show it immediately.
  ///
  /// The page shows the review whether it was delivered or queued.
  pub async fn add_review<S: Storage, R: DirectoryApi>(
    &mut self,
    directory: &Directory<S, R>,
    name: &str,
    rating: u8,
    comments: &str,
  ) -> Result<SubmitOutcome, SyncError> {
    let draft = ReviewDraft {
      restaurant_id: self.restaurant.id,
      name: name.to_string(),
      rating,
      comments: comments.to_string(),
    };
    let outcome = directory.submit_review(draft).await?;

    // Re-read so the page shows exactly what the store holds.
    match directory.fetch_reviews_by_restaurant(self.restaurant.id).await {
      Ok(reviews) => self.reviews = reviews,
      Err(e) => warn!(restaurant_id = self.restaurant.id, error = %e, "failed to refresh reviews"),
    }
    Ok(outcome)
  }
}
