//! Consumer-facing API over the store and the backend.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::RestaurantPage;
use crate::error::SyncError;
use crate::query::{self, Choice};
use crate::remote::DirectoryApi;
use crate::store::{Storage, CURRENT_RESTAURANT};
use crate::sync::{DrainReport, Lookup, ReadThrough, SubmitOutcome, WriteBehind};
use crate::types::{PendingReview, Restaurant, Review, ReviewDraft};

/// Restaurant directory with transparent offline support.
///
/// Reads come from the local store once it holds data and from the backend
/// otherwise. Review submissions are stored locally first and queued when the
/// backend can't be reached.
pub struct Directory<S: Storage, R: DirectoryApi> {
  api: Arc<R>,
  restaurants: Arc<ReadThrough<S, Restaurant>>,
  reviews: Arc<ReadThrough<S, Review>>,
  writes: Arc<WriteBehind<S, R>>,
}

impl<S: Storage, R: DirectoryApi> Directory<S, R> {
  pub fn new(storage: S, api: R) -> Self {
    Self::from_shared(Arc::new(storage), Arc::new(api))
  }

  pub fn from_shared(storage: Arc<S>, api: Arc<R>) -> Self {
    Self {
      restaurants: Arc::new(ReadThrough::new(Arc::clone(&storage))),
      reviews: Arc::new(ReadThrough::new(Arc::clone(&storage))),
      writes: Arc::new(WriteBehind::new(storage, Arc::clone(&api))),
      api,
    }
  }

  /// All restaurants.
  pub async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>, SyncError> {
    let api = Arc::clone(&self.api);
    let result = self
      .restaurants
      .fetch(Lookup::All, move || async move { api.fetch_restaurants().await })
      .await?;

    debug!(source = ?result.source, count = result.data.len(), "restaurants");
    Ok(result.data)
  }

  pub async fn fetch_restaurant_by_id(&self, id: u64) -> Result<Restaurant, SyncError> {
    let restaurants = self.fetch_restaurants().await?;
    query::by_id(&restaurants, id)
      .cloned()
      .ok_or(SyncError::NotFound(id))
  }

  pub async fn fetch_by_cuisine(&self, cuisine: &str) -> Result<Vec<Restaurant>, SyncError> {
    Ok(query::by_cuisine(&self.fetch_restaurants().await?, cuisine))
  }

  pub async fn fetch_by_neighborhood(
    &self,
    neighborhood: &str,
  ) -> Result<Vec<Restaurant>, SyncError> {
    Ok(query::by_neighborhood(
      &self.fetch_restaurants().await?,
      neighborhood,
    ))
  }

  pub async fn fetch_by_cuisine_and_neighborhood(
    &self,
    cuisine: &Choice,
    neighborhood: &Choice,
  ) -> Result<Vec<Restaurant>, SyncError> {
    Ok(query::by_cuisine_and_neighborhood(
      &self.fetch_restaurants().await?,
      cuisine,
      neighborhood,
    ))
  }

  pub async fn fetch_neighborhoods(&self) -> Result<Vec<String>, SyncError> {
    Ok(query::neighborhoods(&self.fetch_restaurants().await?))
  }

  pub async fn fetch_cuisines(&self) -> Result<Vec<String>, SyncError> {
    Ok(query::cuisines(&self.fetch_restaurants().await?))
  }

  /// Reviews for one restaurant.
  ///
  /// Runs a pass over the pending queue first; its failures are logged and
  /// never fail the read.
  pub async fn fetch_reviews_by_restaurant(&self, id: u64) -> Result<Vec<Review>, SyncError> {
    match self.writes.drain_pending().await {
      Ok(report) if report.remaining > 0 => {
        debug!(remaining = report.remaining, "pending reviews left undelivered")
      }
      Ok(_) => {}
      Err(e) => warn!(error = %e, "pending review drain failed"),
    }

    let api = Arc::clone(&self.api);
    let lookup = Lookup::Index {
      name: CURRENT_RESTAURANT.name,
      value: id,
    };
    let result = self
      .reviews
      .fetch(lookup, move || async move { api.fetch_reviews(id).await })
      .await?;

    debug!(restaurant_id = id, source = ?result.source, count = result.data.len(), "reviews");
    Ok(result.data)
  }

  pub async fn submit_review(&self, draft: ReviewDraft) -> Result<SubmitOutcome, SyncError> {
    self.writes.submit_review(draft).await
  }

  pub async fn set_favorite(&self, id: u64, favorite: bool) -> Result<Restaurant, SyncError> {
    self.writes.set_favorite(id, favorite).await
  }

  /// Flip the favorite flag of a restaurant. An unset flag becomes a favorite.
  pub async fn toggle_favorite(&self, id: u64) -> Result<Restaurant, SyncError> {
    let restaurant = self.fetch_restaurant_by_id(id).await?;
    self
      .set_favorite(id, restaurant.is_favorite.toggled())
      .await
  }

  /// Retry delivery of queued reviews now.
  pub async fn drain_pending(&self) -> Result<DrainReport, SyncError> {
    self.writes.drain_pending().await
  }

  pub fn pending_reviews(&self) -> Result<Vec<PendingReview>, SyncError> {
    self.writes.pending()
  }

  /// Load everything a restaurant detail page shows.
  pub async fn load_restaurant_page(&self, id: u64) -> Result<RestaurantPage, SyncError> {
    let restaurant = self.fetch_restaurant_by_id(id).await?;
    let reviews = self.fetch_reviews_by_restaurant(id).await?;
    Ok(RestaurantPage::new(restaurant, reviews))
  }

  pub fn url_for_restaurant(restaurant: &Restaurant) -> String {
    restaurant.page_url()
  }

  pub fn image_url_for_restaurant(restaurant: &Restaurant) -> Option<String> {
    restaurant.image_url()
  }
}

impl<S: Storage, R: DirectoryApi> Clone for Directory<S, R> {
  fn clone(&self) -> Self {
    Self {
      api: Arc::clone(&self.api),
      restaurants: Arc::clone(&self.restaurants),
      reviews: Arc::clone(&self.reviews),
      writes: Arc::clone(&self.writes),
    }
  }
}
