//! Scripted backend used by the unit tests.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::RemoteError;
use crate::types::{Restaurant, Review};

use super::DirectoryApi;

#[derive(Default)]
pub struct FakeApi {
  restaurants: Mutex<Vec<Restaurant>>,
  reviews: Mutex<Vec<Review>>,
  offline: AtomicBool,
  latency_ms: AtomicU64,
  /// Successful posts left before posting starts failing; `None` is unlimited.
  post_budget: Mutex<Option<usize>>,
  restaurant_calls: AtomicUsize,
  review_calls: AtomicUsize,
  post_calls: AtomicUsize,
  favorite_calls: AtomicUsize,
}

impl FakeApi {
  pub fn new(restaurants: Vec<Restaurant>) -> Self {
    Self {
      restaurants: Mutex::new(restaurants),
      ..Self::default()
    }
  }

  pub fn with_reviews(self, reviews: Vec<Review>) -> Self {
    *self.reviews.lock().unwrap() = reviews;
    self
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  pub fn set_latency(&self, latency: Duration) {
    self
      .latency_ms
      .store(latency.as_millis() as u64, Ordering::SeqCst);
  }

  pub fn allow_posts(&self, count: usize) {
    *self.post_budget.lock().unwrap() = Some(count);
  }

  pub fn restaurant_calls(&self) -> usize {
    self.restaurant_calls.load(Ordering::SeqCst)
  }

  pub fn review_calls(&self) -> usize {
    self.review_calls.load(Ordering::SeqCst)
  }

  pub fn post_calls(&self) -> usize {
    self.post_calls.load(Ordering::SeqCst)
  }

  pub fn favorite_calls(&self) -> usize {
    self.favorite_calls.load(Ordering::SeqCst)
  }

  /// Reviews the backend holds, including delivered ones.
  pub fn server_reviews(&self) -> Vec<Review> {
    self.reviews.lock().unwrap().clone()
  }

  async fn round_trip(&self) -> Result<(), RemoteError> {
    let latency = self.latency_ms.load(Ordering::SeqCst);
    if latency > 0 {
      tokio::time::sleep(Duration::from_millis(latency)).await;
    }
    if self.offline.load(Ordering::SeqCst) {
      return Err(RemoteError::Status(StatusCode::SERVICE_UNAVAILABLE));
    }
    Ok(())
  }
}

#[async_trait]
impl DirectoryApi for FakeApi {
  async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>, RemoteError> {
    self.restaurant_calls.fetch_add(1, Ordering::SeqCst);
    self.round_trip().await?;
    Ok(self.restaurants.lock().unwrap().clone())
  }

  async fn fetch_reviews(&self, restaurant_id: u64) -> Result<Vec<Review>, RemoteError> {
    self.review_calls.fetch_add(1, Ordering::SeqCst);
    self.round_trip().await?;
    Ok(
      self
        .reviews
        .lock()
        .unwrap()
        .iter()
        .filter(|review| review.restaurant_id == restaurant_id)
        .cloned()
        .collect(),
    )
  }

  async fn post_review(&self, review: &Review) -> Result<Option<Review>, RemoteError> {
    self.post_calls.fetch_add(1, Ordering::SeqCst);
    self.round_trip().await?;

    {
      let mut budget = self.post_budget.lock().unwrap();
      match budget.as_mut() {
        Some(0) => return Err(RemoteError::Status(StatusCode::BAD_GATEWAY)),
        Some(left) => *left -= 1,
        None => {}
      }
    }

    let mut reviews = self.reviews.lock().unwrap();
    let mut created = review.clone();
    created.id = Some(reviews.len() as u64 + 1);
    reviews.push(created.clone());
    Ok(Some(created))
  }

  async fn set_favorite(
    &self,
    restaurant_id: u64,
    favorite: bool,
  ) -> Result<Restaurant, RemoteError> {
    self.favorite_calls.fetch_add(1, Ordering::SeqCst);
    self.round_trip().await?;

    let mut restaurants = self.restaurants.lock().unwrap();
    let restaurant = restaurants
      .iter_mut()
      .find(|r| r.id == restaurant_id)
      .ok_or(RemoteError::Status(StatusCode::NOT_FOUND))?;

    restaurant.is_favorite = favorite.into();
    restaurant
      .extra
      .insert("updatedAt".to_string(), json!("2018-07-02T00:00:00.000Z"));
    Ok(restaurant.clone())
  }
}

/// Build a restaurant the way the backend's JSON would.
pub fn restaurant(id: u64, name: &str, cuisine: &str, neighborhood: &str) -> Restaurant {
  serde_json::from_value(json!({
    "id": id,
    "name": name,
    "cuisine_type": cuisine,
    "neighborhood": neighborhood,
    "address": format!("{} Main St", id),
    "latlng": {"lat": 40.7, "lng": -73.9},
    "operating_hours": {"Monday": "5:30 pm - 11:00 pm"},
    "photograph": id.to_string(),
    "createdAt": 1504095563444u64
  }))
  .unwrap()
}

/// Build a review the way the backend's JSON would.
pub fn review(id: u64, restaurant_id: u64, name: &str) -> Review {
  serde_json::from_value(json!({
    "id": id,
    "restaurant_id": restaurant_id,
    "name": name,
    "rating": 4,
    "comments": "Solid",
    "createdAt": 1504095567183u64
  }))
  .unwrap()
}
