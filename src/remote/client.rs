use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::ServerConfig;
use crate::error::RemoteError;
use crate::types::{Restaurant, Review};

/// The backend operations the data layer depends on.
#[async_trait]
pub trait DirectoryApi: Send + Sync + 'static {
  /// `GET /restaurants`
  async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>, RemoteError>;

  /// `GET /reviews/?restaurant_id={id}`
  async fn fetch_reviews(&self, restaurant_id: u64) -> Result<Vec<Review>, RemoteError>;

  /// `POST /reviews/`. Returns the created review when the backend echoes one.
  async fn post_review(&self, review: &Review) -> Result<Option<Review>, RemoteError>;

  /// `PUT /restaurants/{id}/?is_favorite={status}`
  async fn set_favorite(&self, restaurant_id: u64, favorite: bool)
    -> Result<Restaurant, RemoteError>;
}

/// Status and raw body of a successful response.
struct ResponseBody {
  status: StatusCode,
  bytes: Vec<u8>,
}

/// HTTP client for the restaurant backend.
#[derive(Clone)]
pub struct HttpClient {
  http: reqwest::Client,
  base: Url,
}

impl HttpClient {
  pub fn new(config: &ServerConfig) -> Result<Self, RemoteError> {
    let mut base = Url::parse(&config.url)?;
    // Url::join drops the last segment unless the path ends with a slash
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.request_timeout_secs))
      .build()?;

    Ok(Self { http, base })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
    Ok(self.base.join(path)?)
  }

  fn restaurants_url(&self) -> Result<Url, RemoteError> {
    self.endpoint("restaurants")
  }

  fn reviews_url(&self, restaurant_id: Option<u64>) -> Result<Url, RemoteError> {
    let mut url = self.endpoint("reviews/")?;
    if let Some(id) = restaurant_id {
      url
        .query_pairs_mut()
        .append_pair("restaurant_id", &id.to_string());
    }
    Ok(url)
  }

  fn favorite_url(&self, restaurant_id: u64, favorite: bool) -> Result<Url, RemoteError> {
    let mut url = self.endpoint(&format!("restaurants/{}/", restaurant_id))?;
    url
      .query_pairs_mut()
      .append_pair("is_favorite", if favorite { "true" } else { "false" });
    Ok(url)
  }

  /// Send a request and return the body of a successful response.
  async fn send(
    &self,
    method: Method,
    url: Url,
    body: Option<&Review>,
  ) -> Result<ResponseBody, RemoteError> {
    debug!(%method, %url, "backend request");

    let mut request = self.http.request(method, url);
    if let Some(body) = body {
      request = request.json(body);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(RemoteError::Status(status));
    }

    Ok(ResponseBody {
      status,
      bytes: response.bytes().await?.to_vec(),
    })
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
    let body = self.send(Method::GET, url, None).await?;
    Ok(serde_json::from_slice(&body.bytes)?)
  }
}

#[async_trait]
impl DirectoryApi for HttpClient {
  async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>, RemoteError> {
    let restaurants: Vec<Restaurant> = self.get_json(self.restaurants_url()?).await?;
    info!(count = restaurants.len(), "fetched restaurants from backend");
    Ok(restaurants)
  }

  async fn fetch_reviews(&self, restaurant_id: u64) -> Result<Vec<Review>, RemoteError> {
    let reviews: Vec<Review> = self.get_json(self.reviews_url(Some(restaurant_id))?).await?;
    info!(restaurant_id, count = reviews.len(), "fetched reviews from backend");
    Ok(reviews)
  }

  async fn post_review(&self, review: &Review) -> Result<Option<Review>, RemoteError> {
    let body = self
      .send(Method::POST, self.reviews_url(None)?, Some(review))
      .await?;

    // Some backends answer with an empty body or a bare acknowledgement.
    let created = serde_json::from_slice::<Review>(&body.bytes).ok();
    info!(
      restaurant_id = review.restaurant_id,
      status = %body.status,
      created_id = created.as_ref().and_then(|r| r.id),
      "delivered review"
    );
    Ok(created)
  }

  async fn set_favorite(
    &self,
    restaurant_id: u64,
    favorite: bool,
  ) -> Result<Restaurant, RemoteError> {
    let body = self
      .send(
        Method::PUT,
        self.favorite_url(restaurant_id, favorite)?,
        None,
      )
      .await?;

    let restaurant: Restaurant = serde_json::from_slice(&body.bytes)?;
    info!(restaurant_id, favorite, "updated favorite on backend");
    Ok(restaurant)
  }
}
