//! Domain records exchanged with the backend and kept in the local store.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Geographic position of a restaurant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
  pub lat: f64,
  pub lng: f64,
}

/// Favorite flag as the backend reports it.
///
/// The backend has historically sent booleans, the strings `"true"` and
/// `"false"`, `null`, or nothing at all for this field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Favorite {
  Yes,
  No,
  #[default]
  Unset,
}

impl Favorite {
  pub fn is_unset(&self) -> bool {
    matches!(self, Favorite::Unset)
  }

  pub fn is_favorite(&self) -> bool {
    matches!(self, Favorite::Yes)
  }

  /// The status a toggle should request: only a favorite becomes a non-favorite.
  pub fn toggled(self) -> bool {
    !self.is_favorite()
  }
}

impl From<bool> for Favorite {
  fn from(value: bool) -> Self {
    if value {
      Favorite::Yes
    } else {
      Favorite::No
    }
  }
}

impl fmt::Display for Favorite {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Favorite::Yes => f.write_str("yes"),
      Favorite::No => f.write_str("no"),
      Favorite::Unset => f.write_str("unset"),
    }
  }
}

impl Serialize for Favorite {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Favorite::Yes => serializer.serialize_bool(true),
      Favorite::No => serializer.serialize_bool(false),
      Favorite::Unset => serializer.serialize_none(),
    }
  }
}

impl<'de> Deserialize<'de> for Favorite {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
      Flag(bool),
      Text(String),
    }

    match Option::<Wire>::deserialize(deserializer)? {
      None => Ok(Favorite::Unset),
      Some(Wire::Flag(flag)) => Ok(flag.into()),
      Some(Wire::Text(text)) => match text.trim() {
        "true" => Ok(Favorite::Yes),
        "false" => Ok(Favorite::No),
        "" | "undefined" | "null" => Ok(Favorite::Unset),
        other => Err(de::Error::custom(format!(
          "invalid favorite value: {other:?}"
        ))),
      },
    }
  }
}

/// A restaurant directory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
  #[serde(deserialize_with = "lenient_u64")]
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub neighborhood: String,
  #[serde(default)]
  pub cuisine_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub address: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub latlng: Option<LatLng>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub operating_hours: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub photograph: Option<String>,
  #[serde(default, skip_serializing_if = "Favorite::is_unset")]
  pub is_favorite: Favorite,
  /// Backend fields this crate doesn't interpret (timestamps and the like).
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

impl Restaurant {
  /// Relative URL of the restaurant's detail page.
  pub fn page_url(&self) -> String {
    format!("./restaurant.html?id={}", self.id)
  }

  /// Path of the restaurant's photo, if it has one.
  pub fn image_url(&self) -> Option<String> {
    self
      .photograph
      .as_ref()
      .map(|photo| format!("/img/{}.jpg", photo))
  }
}

/// A review of a restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
  /// Backend-assigned id; absent on reviews written locally.
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    deserialize_with = "lenient_opt_u64"
  )]
  pub id: Option<u64>,
  #[serde(deserialize_with = "lenient_u64")]
  pub restaurant_id: u64,
  pub name: String,
  #[serde(deserialize_with = "lenient_rating")]
  pub rating: u8,
  #[serde(default)]
  pub comments: String,
  #[serde(
    rename = "createdAt",
    default,
    skip_serializing_if = "Option::is_none",
    with = "chrono::serde::ts_milliseconds_option"
  )]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

/// A review accepted locally whose delivery to the backend is unconfirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingReview(pub Review);

/// User-entered fields of a new review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDraft {
  pub restaurant_id: u64,
  pub name: String,
  pub rating: u8,
  pub comments: String,
}

impl ReviewDraft {
  pub fn validate(&self) -> Result<(), String> {
    if self.name.trim().is_empty() {
      return Err("reviewer name is empty".to_string());
    }
    if !(1..=5).contains(&self.rating) {
      return Err(format!("rating {} is outside 1..=5", self.rating));
    }
    if self.comments.trim().is_empty() {
      return Err("comments are empty".to_string());
    }
    Ok(())
  }

  pub fn into_review(self, created_at: DateTime<Utc>) -> Review {
    Review {
      id: None,
      restaurant_id: self.restaurant_id,
      name: self.name.trim().to_string(),
      rating: self.rating,
      comments: self.comments.trim().to_string(),
      created_at: Some(created_at),
      extra: BTreeMap::new(),
    }
  }
}

// ============================================================================
// Lenient number parsing
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
  Number(u64),
  Text(String),
}

impl NumberOrText {
  fn into_u64<E: de::Error>(self) -> Result<u64, E> {
    match self {
      NumberOrText::Number(n) => Ok(n),
      NumberOrText::Text(text) => text
        .trim()
        .parse()
        .map_err(|_| E::custom(format!("expected a number, got {text:?}"))),
    }
  }
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
  NumberOrText::deserialize(deserializer)?.into_u64()
}

fn lenient_opt_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
  Option::<NumberOrText>::deserialize(deserializer)?
    .map(NumberOrText::into_u64)
    .transpose()
}

fn lenient_rating<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
  let value = lenient_u64(deserializer)?;
  u8::try_from(value).map_err(|_| de::Error::custom(format!("rating {value} out of range")))
}
