//! Favorite updates and review submission with the pending-review queue.

use chrono::{SubsecRound, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::remote::DirectoryApi;
use crate::store::Storage;
use crate::types::{PendingReview, Restaurant, ReviewDraft};

/// How a submitted review was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
  /// The backend accepted the review
  Delivered,
  /// The backend was unreachable; the review waits in the pending queue under `key`
  Queued { key: i64 },
}

/// Result of one pass over the pending queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
  pub delivered: usize,
  pub remaining: usize,
}

/// Write paths: optimistic local writes, remote delivery, and the retry queue.
pub struct WriteBehind<S: Storage, R: DirectoryApi> {
  storage: Arc<S>,
  api: Arc<R>,
  /// Held for the duration of a drain pass
  draining: Mutex<()>,
}

impl<S: Storage, R: DirectoryApi> WriteBehind<S, R> {
  pub fn new(storage: Arc<S>, api: Arc<R>) -> Self {
    Self {
      storage,
      api,
      draining: Mutex::new(()),
    }
  }

  /// Ask the backend to set the favorite flag, then store what it returns.
  ///
  /// Nothing changes locally unless the backend accepts the update, and a
  /// failed update is not queued. The server copy is only stored once the
  /// restaurant list has been backfilled; a lone record would otherwise
  /// pass for the whole list.
  pub async fn set_favorite(
    &self,
    restaurant_id: u64,
    favorite: bool,
  ) -> Result<Restaurant, SyncError> {
    let updated = self
      .api
      .set_favorite(restaurant_id, favorite)
      .await
      .map_err(|e| {
        warn!(restaurant_id, favorite, error = %e, "favorite update failed");
        SyncError::remote(e)
      })?;

    match self.storage.count::<Restaurant>() {
      Ok(0) => debug!(restaurant_id, "restaurant list not stored yet; skipping local update"),
      Ok(_) => {
        if let Err(e) = self.storage.put(&updated) {
          warn!(restaurant_id, error = %e, "failed to store updated restaurant");
        }
      }
      Err(e) => warn!(restaurant_id, error = %e, "failed to check local restaurants"),
    }

    Ok(updated)
  }

  /// Store a new review locally, then try to deliver it.
  ///
  /// The local copy is written before the backend is contacted, so it is
  /// visible to reads as soon as this returns. A failed delivery leaves a
  /// copy in the pending queue for [`Self::drain_pending`]. If a persistent
  /// store rejects the local copy, the backend is not contacted.
  pub async fn submit_review(&self, draft: ReviewDraft) -> Result<SubmitOutcome, SyncError> {
    draft.validate().map_err(SyncError::InvalidReview)?;
    // The wire format keeps milliseconds; match it so local and delivered copies agree.
    let review = draft.into_review(Utc::now().trunc_subsecs(3));
    let restaurant_id = review.restaurant_id;

    match self.storage.put(&review) {
      Ok(key) => debug!(restaurant_id, key, "stored review locally"),
      Err(e) => {
        error!(restaurant_id, error = %e, "failed to store review locally");
        return Err(SyncError::StorageUnavailable);
      }
    }

    let err = match self.api.post_review(&review).await {
      Ok(_) => return Ok(SubmitOutcome::Delivered),
      Err(e) => e,
    };

    warn!(restaurant_id, error = %err, "review delivery failed");
    if !self.storage.is_persistent() {
      return Err(SyncError::remote(err));
    }

    match self.storage.put(&PendingReview(review)) {
      Ok(key) => {
        info!(restaurant_id, key, "queued review for later delivery");
        Ok(SubmitOutcome::Queued { key })
      }
      Err(e) => {
        warn!(restaurant_id, error = %e, "failed to queue review");
        Err(SyncError::remote(err))
      }
    }
  }

  /// Try to deliver every pending review, oldest first.
  ///
  /// Delivered entries are removed from the queue. The pass stops at the
  /// first failed delivery and leaves the rest for the next one. If another
  /// pass is already running this returns an empty report.
  pub async fn drain_pending(&self) -> Result<DrainReport, SyncError> {
    let Ok(_guard) = self.draining.try_lock() else {
      debug!("pending drain already running");
      return Ok(DrainReport::default());
    };

    let pending = self.storage.get_all::<PendingReview>().map_err(|e| {
      warn!(error = %e, "failed to read pending reviews");
      SyncError::StorageUnavailable
    })?;

    if pending.is_empty() {
      return Ok(DrainReport::default());
    }

    let total = pending.len();
    let mut delivered = 0;

    for stored in pending {
      if let Err(e) = self.api.post_review(&stored.record.0).await {
        warn!(key = stored.key, error = %e, "pending review still undeliverable");
        break;
      }

      delivered += 1;
      if let Err(e) = self.storage.delete::<PendingReview>(stored.key) {
        warn!(key = stored.key, error = %e, "failed to remove delivered review from queue");
      }
    }

    let report = DrainReport {
      delivered,
      remaining: total - delivered,
    };
    info!(
      delivered = report.delivered,
      remaining = report.remaining,
      "drained pending reviews"
    );
    Ok(report)
  }

  /// Reviews still waiting for delivery.
  pub fn pending(&self) -> Result<Vec<PendingReview>, SyncError> {
    Ok(
      self
        .storage
        .get_all::<PendingReview>()?
        .into_iter()
        .map(|stored| stored.record)
        .collect(),
    )
  }
}
