//! # Rating Store
//!
//! Create, read, update and delete of user ratings, with at most one rating
//! per `(itemId, userId)` pair.
//!
//! # Concurrency
//! The store has no multi-document transactions, so the pair uniqueness is
//! enforced by a lookup before every insert. Two concurrent submissions by
//! the same user for the same item can both pass the lookup and leave two
//! ratings behind. Callers that need a hard guarantee must serialize
//! submissions per user.

use std::sync::Arc;

use chrono::Utc;
use re_core::collections::RATINGS;
use re_core::{
    decode_all, from_document, to_document, AppError, Document, DocumentStore, Equality, ItemDraft,
    RaterInfo, Rating, Result,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::items::ItemRegistry;
use crate::live::LiveQuery;
use crate::validation;

/// A user's rating as submitted, together with the item it is about.
#[derive(Debug, Clone)]
pub struct RatingSubmission {
    /// Ratings reference items by the external id rendered as a string;
    /// must equal `item.external_id`.
    pub item_id: String,
    pub user_id: String,
    /// Raw score as entered; must be a whole number from 1 to 5.
    pub rating: f64,
    pub review: Option<String>,
    pub item: ItemDraft,
    pub rater: Option<RaterInfo>,
}

/// Fields a rating's owner may change. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct RatingUpdate {
    pub rating: Option<f64>,
    pub review: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub rating_id: String,
    pub was_update: bool,
}

#[derive(Clone)]
pub struct RatingStore {
    store: Arc<dyn DocumentStore>,
    items: ItemRegistry,
}

impl RatingStore {
    pub fn new(store: Arc<dyn DocumentStore>, items: ItemRegistry) -> Self {
        Self { store, items }
    }

    /// Inserts a first rating for the pair. Fails with `Conflict` when the
    /// user already rated this item; use [`RatingStore::upsert_rating`] or
    /// [`RatingStore::update_rating`] for that case.
    pub async fn submit_rating(&self, submission: &RatingSubmission) -> Result<String> {
        let score = validate_submission(submission)?;

        if let Some(existing) = self
            .find_existing_rating(&submission.item_id, &submission.user_id)
            .await?
        {
            warn!(rating_id = %existing.id, item_id = %submission.item_id, "duplicate rating rejected");
            return Err(AppError::Conflict(format!(
                "user {} has already rated item {}; update rating {} instead",
                submission.user_id, submission.item_id, existing.id
            )));
        }

        self.items.upsert_item(&submission.item).await?;

        let id = self.store.push_key(RATINGS);
        let rater = submission.rater.clone().unwrap_or_default();
        let rating = Rating {
            id: id.clone(),
            item_id: submission.item_id.clone(),
            rating: score,
            review: submission.review.clone(),
            user_id: submission.user_id.clone(),
            timestamp: Utc::now(),
            user_name: rater.name,
            user_email: rater.email,
        };
        self.store.set(RATINGS, &id, to_document(&rating)?).await?;

        info!(rating_id = %id, item_id = %rating.item_id, score, "rating submitted");
        Ok(id)
    }

    /// The user's rating of the item, if any.
    pub async fn find_existing_rating(&self, item_id: &str, user_id: &str) -> Result<Option<Rating>> {
        // Only one field can be queried at a time; the user predicate is
        // applied to the item's result set here.
        let entries = self
            .store
            .query(RATINGS, Some(Equality::new("itemId", item_id)))
            .await?;

        for (key, doc) in entries {
            if doc.get("userId").and_then(Value::as_str) == Some(user_id) {
                return from_document(&key, doc).map(Some);
            }
        }
        Ok(None)
    }

    /// Applies `updates` to a rating owned by `requesting_user_id` and
    /// refreshes its timestamp.
    pub async fn update_rating(
        &self,
        rating_id: &str,
        updates: &RatingUpdate,
        requesting_user_id: &str,
    ) -> Result<()> {
        self.owned_rating(rating_id, requesting_user_id, "update")
            .await?;

        let mut patch = Document::new();
        if let Some(value) = updates.rating {
            patch.insert("rating".into(), json!(validation::score(value)?));
        }
        if let Some(review) = &updates.review {
            validation::review(Some(review))?;
            patch.insert("review".into(), json!(review));
        }
        if let Some(name) = &updates.user_name {
            patch.insert("userName".into(), json!(name));
        }
        if let Some(email) = &updates.user_email {
            patch.insert("userEmail".into(), json!(email));
        }
        patch.insert("timestamp".into(), json!(Utc::now().timestamp_millis()));

        self.store.update(RATINGS, rating_id, patch).await?;
        info!(rating_id, "rating updated");
        Ok(())
    }

    /// Hard-deletes a rating owned by `requesting_user_id`.
    pub async fn delete_rating(&self, rating_id: &str, requesting_user_id: &str) -> Result<()> {
        self.owned_rating(rating_id, requesting_user_id, "delete")
            .await?;
        self.store.remove(RATINGS, rating_id).await?;
        info!(rating_id, "rating deleted");
        Ok(())
    }

    /// Primary entry point: updates the user's existing rating of the item,
    /// or submits a new one. Not safe against concurrent calls for the same
    /// pair (see the module docs).
    pub async fn upsert_rating(&self, submission: &RatingSubmission) -> Result<UpsertOutcome> {
        validate_submission(submission)?;

        let Some(existing) = self
            .find_existing_rating(&submission.item_id, &submission.user_id)
            .await?
        else {
            let rating_id = self.submit_rating(submission).await?;
            return Ok(UpsertOutcome {
                rating_id,
                was_update: false,
            });
        };

        let rater = submission.rater.clone().unwrap_or_default();
        let updates = RatingUpdate {
            rating: Some(submission.rating),
            review: submission.review.clone(),
            user_name: rater.name,
            user_email: rater.email,
        };
        self.update_rating(&existing.id, &updates, &submission.user_id)
            .await?;

        Ok(UpsertOutcome {
            rating_id: existing.id,
            was_update: true,
        })
    }

    /// Every rating by `user_id`, newest first.
    pub async fn get_ratings_for_user(&self, user_id: &str) -> Result<Vec<Rating>> {
        debug!(user_id, "loading ratings for user");
        let entries = self
            .store
            .query(RATINGS, Some(Equality::new("userId", user_id)))
            .await?;
        let mut ratings: Vec<Rating> = decode_all(entries);
        newest_first(&mut ratings);
        Ok(ratings)
    }

    /// Live result set of every rating of `item_id`.
    pub async fn subscribe_to_ratings_for_item(&self, item_id: &str) -> Result<LiveQuery<Rating>> {
        let subscription = self
            .store
            .subscribe(RATINGS, Some(Equality::new("itemId", item_id)))
            .await?;
        Ok(LiveQuery::new(subscription, |_: &mut Vec<Rating>| {}))
    }

    /// Live feed of the `limit` most recent ratings across all items.
    pub async fn subscribe_recent_ratings(&self, limit: usize) -> Result<LiveQuery<Rating>> {
        let subscription = self.store.subscribe(RATINGS, None).await?;
        Ok(LiveQuery::new(subscription, move |ratings: &mut Vec<Rating>| {
            newest_first(ratings);
            ratings.truncate(limit);
        }))
    }

    async fn owned_rating(&self, rating_id: &str, user_id: &str, action: &str) -> Result<Rating> {
        validation::require_id("ratingId", rating_id)?;
        let doc = self
            .store
            .get(RATINGS, rating_id)
            .await?
            .ok_or_else(|| AppError::not_found("rating", rating_id))?;
        let rating: Rating = from_document(rating_id, doc)?;

        if rating.user_id != user_id {
            warn!(rating_id, user_id, action, "rating owned by another user");
            return Err(AppError::Authorization(format!(
                "you can only {action} your own ratings"
            )));
        }
        Ok(rating)
    }
}

fn validate_submission(submission: &RatingSubmission) -> Result<u8> {
    validation::require_id("itemId", &submission.item_id)?;
    validation::require_id("userId", &submission.user_id)?;
    if submission.item_id != submission.item.external_id.to_string() {
        return Err(AppError::Validation(format!(
            "itemId {} does not match item externalId {}",
            submission.item_id, submission.item.external_id
        )));
    }
    let score = validation::score(submission.rating)?;
    validation::review(submission.review.as_deref())?;
    Ok(score)
}

fn newest_first(ratings: &mut [Rating]) {
    ratings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
