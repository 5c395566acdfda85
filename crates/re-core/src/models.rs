//! # Domain Models
//!
//! These structs represent the entities RateEverything persists. Field names
//! follow the camelCase layout of the stored documents, optional fields are
//! omitted rather than written as null, and timestamps are stored as epoch
//! milliseconds.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level collections of the document store.
pub mod collections {
    pub const ITEMS: &str = "items";
    pub const RATINGS: &str = "ratings";
    pub const FORUM_POSTS: &str = "forumPosts";
    pub const FORUM_COMMENTS: &str = "forumComments";
    pub const USERS: &str = "users";
}

/// A rateable subject, keyed by the identifier the search collaborator assigned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub id: String,
    /// Wikipedia page id. Unique across the registry.
    pub external_id: i64,
    pub title: String,
    pub description: String,
    pub extract: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// The `itemId` that ratings of this item carry.
    pub fn rating_key(&self) -> String {
        self.external_id.to_string()
    }
}

/// Search-result fields used to create or refresh an [`Item`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    pub external_id: i64,
    pub title: String,
    pub description: String,
    pub extract: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// One user's 1-5 score and optional review for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    #[serde(default)]
    pub id: String,
    pub item_id: String,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    pub user_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

/// Display details copied onto a rating at submission time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaterInfo {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Aggregate over every rating of one item, recomputed on each request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStats {
    pub average_rating: f64,
    pub total_ratings: usize,
    /// Ratings keyed by rating id.
    pub ratings: BTreeMap<String, Rating>,
}

impl ItemStats {
    pub fn from_ratings(ratings: Vec<Rating>) -> Self {
        let total_ratings = ratings.len();
        let average_rating = if total_ratings == 0 {
            0.0
        } else {
            let sum: u64 = ratings.iter().map(|r| u64::from(r.rating)).sum();
            sum as f64 / total_ratings as f64
        };

        Self {
            average_rating,
            total_ratings,
            ratings: ratings.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }
}

/// An item paired with its statistics, as listed on the leaderboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedItem {
    pub item: Item,
    pub stats: ItemStats,
}

/// A discussion thread opener. Independent of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumPost {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub author_id: String,
    pub author_name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub liked_by: BTreeSet<String>,
    /// Bumped on every comment; never decremented.
    #[serde(default)]
    pub reply_count: u64,
}

/// A reply to a [`ForumPost`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumComment {
    #[serde(default)]
    pub id: String,
    pub post_id: String,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub liked_by: BTreeSet<String>,
}

/// Profile record stored under `users/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_description: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}
