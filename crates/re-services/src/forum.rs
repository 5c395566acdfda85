//! # Forum Store
//!
//! Posts and their comments, with per-user like toggling and a reply
//! counter on each post.
//!
//! Like toggles and the reply counter are read-then-write sequences without
//! a transaction: concurrent togglers can lose a like, and concurrent
//! commenters can leave `replyCount` short.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use re_core::collections::{FORUM_COMMENTS, FORUM_POSTS};
use re_core::{
    decode_all, from_document, to_document, AppError, Document, DocumentStore, Equality,
    ForumComment, ForumPost, Result,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::live::LiveQuery;
use crate::validation;

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub category: String,
    pub author_id: String,
    pub author_name: String,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: String,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
}

/// The like bookkeeping shared by posts and comments.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikeState {
    #[serde(default)]
    likes: u64,
    #[serde(default)]
    liked_by: BTreeSet<String>,
}

impl LikeState {
    /// Flips `user_id`'s like and returns whether it is now liked.
    fn toggle(&mut self, user_id: &str) -> bool {
        if self.liked_by.remove(user_id) {
            self.likes = self.likes.saturating_sub(1);
            false
        } else {
            self.liked_by.insert(user_id.to_string());
            self.likes += 1;
            true
        }
    }

    fn into_patch(self) -> Document {
        let mut patch = Document::new();
        patch.insert("likes".into(), json!(self.likes));
        patch.insert("likedBy".into(), json!(self.liked_by));
        patch
    }
}

#[derive(Clone)]
pub struct ForumStore {
    store: Arc<dyn DocumentStore>,
}

impl ForumStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Title, content and category are stored trimmed and must not be blank.
    pub async fn create_post(&self, post: &NewPost) -> Result<String> {
        let title = validation::non_blank("title", &post.title)?;
        let content = validation::non_blank("content", &post.content)?;
        let category = validation::non_blank("category", &post.category)?;

        let id = self.store.push_key(FORUM_POSTS);
        let record = ForumPost {
            id: id.clone(),
            title: title.to_string(),
            content: content.to_string(),
            category: category.to_string(),
            author_id: post.author_id.clone(),
            author_name: post.author_name.clone(),
            timestamp: Utc::now(),
            likes: 0,
            liked_by: BTreeSet::new(),
            reply_count: 0,
        };
        self.store.set(FORUM_POSTS, &id, to_document(&record)?).await?;

        info!(post_id = %id, category, "post created");
        Ok(id)
    }

    /// Live list of all posts, newest first.
    pub async fn subscribe_to_posts(&self) -> Result<LiveQuery<ForumPost>> {
        let subscription = self.store.subscribe(FORUM_POSTS, None).await?;
        Ok(LiveQuery::new(subscription, |posts: &mut Vec<ForumPost>| {
            posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        }))
    }

    pub async fn get_post_by_id(&self, post_id: &str) -> Result<Option<ForumPost>> {
        validation::require_id("postId", post_id)?;
        self.store
            .get(FORUM_POSTS, post_id)
            .await?
            .map(|doc| from_document(post_id, doc))
            .transpose()
    }

    /// Owner-only edit of a post's title and content.
    pub async fn edit_post(
        &self,
        post_id: &str,
        title: &str,
        content: &str,
        requesting_user_id: &str,
    ) -> Result<()> {
        let title = validation::non_blank("title", title)?;
        let content = validation::non_blank("content", content)?;
        self.owned_post(post_id, requesting_user_id, "edit").await?;

        let mut patch = Document::new();
        patch.insert("title".into(), json!(title));
        patch.insert("content".into(), json!(content));
        self.store.update(FORUM_POSTS, post_id, patch).await?;
        info!(post_id, "post edited");
        Ok(())
    }

    /// Owner-only delete. The post's comments stay in place.
    pub async fn delete_post(&self, post_id: &str, requesting_user_id: &str) -> Result<()> {
        self.owned_post(post_id, requesting_user_id, "delete")
            .await?;
        self.store.remove(FORUM_POSTS, post_id).await?;
        info!(post_id, "post deleted");
        Ok(())
    }

    pub async fn toggle_post_like(&self, post_id: &str, user_id: &str) -> Result<bool> {
        self.toggle_like(FORUM_POSTS, "post", post_id, user_id).await
    }

    /// Adds a comment to an existing post and bumps the post's `replyCount`.
    /// The bump is a second write; if it fails the comment still exists.
    pub async fn create_comment(&self, comment: &NewComment) -> Result<String> {
        let content = validation::non_blank("content", &comment.content)?;
        let post = self
            .get_post_by_id(&comment.post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post", &comment.post_id))?;

        let id = self.store.push_key(FORUM_COMMENTS);
        let record = ForumComment {
            id: id.clone(),
            post_id: post.id.clone(),
            content: content.to_string(),
            author_id: comment.author_id.clone(),
            author_name: comment.author_name.clone(),
            timestamp: Utc::now(),
            likes: 0,
            liked_by: BTreeSet::new(),
        };
        self.store
            .set(FORUM_COMMENTS, &id, to_document(&record)?)
            .await?;

        let mut patch = Document::new();
        patch.insert("replyCount".into(), json!(post.reply_count + 1));
        self.store.update(FORUM_POSTS, &post.id, patch).await?;

        info!(comment_id = %id, post_id = %post.id, "comment created");
        Ok(id)
    }

    /// Live list of a post's comments, oldest first.
    pub async fn subscribe_to_comments_for_post(&self, post_id: &str) -> Result<LiveQuery<ForumComment>> {
        let subscription = self
            .store
            .subscribe(FORUM_COMMENTS, Some(Equality::new("postId", post_id)))
            .await?;
        Ok(LiveQuery::new(subscription, |comments: &mut Vec<ForumComment>| {
            comments.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        }))
    }

    pub async fn toggle_comment_like(&self, comment_id: &str, user_id: &str) -> Result<bool> {
        self.toggle_like(FORUM_COMMENTS, "comment", comment_id, user_id)
            .await
    }

    /// Posts written by `user_id`, newest first.
    pub async fn get_posts_by_author(&self, user_id: &str) -> Result<Vec<ForumPost>> {
        let entries = self
            .store
            .query(FORUM_POSTS, Some(Equality::new("authorId", user_id)))
            .await?;
        let mut posts: Vec<ForumPost> = decode_all(entries);
        posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(posts)
    }

    /// Comments written by `user_id`, newest first.
    pub async fn get_comments_by_author(&self, user_id: &str) -> Result<Vec<ForumComment>> {
        let entries = self
            .store
            .query(FORUM_COMMENTS, Some(Equality::new("authorId", user_id)))
            .await?;
        let mut comments: Vec<ForumComment> = decode_all(entries);
        comments.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(comments)
    }

    async fn toggle_like(&self, collection: &str, kind: &str, id: &str, user_id: &str) -> Result<bool> {
        validation::require_id("userId", user_id)?;
        validation::require_id(&format!("{kind}Id"), id)?;
        let doc = self
            .store
            .get(collection, id)
            .await?
            .ok_or_else(|| AppError::not_found(kind, id))?;

        let mut state: LikeState = from_document(id, doc)?;
        let liked = state.toggle(user_id);
        debug!(kind, id, user_id, liked, likes = state.likes, "like toggled");

        self.store.update(collection, id, state.into_patch()).await?;
        Ok(liked)
    }

    async fn owned_post(&self, post_id: &str, user_id: &str, action: &str) -> Result<ForumPost> {
        let post = self
            .get_post_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post", post_id))?;
        if post.author_id != user_id {
            warn!(post_id, user_id, action, "post owned by another user");
            return Err(AppError::Authorization(format!(
                "you can only {action} your own posts"
            )));
        }
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_round_trips() {
        let mut state = LikeState::default();
        assert!(state.toggle("u1"));
        assert!(state.toggle("u2"));
        assert_eq!(state.likes, 2);
        assert!(!state.toggle("u1"));
        assert_eq!(state.likes, 1);
        assert!(!state.liked_by.contains("u1"));
    }

    #[test]
    fn unlike_never_goes_below_zero() {
        // A stored count that drifted below the liker set.
        let mut state = LikeState {
            likes: 0,
            liked_by: BTreeSet::from(["u1".to_string()]),
        };
        assert!(!state.toggle("u1"));
        assert_eq!(state.likes, 0);
        assert!(state.liked_by.is_empty());
    }
}
