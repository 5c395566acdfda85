//! # User Profile Store

use std::sync::Arc;

use chrono::Utc;
use re_core::collections::USERS;
use re_core::{from_document, to_document, DocumentStore, Result, UserProfile};
use tracing::info;

use crate::validation;

/// Profile fields supplied by the caller. Optional fields left `None` keep
/// whatever the stored profile already has.
#[derive(Debug, Clone, Default)]
pub struct ProfileInput {
    pub email: String,
    pub name: String,
    pub photo_url: Option<String>,
    pub profile_description: Option<String>,
}

#[derive(Clone)]
pub struct ProfileStore {
    store: Arc<dyn DocumentStore>,
}

impl ProfileStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Creates the profile or merges `input` into it. `createdAt` is fixed
    /// by the first write; `updatedAt` moves on every write.
    pub async fn upsert_profile(&self, user_id: &str, input: &ProfileInput) -> Result<()> {
        validation::require_id("userId", user_id)?;
        let now = Utc::now();

        let profile = match self.get_profile(user_id).await? {
            Some(existing) => UserProfile {
                email: input.email.clone(),
                name: input.name.clone(),
                photo_url: input.photo_url.clone().or(existing.photo_url),
                profile_description: input
                    .profile_description
                    .clone()
                    .or(existing.profile_description),
                updated_at: now,
                ..existing
            },
            None => UserProfile {
                id: user_id.to_string(),
                email: input.email.clone(),
                name: input.name.clone(),
                photo_url: input.photo_url.clone(),
                profile_description: input.profile_description.clone(),
                created_at: now,
                updated_at: now,
            },
        };

        self.store
            .set(USERS, user_id, to_document(&profile)?)
            .await?;
        info!(user_id, "profile saved");
        Ok(())
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        validation::require_id("userId", user_id)?;
        self.store
            .get(USERS, user_id)
            .await?
            .map(|doc| from_document(user_id, doc))
            .transpose()
    }
}
