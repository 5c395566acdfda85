//! # re-services
//!
//! The RateEverything data-access layer: item registry, ratings,
//! statistics, forum and user profiles, all over one [`DocumentStore`].

pub mod forum;
pub mod items;
pub mod live;
pub mod profiles;
pub mod ratings;
pub mod stats;
pub mod validation;

use std::sync::Arc;

use re_core::DocumentStore;

pub use forum::{ForumStore, NewComment, NewPost};
pub use items::ItemRegistry;
pub use live::LiveQuery;
pub use profiles::{ProfileInput, ProfileStore};
pub use ratings::{RatingStore, RatingSubmission, RatingUpdate, UpsertOutcome};
pub use stats::StatsAggregator;

/// Every service, wired to a shared store.
#[derive(Clone)]
pub struct Services {
    pub items: ItemRegistry,
    pub ratings: RatingStore,
    pub stats: StatsAggregator,
    pub forum: ForumStore,
    pub profiles: ProfileStore,
}

impl Services {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let items = ItemRegistry::new(store.clone());
        Self {
            ratings: RatingStore::new(store.clone(), items.clone()),
            stats: StatsAggregator::new(store.clone(), items.clone()),
            forum: ForumStore::new(store.clone()),
            profiles: ProfileStore::new(store),
            items,
        }
    }
}
