//! # Statistics Aggregator
//!
//! Averages and counts are recomputed from the full rating set on every
//! call. The leaderboards load every item and then every item's ratings, so
//! their cost grows with the whole catalog.

use std::sync::Arc;

use re_core::collections::RATINGS;
use re_core::{decode_all, DocumentStore, Equality, ItemStats, RankedItem, Result};
use tracing::debug;

use crate::items::ItemRegistry;

#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<dyn DocumentStore>,
    items: ItemRegistry,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn DocumentStore>, items: ItemRegistry) -> Self {
        Self { store, items }
    }

    /// Average and count over every rating whose `itemId` is `item_id`.
    pub async fn get_item_stats(&self, item_id: &str) -> Result<ItemStats> {
        let entries = self
            .store
            .query(RATINGS, Some(Equality::new("itemId", item_id)))
            .await?;
        let stats = ItemStats::from_ratings(decode_all(entries));
        debug!(item_id, total = stats.total_ratings, average = stats.average_rating, "item stats");
        Ok(stats)
    }

    /// Every registered item with its statistics.
    pub async fn items_with_stats(&self) -> Result<Vec<RankedItem>> {
        let items = self.items.list_items().await?;
        let mut ranked = Vec::with_capacity(items.len());
        for item in items {
            let stats = self.get_item_stats(&item.rating_key()).await?;
            ranked.push(RankedItem { item, stats });
        }
        Ok(ranked)
    }

    /// Rated items by descending average, at most `limit` of them.
    pub async fn get_top_rated(&self, limit: usize) -> Result<Vec<RankedItem>> {
        let mut ranked = self.rated_items().await?;
        ranked.sort_by(|a, b| b.stats.average_rating.total_cmp(&a.stats.average_rating));
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Rated items by descending rating count, at most `limit` of them.
    pub async fn get_most_reviewed(&self, limit: usize) -> Result<Vec<RankedItem>> {
        let mut ranked = self.rated_items().await?;
        ranked.sort_by(|a, b| b.stats.total_ratings.cmp(&a.stats.total_ratings));
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn rated_items(&self) -> Result<Vec<RankedItem>> {
        let mut ranked = self.items_with_stats().await?;
        ranked.retain(|r| r.stats.total_ratings > 0);
        Ok(ranked)
    }
}
