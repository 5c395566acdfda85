//! # Item Registry
//!
//! Upsert and lookup of rateable items keyed by their external (Wikipedia)
//! page id.

use std::sync::Arc;

use chrono::Utc;
use re_core::collections::ITEMS;
use re_core::{decode_all, from_document, to_document, DocumentStore, Equality, Item, ItemDraft, Result};
use tracing::{debug, info};

#[derive(Clone)]
pub struct ItemRegistry {
    store: Arc<dyn DocumentStore>,
}

impl ItemRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Creates the item on first sight of `draft.external_id`; otherwise
    /// refreshes its title, description, extract and thumbnail. Returns the
    /// registry id either way.
    pub async fn upsert_item(&self, draft: &ItemDraft) -> Result<String> {
        let now = Utc::now();

        if let Some(existing) = self.get_item_by_external_id(draft.external_id).await? {
            let updated = Item {
                title: draft.title.clone(),
                description: draft.description.clone(),
                extract: draft.extract.clone(),
                thumbnail: draft.thumbnail.clone(),
                updated_at: now,
                ..existing
            };
            self.store
                .set(ITEMS, &updated.id, to_document(&updated)?)
                .await?;
            info!(item_id = %updated.id, external_id = draft.external_id, "item refreshed");
            return Ok(updated.id);
        }

        let id = self.store.push_key(ITEMS);
        let item = Item {
            id: id.clone(),
            external_id: draft.external_id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            extract: draft.extract.clone(),
            thumbnail: draft.thumbnail.clone(),
            created_at: now,
            updated_at: now,
        };
        self.store.set(ITEMS, &id, to_document(&item)?).await?;
        info!(item_id = %id, external_id = draft.external_id, "item created");
        Ok(id)
    }

    pub async fn get_item_by_external_id(&self, external_id: i64) -> Result<Option<Item>> {
        debug!(external_id, "looking up item");
        let found = self
            .store
            .query(ITEMS, Some(Equality::new("externalId", external_id)))
            .await?;

        found
            .into_iter()
            .next()
            .map(|(key, doc)| from_document(&key, doc))
            .transpose()
    }

    /// Every registered item, in key order.
    pub async fn list_items(&self) -> Result<Vec<Item>> {
        let entries = self.store.query(ITEMS, None).await?;
        Ok(decode_all(entries))
    }

    pub async fn item_count(&self) -> Result<usize> {
        Ok(self.store.query(ITEMS, None).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use re_store_memory::MemoryDocumentStore;

    fn draft(external_id: i64, title: &str) -> ItemDraft {
        ItemDraft {
            external_id,
            title: title.to_string(),
            description: format!("{title} description"),
            extract: format!("{title} extract"),
            thumbnail: Some(format!("https://img.example/{external_id}.png")),
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_refreshes() {
        let registry = ItemRegistry::new(Arc::new(MemoryDocumentStore::new()));

        let id = registry.upsert_item(&draft(100, "Foo")).await.unwrap();
        let created = registry.get_item_by_external_id(100).await.unwrap().unwrap();
        assert_eq!(created.id, id);
        assert_eq!(created.created_at, created.updated_at);

        let mut renamed = draft(100, "Foo (band)");
        renamed.thumbnail = None;
        let again = registry.upsert_item(&renamed).await.unwrap();
        assert_eq!(again, id);

        let refreshed = registry.get_item_by_external_id(100).await.unwrap().unwrap();
        assert_eq!(refreshed.title, "Foo (band)");
        assert_eq!(refreshed.thumbnail, None);
        assert_eq!(refreshed.created_at, created.created_at);
        assert!(refreshed.updated_at >= created.updated_at);
        assert_eq!(registry.item_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_external_id_is_none() {
        let registry = ItemRegistry::new(Arc::new(MemoryDocumentStore::new()));
        registry.upsert_item(&draft(1, "One")).await.unwrap();
        registry.upsert_item(&draft(2, "Two")).await.unwrap();

        assert!(registry.get_item_by_external_id(3).await.unwrap().is_none());
        let titles: Vec<_> = registry
            .list_items()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles.len(), 2);
        assert!(titles.contains(&"One".to_string()));
    }
}
