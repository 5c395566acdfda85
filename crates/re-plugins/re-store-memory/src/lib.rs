//! # re-store-memory
//!
//! In-process implementation of `DocumentStore`. Collections are sharded
//! maps; every write to a collection and the notification of its
//! subscribers happen under that collection's entry lock.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use re_core::document::{merge, Document, Entry};
use re_core::live::{LiveRegistry, Subscription};
use re_core::traits::{check_segment, generate_key, DocumentStore, Equality};

type Collection = BTreeMap<String, Document>;

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: DashMap<String, Collection>,
    live: LiveRegistry,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `mutate` on the collection and notifies its subscribers while
    /// the collection is still locked.
    fn write<R>(&self, collection: &str, mutate: impl FnOnce(&mut Collection) -> R) -> R {
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        let result = mutate(&mut *docs);
        if self.live.is_watched(collection) {
            self.live.notify(collection, &entries(&*docs, None));
        }
        result
    }
}

fn entries(docs: &Collection, filter: Option<&Equality>) -> Vec<Entry> {
    docs.iter()
        .filter(|(_, doc)| filter.map_or(true, |f| f.matches(doc)))
        .map(|(key, doc)| (key.clone(), doc.clone()))
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> anyhow::Result<Option<Document>> {
        check_segment(key)?;
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(key).cloned()))
    }

    async fn set(&self, collection: &str, key: &str, doc: Document) -> anyhow::Result<()> {
        check_segment(collection)?;
        check_segment(key)?;
        self.write(collection, |docs| {
            docs.insert(key.to_string(), doc);
        });
        tracing::debug!(collection, key, "document set");
        Ok(())
    }

    async fn update(&self, collection: &str, key: &str, patch: Document) -> anyhow::Result<()> {
        check_segment(collection)?;
        check_segment(key)?;
        self.write(collection, |docs| {
            merge(docs.entry(key.to_string()).or_default(), patch);
        });
        tracing::debug!(collection, key, "document updated");
        Ok(())
    }

    async fn remove(&self, collection: &str, key: &str) -> anyhow::Result<()> {
        check_segment(key)?;
        let removed = self.write(collection, |docs| docs.remove(key).is_some());
        tracing::debug!(collection, key, removed, "document removed");
        Ok(())
    }

    fn push_key(&self, _collection: &str) -> String {
        generate_key()
    }

    async fn query(&self, collection: &str, filter: Option<Equality>) -> anyhow::Result<Vec<Entry>> {
        Ok(self
            .collections
            .get(collection)
            .map(|docs| entries(&*docs, filter.as_ref()))
            .unwrap_or_default())
    }

    async fn subscribe(
        &self,
        collection: &str,
        filter: Option<Equality>,
    ) -> anyhow::Result<Subscription> {
        check_segment(collection)?;
        // Hold the entry lock so no write slips between the initial snapshot
        // and registration.
        let docs = self.collections.entry(collection.to_string()).or_default();
        let current = entries(&*docs, None);
        Ok(self.live.register(collection, filter, &current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn doc(body: Value) -> Document {
        let Value::Object(doc) = body else { unreachable!() };
        doc
    }

    #[tokio::test]
    async fn set_get_update_remove() {
        let store = MemoryDocumentStore::new();
        store
            .set("users", "u1", doc(json!({ "name": "Ann", "email": "a@x" })))
            .await
            .unwrap();
        store
            .update("users", "u1", doc(json!({ "name": "Ann B", "email": null })))
            .await
            .unwrap();

        let stored = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(Value::Object(stored), json!({ "name": "Ann B" }));

        store.remove("users", "u1").await.unwrap();
        store.remove("users", "u1").await.unwrap();
        assert!(store.get("users", "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_filters_on_one_field() {
        let store = MemoryDocumentStore::new();
        for (key, item) in [("a", "1"), ("b", "2"), ("c", "1")] {
            store
                .set("ratings", key, doc(json!({ "itemId": item })))
                .await
                .unwrap();
        }

        let keys: Vec<String> = store
            .query("ratings", Some(Equality::new("itemId", "1")))
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["a", "c"]);
        assert_eq!(store.query("ratings", None).await.unwrap().len(), 3);
        assert!(store.query("missing", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscription_sees_writes_until_cancelled() {
        let store = MemoryDocumentStore::new();
        store
            .set("forumPosts", "p1", doc(json!({ "title": "first" })))
            .await
            .unwrap();

        let mut sub = store.subscribe("forumPosts", None).await.unwrap();
        assert_eq!(sub.next().await.unwrap().len(), 1);

        store
            .set("forumPosts", "p2", doc(json!({ "title": "second" })))
            .await
            .unwrap();
        assert_eq!(sub.next().await.unwrap().len(), 2);

        sub.cancel();
        store.remove("forumPosts", "p1").await.unwrap();
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn rejects_unaddressable_keys() {
        let store = MemoryDocumentStore::new();
        assert!(store.set("items", "", Document::new()).await.is_err());
        assert!(store.set("items", "a/b", Document::new()).await.is_err());
    }
}
