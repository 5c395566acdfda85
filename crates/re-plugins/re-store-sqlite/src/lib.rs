//! # re-store-sqlite Implementation
//!
//! Persists store documents as JSON text in a single SQLite table keyed by
//! `(collection, key)`. Equality queries are answered with `json_extract`.

use std::str::FromStr;

use async_trait::async_trait;
use re_core::document::{merge, Document, Entry};
use re_core::live::{LiveRegistry, Subscription};
use re_core::traits::{check_segment, generate_key, DocumentStore, Equality};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tokio::sync::Mutex;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    key        TEXT NOT NULL,
    body       TEXT NOT NULL,
    PRIMARY KEY (collection, key)
)";

const UPSERT: &str = "INSERT INTO documents (collection, key, body) VALUES (?, ?, ?)
    ON CONFLICT (collection, key) DO UPDATE SET body = excluded.body";

pub struct SqliteDocumentStore {
    pool: SqlitePool,
    live: LiveRegistry,
    /// Serializes writes with the notifications they trigger.
    writes: Mutex<()>,
}

impl SqliteDocumentStore {
    /// Connects to `url` (e.g. `sqlite:rate_everything.db` or
    /// `sqlite::memory:`) and creates the schema if needed.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to `:memory:` opens a separate database, so an
        // in-memory store must stay on one connection that is never recycled.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        sqlx::query(SCHEMA).execute(&pool).await?;
        tracing::info!(url, "sqlite document store ready");

        Ok(Self {
            pool,
            live: LiveRegistry::new(),
            writes: Mutex::new(()),
        })
    }

    async fn load(&self, collection: &str) -> anyhow::Result<Vec<Entry>> {
        let rows = sqlx::query("SELECT key, body FROM documents WHERE collection = ? ORDER BY key")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_entry).collect()
    }

    /// Must be called with `writes` held. Runs after the write has been
    /// committed, so a failed reload is logged rather than returned.
    async fn broadcast(&self, collection: &str) {
        if !self.live.is_watched(collection) {
            return;
        }
        match self.load(collection).await {
            Ok(entries) => self.live.notify(collection, &entries),
            Err(e) => tracing::warn!(collection, error = %e, "failed to reload snapshot for subscribers"),
        }
    }
}

fn row_to_entry(row: &SqliteRow) -> anyhow::Result<Entry> {
    let key: String = row.get("key");
    let body: String = row.get("body");
    let doc: Document = serde_json::from_str(&body)?;
    Ok((key, doc))
}

/// JSON path of a top-level field, restricted to names that need no quoting.
fn field_path(field: &str) -> anyhow::Result<String> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        anyhow::bail!("unsupported query field {field:?}");
    }
    Ok(format!("$.{field}"))
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> anyhow::Result<Option<Document>> {
        check_segment(key)?;
        let row = sqlx::query("SELECT key, body FROM documents WHERE collection = ? AND key = ?")
            .bind(collection)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(row_to_entry)
            .transpose()
            .map(|entry| entry.map(|(_, doc)| doc))
    }

    async fn set(&self, collection: &str, key: &str, doc: Document) -> anyhow::Result<()> {
        check_segment(collection)?;
        check_segment(key)?;
        let _guard = self.writes.lock().await;

        sqlx::query(UPSERT)
            .bind(collection)
            .bind(key)
            .bind(serde_json::to_string(&doc)?)
            .execute(&self.pool)
            .await?;

        tracing::debug!(collection, key, "document set");
        self.broadcast(collection).await;
        Ok(())
    }

    /// Read-merge-write inside one transaction.
    async fn update(&self, collection: &str, key: &str, patch: Document) -> anyhow::Result<()> {
        check_segment(collection)?;
        check_segment(key)?;
        let _guard = self.writes.lock().await;
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT body FROM documents WHERE collection = ? AND key = ?")
                .bind(collection)
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?;
        let mut doc: Document = match current {
            Some(body) => serde_json::from_str(&body)?,
            None => Document::new(),
        };
        merge(&mut doc, patch);

        sqlx::query(UPSERT)
            .bind(collection)
            .bind(key)
            .bind(serde_json::to_string(&doc)?)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!(collection, key, "document updated");
        self.broadcast(collection).await;
        Ok(())
    }

    async fn remove(&self, collection: &str, key: &str) -> anyhow::Result<()> {
        check_segment(key)?;
        let _guard = self.writes.lock().await;

        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND key = ?")
            .bind(collection)
            .bind(key)
            .execute(&self.pool)
            .await?;

        tracing::debug!(collection, key, removed = result.rows_affected(), "document removed");
        self.broadcast(collection).await;
        Ok(())
    }

    fn push_key(&self, _collection: &str) -> String {
        generate_key()
    }

    async fn query(&self, collection: &str, filter: Option<Equality>) -> anyhow::Result<Vec<Entry>> {
        let Some(filter) = filter else {
            return self.load(collection).await;
        };

        let sql = "SELECT key, body FROM documents
            WHERE collection = ? AND json_extract(body, ?) = ? ORDER BY key";
        let query = sqlx::query(sql)
            .bind(collection)
            .bind(field_path(&filter.field)?);
        let query = match &filter.value {
            Value::String(s) => query.bind(s.clone()),
            Value::Bool(b) => query.bind(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64()),
            },
            // json_extract cannot compare these; filter every document below.
            Value::Null | Value::Array(_) | Value::Object(_) => {
                let all = self.load(collection).await?;
                return Ok(all.into_iter().filter(|(_, doc)| filter.matches(doc)).collect());
            }
        };

        let rows = query.fetch_all(&self.pool).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let entry = row_to_entry(row)?;
            // SQLite compares loosely (1 = true); keep only exact JSON matches.
            if filter.matches(&entry.1) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn subscribe(
        &self,
        collection: &str,
        filter: Option<Equality>,
    ) -> anyhow::Result<Subscription> {
        check_segment(collection)?;
        let _guard = self.writes.lock().await;
        let current = self.load(collection).await?;
        Ok(self.live.register(collection, filter, &current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(body: Value) -> Document {
        let Value::Object(doc) = body else { unreachable!() };
        doc
    }

    #[tokio::test]
    async fn test_set_update_and_get() {
        let store = SqliteDocumentStore::new("sqlite::memory:").await.unwrap();

        store
            .set("items", "i1", doc(json!({ "externalId": 100, "title": "Foo" })))
            .await
            .expect("Failed to set document");
        store
            .update("items", "i1", doc(json!({ "title": "Bar", "thumbnail": null })))
            .await
            .expect("Failed to update document");

        let stored = store.get("items", "i1").await.unwrap().unwrap();
        assert_eq!(Value::Object(stored), json!({ "externalId": 100, "title": "Bar" }));

        store.remove("items", "i1").await.unwrap();
        assert!(store.get("items", "i1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_equality_query_by_type() {
        let store = SqliteDocumentStore::new("sqlite::memory:").await.unwrap();
        store.set("items", "a", doc(json!({ "externalId": 1, "flag": true }))).await.unwrap();
        store.set("items", "b", doc(json!({ "externalId": 2, "flag": 1 }))).await.unwrap();
        store.set("ratings", "c", doc(json!({ "itemId": "1" }))).await.unwrap();

        let by_number = store
            .query("items", Some(Equality::new("externalId", 1)))
            .await
            .unwrap();
        assert_eq!(by_number.len(), 1);
        assert_eq!(by_number[0].0, "a");

        let by_bool = store
            .query("items", Some(Equality::new("flag", true)))
            .await
            .unwrap();
        assert_eq!(by_bool.len(), 1);

        let by_string = store
            .query("ratings", Some(Equality::new("itemId", "1")))
            .await
            .unwrap();
        assert_eq!(by_string.len(), 1);

        assert!(store
            .query("items", Some(Equality::new("bad field", 1)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_committed_write_survives_failed_snapshot() {
        let store = SqliteDocumentStore::new("sqlite::memory:").await.unwrap();
        let _sub = store.subscribe("users", None).await.unwrap();

        sqlx::query(UPSERT)
            .bind("users")
            .bind("broken")
            .bind("not json")
            .execute(&store.pool)
            .await
            .unwrap();

        store
            .set("users", "u1", doc(json!({ "displayName": "Ann" })))
            .await
            .expect("write should succeed even when subscribers cannot be refreshed");
        let stored = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(stored["displayName"], "Ann");
    }

    #[tokio::test]
    async fn test_subscription_follows_writes() {
        let store = SqliteDocumentStore::new("sqlite::memory:").await.unwrap();
        let mut sub = store
            .subscribe("forumComments", Some(Equality::new("postId", "p1")))
            .await
            .unwrap();
        assert!(sub.next().await.unwrap().is_empty());

        store
            .set("forumComments", "c1", doc(json!({ "postId": "p1" })))
            .await
            .unwrap();
        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, "c1");

        drop(sub);
        store
            .set("forumComments", "c2", doc(json!({ "postId": "p1" })))
            .await
            .unwrap();
    }
}
