//! # Core Traits (Ports)
//!
//! Any store plugin must implement these traits to back the services.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::document::{Document, Entry};
use crate::live::Subscription;

/// Equality predicate on one top-level field, the only query shape the
/// store offers.
#[derive(Debug, Clone, PartialEq)]
pub struct Equality {
    pub field: String,
    pub value: Value,
}

impl Equality {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        doc.get(&self.field) == Some(&self.value)
    }
}

/// Persistence contract of the realtime document database.
///
/// Documents live at `collection/key`. None of the operations are
/// transactional across documents.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> anyhow::Result<Option<Document>>;

    /// Overwrites the whole document.
    async fn set(&self, collection: &str, key: &str, doc: Document) -> anyhow::Result<()>;

    /// Merges top-level fields into the document, creating it if absent.
    /// A null field value removes that field.
    async fn update(&self, collection: &str, key: &str, patch: Document) -> anyhow::Result<()>;

    /// Removing an absent document is not an error.
    async fn remove(&self, collection: &str, key: &str) -> anyhow::Result<()>;

    /// Generates a fresh key for a new document in `collection`.
    fn push_key(&self, collection: &str) -> String;

    /// Every document of `collection`, or only those matching `filter`, in key order.
    async fn query(&self, collection: &str, filter: Option<Equality>) -> anyhow::Result<Vec<Entry>>;

    /// Live variant of [`DocumentStore::query`]: emits the current result
    /// set immediately and again after each change to it.
    async fn subscribe(
        &self,
        collection: &str,
        filter: Option<Equality>,
    ) -> anyhow::Result<Subscription>;
}

/// Time-ordered key used by the store plugins for `push_key`.
pub fn generate_key() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Rejects path segments the store cannot address.
pub fn check_segment(segment: &str) -> anyhow::Result<()> {
    if segment.is_empty() || segment.contains('/') {
        anyhow::bail!("invalid path segment {segment:?}");
    }
    Ok(())
}
