//! # Live Subscriptions
//!
//! A standing query is a channel of snapshots. Store plugins keep a
//! [`LiveRegistry`] and call [`LiveRegistry::notify`] after every write while
//! still holding their write serialization, so each subscriber sees its
//! snapshots in commit order.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::document::Entry;
use crate::traits::Equality;

/// The full result set of a query at one point in time.
pub type Snapshot = Vec<Entry>;

/// Receiving half of a standing query.
///
/// Cancelling (or dropping) the handle stops delivery; snapshots already
/// buffered are discarded.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Snapshot>,
    cancelled: bool,
}

impl Subscription {
    /// Creates a subscription together with the sender that feeds it.
    pub fn channel() -> (mpsc::UnboundedSender<Snapshot>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx, cancelled: false })
    }

    /// Waits for the next snapshot. `None` once cancelled or once the store
    /// has dropped the sender.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if self.cancelled {
            return None;
        }
        self.rx.recv().await
    }

    /// Returns a buffered snapshot without waiting.
    pub fn try_next(&mut self) -> Option<Snapshot> {
        if self.cancelled {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Idempotent.
    pub fn cancel(&mut self) {
        if !self.cancelled {
            self.cancelled = true;
            self.rx.close();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

struct Subscriber {
    collection: String,
    filter: Option<Equality>,
    last: Snapshot,
    tx: mpsc::UnboundedSender<Snapshot>,
}

/// Bookkeeping for every open subscription of one store.
#[derive(Default)]
pub struct LiveRegistry {
    next_id: AtomicU64,
    subscribers: DashMap<u64, Subscriber>,
}

impl LiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a subscription and immediately emits the matching part of `current`.
    pub fn register(
        &self,
        collection: &str,
        filter: Option<Equality>,
        current: &[Entry],
    ) -> Subscription {
        let (tx, subscription) = Subscription::channel();
        let initial = select(current, filter.as_ref());
        // The receiver is alive, so this send cannot fail.
        let _ = tx.send(initial.clone());

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(
            id,
            Subscriber {
                collection: collection.to_string(),
                filter,
                last: initial,
                tx,
            },
        );
        tracing::debug!(collection, id, "subscription opened");
        subscription
    }

    /// Whether any open subscription watches `collection`. Plugins use this
    /// to skip loading a snapshot nobody will receive.
    pub fn is_watched(&self, collection: &str) -> bool {
        self.subscribers
            .iter()
            .any(|s| s.collection == collection && !s.tx.is_closed())
    }

    /// Pushes the new state of `collection` to its subscribers. Subscribers
    /// whose result set did not change receive nothing; closed ones are dropped.
    pub fn notify(&self, collection: &str, entries: &[Entry]) {
        self.subscribers.retain(|id, sub| {
            if sub.tx.is_closed() {
                tracing::debug!(collection = %sub.collection, id, "subscription closed");
                return false;
            }
            if sub.collection != collection {
                return true;
            }
            let snapshot = select(entries, sub.filter.as_ref());
            if snapshot == sub.last {
                return true;
            }
            sub.last = snapshot.clone();
            sub.tx.send(snapshot).is_ok()
        });
    }

    /// Number of subscriptions still registered.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

fn select(entries: &[Entry], filter: Option<&Equality>) -> Snapshot {
    entries
        .iter()
        .filter(|(_, doc)| filter.map_or(true, |f| f.matches(doc)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use serde_json::{json, Value};

    fn entry(key: &str, body: Value) -> Entry {
        let Value::Object(doc) = body else { unreachable!() };
        (key.to_string(), doc)
    }

    #[tokio::test]
    async fn emits_initial_and_changed_snapshots() {
        let registry = LiveRegistry::new();
        let a = entry("a", json!({ "postId": "p1" }));
        let b = entry("b", json!({ "postId": "p2" }));

        let mut sub = registry.register(
            "forumComments",
            Some(Equality::new("postId", "p1")),
            &[a.clone(), b.clone()],
        );
        assert_eq!(sub.next().await.unwrap(), vec![a.clone()]);

        // An unrelated change does not reach this subscriber.
        let c = entry("c", json!({ "postId": "p2" }));
        registry.notify("forumComments", &[a.clone(), b.clone(), c]);
        assert!(sub.try_next().is_none());

        let d = entry("d", json!({ "postId": "p1" }));
        registry.notify("forumComments", &[a.clone(), b, d.clone()]);
        assert_eq!(sub.next().await.unwrap(), vec![a, d]);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_discards_buffered_snapshots() {
        let registry = LiveRegistry::new();
        let mut sub = registry.register("ratings", None, &[]);
        registry.notify("ratings", &[entry("r1", json!({ "rating": 4 }))]);

        sub.cancel();
        sub.cancel();
        assert!(sub.is_cancelled());
        assert!(sub.next().await.is_none());

        registry.notify("ratings", &[]);
        assert!(registry.is_empty());
    }

    #[test]
    fn dropped_subscriptions_are_pruned() {
        let registry = LiveRegistry::new();
        let sub = registry.register("items", None, &[]);
        let _other = registry.register("users", None, &[]);
        assert!(registry.is_watched("items"));

        drop(sub);
        assert!(!registry.is_watched("items"));
        registry.notify("users", &Vec::<(String, Document)>::new());
        assert_eq!(registry.len(), 1);
    }
}
