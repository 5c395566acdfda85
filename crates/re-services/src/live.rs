//! Typed wrapper over a store [`Subscription`].

use re_core::{decode_all, Subscription};
use serde::de::DeserializeOwned;

type Arrange<T> = Box<dyn Fn(&mut Vec<T>) + Send + Sync>;

/// A standing query whose snapshots are decoded into `T` and put in the
/// order the owning service promises (see the `subscribe_*` methods).
///
/// Drop the handle or call [`LiveQuery::cancel`] to stop receiving updates.
pub struct LiveQuery<T> {
    subscription: Subscription,
    arrange: Arrange<T>,
}

impl<T: DeserializeOwned> LiveQuery<T> {
    pub(crate) fn new(
        subscription: Subscription,
        arrange: impl Fn(&mut Vec<T>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            subscription,
            arrange: Box::new(arrange),
        }
    }

    /// Waits for the next result set. Malformed documents are skipped.
    pub async fn next(&mut self) -> Option<Vec<T>> {
        let snapshot = self.subscription.next().await?;
        let mut records = decode_all(snapshot);
        (self.arrange)(&mut records);
        Some(records)
    }

    /// Idempotent. No result set is delivered afterwards.
    pub fn cancel(&mut self) {
        self.subscription.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.subscription.is_cancelled()
    }
}
