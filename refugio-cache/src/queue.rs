//! Per-key mutation queue.
//!
//! Maps each [`CacheKey`] to the tail of its pending mutation chain. A
//! mutation registers all of its keys in one step when it is issued and then
//! waits for every predecessor tail before it may snapshot. Keys with no
//! pending mutation never wait, so unrelated keys are not serialized against
//! each other.

use futures_util::future::{join_all, BoxFuture, FutureExt, Shared};
use refugio_core::CacheKey;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

type Tail = Shared<BoxFuture<'static, ()>>;

#[derive(Default)]
pub struct MutationQueue {
    tails: Mutex<HashMap<CacheKey, Tail>>,
}

impl MutationQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Append a mutation touching `keys` to the chain of each key.
    ///
    /// Registration is atomic across all keys, which keeps the wait graph
    /// ordered by issue time and therefore free of cycles.
    pub fn enqueue<'a>(
        self: &Arc<Self>,
        keys: impl IntoIterator<Item = &'a CacheKey>,
    ) -> QueueSlot {
        let keys: BTreeSet<CacheKey> = keys.into_iter().cloned().collect();
        let (release, released) = oneshot::channel::<()>();
        let own_tail: Tail = async move {
            let _ = released.await;
        }
        .boxed()
        .shared();

        let mut tails = self.lock();
        let predecessors = keys
            .iter()
            .filter_map(|key| tails.insert(key.clone(), own_tail.clone()))
            .collect();

        QueueSlot {
            queue: Arc::clone(self),
            keys: keys.into_iter().collect(),
            predecessors,
            own_tail,
            release: Some(release),
        }
    }

    /// Number of keys with a pending mutation chain.
    pub fn pending_keys(&self) -> usize {
        self.lock().len()
    }

    pub fn is_pending(&self, key: &CacheKey) -> bool {
        self.lock().contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Tail>> {
        self.tails.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self, keys: &[CacheKey], own_tail: &Tail) {
        let mut tails = self.lock();
        for key in keys {
            if tails.get(key).is_some_and(|tail| tail.ptr_eq(own_tail)) {
                tails.remove(key);
            }
        }
    }
}

impl std::fmt::Debug for MutationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationQueue")
            .field("pending_keys", &self.pending_keys())
            .finish()
    }
}

/// A mutation's position in the queue. Dropping it lets successors proceed.
pub struct QueueSlot {
    queue: Arc<MutationQueue>,
    keys: Vec<CacheKey>,
    predecessors: Vec<Tail>,
    own_tail: Tail,
    release: Option<oneshot::Sender<()>>,
}

impl QueueSlot {
    /// Wait until every earlier mutation on any of this slot's keys has
    /// fully resolved.
    pub async fn ready(&mut self) {
        join_all(self.predecessors.iter().cloned()).await;
        self.predecessors.clear();
    }

    pub fn keys(&self) -> &[CacheKey] {
        &self.keys
    }
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            let _ = release.send(());
        }
        self.queue.release(&self.keys, &self.own_tail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refugio_core::cache_key;
    use std::time::Duration;

    fn key(id: &str) -> CacheKey {
        cache_key!["users", "favourites", id]
    }

    #[tokio::test]
    async fn test_unrelated_keys_do_not_wait() {
        let queue = MutationQueue::new();
        let _first = queue.enqueue([&key("u1")]);
        let mut second = queue.enqueue([&key("u2")]);
        tokio::time::timeout(Duration::from_millis(50), second.ready())
            .await
            .expect("unrelated key must not wait");
    }

    #[tokio::test]
    async fn test_same_key_waits_for_release() {
        let queue = MutationQueue::new();
        let first = queue.enqueue([&key("u1")]);
        let mut second = queue.enqueue([&key("u1")]);

        let blocked = tokio::time::timeout(Duration::from_millis(20), second.ready()).await;
        assert!(blocked.is_err());

        drop(first);
        tokio::time::timeout(Duration::from_millis(50), second.ready())
            .await
            .expect("released predecessor must unblock");
    }

    #[tokio::test]
    async fn test_partial_overlap_waits_for_every_predecessor() {
        let queue = MutationQueue::new();
        let a = queue.enqueue([&key("a")]);
        let b = queue.enqueue([&key("b")]);
        let mut both = queue.enqueue([&key("a"), &key("b")]);

        drop(a);
        let blocked = tokio::time::timeout(Duration::from_millis(20), both.ready()).await;
        assert!(blocked.is_err());

        drop(b);
        tokio::time::timeout(Duration::from_millis(50), both.ready())
            .await
            .expect("all predecessors released");
    }

    #[test]
    fn test_release_keeps_newer_tail() {
        let queue = MutationQueue::new();
        let first = queue.enqueue([&key("u1")]);
        let second = queue.enqueue([&key("u1")]);
        drop(first);
        assert!(queue.is_pending(&key("u1")));
        drop(second);
        assert_eq!(queue.pending_keys(), 0);
    }

    #[test]
    fn test_duplicate_keys_register_once() {
        let queue = MutationQueue::new();
        let slot = queue.enqueue([&key("u1"), &key("u1")]);
        assert_eq!(slot.keys().len(), 1);
        assert_eq!(queue.pending_keys(), 1);
    }
}
