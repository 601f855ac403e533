//! Bounded per-subscriber event queues.
//!
//! The reflector pushes every change into the queue of each subscription
//! whose scope covers the object. A full queue makes the reflector wait up
//! to the configured lag threshold; if the subscriber still has not drained
//! anything by then, its backlog is dropped and replaced by a single
//! [`Notification::Resync`] carrying a snapshot of its scope. Subscribers
//! therefore never block the reflector for long and never lose the final
//! state of an object.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tenant_cache_core::{Object, Scope};
use tenant_cache_store::{Store, StoreEvent};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::warn;

/// A change delivered to a subscriber.
#[derive(Debug, Clone)]
pub enum Notification<K> {
    /// The object appeared.
    Added(Arc<K>),
    /// The object changed.
    Updated {
        /// Previous state.
        old: Arc<K>,
        /// Current state.
        new: Arc<K>,
    },
    /// The object was removed.
    Deleted(Arc<K>),
    /// The subscriber fell behind. Pending events were discarded and this
    /// snapshot of everything in its scope takes their place.
    Resync(Vec<Arc<K>>),
}

impl<K: Object> Notification<K> {
    /// The object an incremental notification is about; `None` for a resync.
    #[must_use]
    pub fn object(&self) -> Option<&Arc<K>> {
        match self {
            Self::Added(obj) | Self::Deleted(obj) | Self::Updated { new: obj, .. } => Some(obj),
            Self::Resync(_) => None,
        }
    }
}

impl<K> From<StoreEvent<K>> for Notification<K> {
    fn from(event: StoreEvent<K>) -> Self {
        match event {
            StoreEvent::Added(obj) => Self::Added(obj),
            StoreEvent::Updated { old, new } => Self::Updated { old, new },
            StoreEvent::Deleted(obj) => Self::Deleted(obj),
        }
    }
}

struct Queue<K> {
    events: VecDeque<Notification<K>>,
    closed: bool,
    resyncs: u64,
}

struct Shared<K> {
    scope: Scope,
    capacity: usize,
    queue: Mutex<Queue<K>>,
    readable: Notify,
    writable: Notify,
}

impl<K: Object> Shared<K> {
    fn is_closed(&self) -> bool {
        self.queue.lock().closed
    }

    fn close(&self) {
        self.queue.lock().closed = true;
        self.readable.notify_one();
        self.writable.notify_waiters();
    }

    /// Enqueue `notification`, waiting for room until `deadline`.
    ///
    /// Returns false if the subscriber had to be resynced.
    async fn deliver(
        &self,
        notification: Notification<K>,
        deadline: Instant,
        store: &Store<K>,
    ) -> bool {
        loop {
            let writable = self.writable.notified();
            {
                let mut queue = self.queue.lock();
                if queue.closed {
                    return true;
                }
                if queue.events.len() < self.capacity {
                    queue.events.push_back(notification);
                    drop(queue);
                    self.readable.notify_one();
                    return true;
                }
            }
            if tokio::time::timeout_at(deadline, writable).await.is_err() {
                break;
            }
        }

        // The store already reflects `notification`, so the snapshot supersedes it.
        let snapshot = store.snapshot_matching(&self.scope);
        let mut queue = self.queue.lock();
        if queue.closed {
            return true;
        }
        let dropped = queue.events.len();
        queue.events.clear();
        queue.events.push_back(Notification::Resync(snapshot));
        queue.resyncs += 1;
        drop(queue);
        self.readable.notify_one();

        warn!(scope = %self.scope, dropped, "subscriber lagging, replaced backlog with snapshot");
        false
    }

    fn push_front(&self, notification: Notification<K>) {
        let mut queue = self.queue.lock();
        if queue.closed {
            return;
        }
        queue.events.push_front(notification);
        drop(queue);
        self.readable.notify_one();
    }
}

/// The receiving end of a subscription.
///
/// Dropping it releases the subscription; the reflector stops delivering to it.
pub struct Subscription<K: Object> {
    shared: Arc<Shared<K>>,
}

impl<K: Object> Subscription<K> {
    /// The scope this subscription receives changes for.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.shared.scope
    }

    /// Wait for the next notification.
    ///
    /// Returns `None` once the informer has stopped and the queue is drained.
    pub async fn recv(&mut self) -> Option<Notification<K>> {
        loop {
            {
                let mut queue = self.shared.queue.lock();
                if let Some(notification) = queue.events.pop_front() {
                    drop(queue);
                    self.shared.writable.notify_one();
                    return Some(notification);
                }
                if queue.closed {
                    return None;
                }
            }
            self.shared.readable.notified().await;
        }
    }

    /// Take the next notification without waiting.
    pub fn try_recv(&mut self) -> Option<Notification<K>> {
        let notification = self.shared.queue.lock().events.pop_front();
        if notification.is_some() {
            self.shared.writable.notify_one();
        }
        notification
    }

    /// Number of notifications waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.queue.lock().events.len()
    }

    /// Returns true if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times this subscriber was resynced for lagging.
    #[must_use]
    pub fn resync_count(&self) -> u64 {
        self.shared.queue.lock().resyncs
    }

    /// Queue `objects` ahead of everything pending.
    ///
    /// Used to replay the store to a late subscriber; changes queued since it
    /// registered are already reflected in the snapshot.
    pub(crate) fn prepend_snapshot(&self, objects: Vec<Arc<K>>) {
        if !objects.is_empty() {
            self.shared.push_front(Notification::Resync(objects));
        }
    }

    /// Returns true once the subscription will receive nothing new.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl<K: Object> Drop for Subscription<K> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl<K: Object> std::fmt::Debug for Subscription<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("scope", &self.shared.scope)
            .field("pending", &self.len())
            .finish_non_exhaustive()
    }
}

/// Registry of live subscriptions for one informer.
pub(crate) struct Fanout<K> {
    subscribers: Mutex<Vec<Arc<Shared<K>>>>,
    closed: Mutex<bool>,
    capacity: usize,
    lag_threshold: Duration,
}

impl<K: Object> Fanout<K> {
    pub(crate) fn new(capacity: usize, lag_threshold: Duration) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
            capacity: capacity.max(1),
            lag_threshold,
        }
    }

    /// Register a subscription for `scope`.
    pub(crate) fn subscribe(&self, scope: Scope) -> Subscription<K> {
        let shared = Arc::new(Shared {
            scope,
            capacity: self.capacity,
            queue: Mutex::new(Queue {
                events: VecDeque::new(),
                closed: false,
                resyncs: 0,
            }),
            readable: Notify::new(),
            writable: Notify::new(),
        });

        {
            let closed = self.closed.lock();
            if *closed {
                shared.close();
            } else {
                self.subscribers.lock().push(Arc::clone(&shared));
            }
        }

        Subscription { shared }
    }

    /// Deliver `notification` to every subscription whose scope covers its object.
    pub(crate) async fn dispatch(&self, notification: Notification<K>, store: &Store<K>) {
        let Some(obj) = notification.object() else {
            return;
        };
        let targets: Vec<Arc<Shared<K>>> = {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|s| !s.is_closed());
            subscribers
                .iter()
                .filter(|s| s.scope.covers(obj.meta()))
                .cloned()
                .collect()
        };

        let deadline = Instant::now() + self.lag_threshold;
        for shared in targets {
            shared.deliver(notification.clone(), deadline, store).await;
        }
    }

    /// Number of live subscriptions.
    pub(crate) fn len(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| !s.is_closed());
        subscribers.len()
    }

    /// Close every subscription and refuse new ones.
    pub(crate) fn close_all(&self) {
        *self.closed.lock() = true;
        let subscribers = std::mem::take(&mut *self.subscribers.lock());
        for shared in subscribers {
            shared.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenant_cache_core::{DynamicObject, ObjectMeta, Tenant};

    fn obj(tenant: &str, ns: &str, name: &str) -> DynamicObject {
        DynamicObject::new(
            "Mission",
            ObjectMeta::new(Tenant::parse(tenant).unwrap(), ns, name).with_resource_version("1"),
        )
    }

    fn added(store: &Store<DynamicObject>, o: DynamicObject) -> Notification<DynamicObject> {
        store.put(o).unwrap().into()
    }

    #[tokio::test]
    async fn delivers_only_covered_objects() {
        let store = Store::new();
        let fanout = Fanout::new(16, Duration::from_secs(1));
        let mut acme = fanout.subscribe(Scope::tenant("acme"));
        let mut web = fanout.subscribe(Scope::namespace("web"));

        fanout.dispatch(added(&store, obj("acme", "web", "a")), &store).await;
        fanout.dispatch(added(&store, obj("beta", "web", "b")), &store).await;
        fanout.dispatch(added(&store, obj("acme", "db", "c")), &store).await;

        let names = |sub: &mut Subscription<DynamicObject>| {
            let mut out = Vec::new();
            while let Some(n) = sub.try_recv() {
                out.push(n.object().unwrap().metadata.name.clone());
            }
            out
        };
        assert_eq!(names(&mut acme), ["a", "c"]);
        assert_eq!(names(&mut web), ["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_turns_into_resync() {
        let store = Store::new();
        let fanout = Fanout::new(2, Duration::from_millis(100));
        let mut sub = fanout.subscribe(Scope::all());

        for name in ["a", "b", "c"] {
            fanout.dispatch(added(&store, obj("", "web", name)), &store).await;
        }

        assert_eq!(sub.len(), 1);
        assert_eq!(sub.resync_count(), 1);
        let Some(Notification::Resync(objects)) = sub.try_recv() else {
            panic!("expected resync");
        };
        assert_eq!(objects.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn draining_reader_avoids_resync() {
        let store = Arc::new(Store::new());
        let fanout = Arc::new(Fanout::new(1, Duration::from_secs(5)));
        let mut sub = fanout.subscribe(Scope::all());

        let producer = {
            let store = Arc::clone(&store);
            let fanout = Arc::clone(&fanout);
            tokio::spawn(async move {
                for name in ["a", "b", "c", "d"] {
                    let n = added(&store, obj("", "web", name));
                    fanout.dispatch(n, &store).await;
                }
            })
        };

        let mut seen = Vec::new();
        while seen.len() < 4 {
            match sub.recv().await {
                Some(Notification::Added(o)) => seen.push(o.metadata.name.clone()),
                other => panic!("unexpected {other:?}"),
            }
        }
        producer.await.unwrap();
        assert_eq!(seen, ["a", "b", "c", "d"]);
        assert_eq!(sub.resync_count(), 0);
    }

    #[tokio::test]
    async fn dropped_subscriptions_are_pruned() {
        let fanout: Fanout<DynamicObject> = Fanout::new(4, Duration::from_secs(1));
        let keep = fanout.subscribe(Scope::all());
        let gone = fanout.subscribe(Scope::all());
        assert_eq!(fanout.len(), 2);
        drop(gone);
        assert_eq!(fanout.len(), 1);
        drop(keep);
    }

    #[tokio::test]
    async fn close_all_ends_receivers_after_drain() {
        let store = Store::new();
        let fanout = Fanout::new(4, Duration::from_secs(1));
        let mut sub = fanout.subscribe(Scope::all());
        fanout.dispatch(added(&store, obj("", "web", "a")), &store).await;
        fanout.close_all();

        assert!(matches!(sub.recv().await, Some(Notification::Added(_))));
        assert!(sub.recv().await.is_none());
        assert!(fanout.subscribe(Scope::all()).is_closed());
    }

    #[tokio::test]
    async fn snapshot_is_queued_ahead_of_pending_changes() {
        let store = Store::new();
        let fanout = Fanout::new(4, Duration::from_secs(1));
        let mut sub = fanout.subscribe(Scope::all());
        fanout.dispatch(added(&store, obj("", "web", "b")), &store).await;

        sub.prepend_snapshot(store.snapshot_matching(&Scope::all()));
        assert!(matches!(sub.try_recv(), Some(Notification::Resync(objs)) if objs.len() == 1));
        assert!(matches!(sub.try_recv(), Some(Notification::Added(_))));
    }
}
