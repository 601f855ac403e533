//! A store kept current by a reflector, plus the subscriptions it feeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tenant_cache_core::{Object, Scope};
use tenant_cache_store::Store;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::InformerConfig;
use crate::handler::{self, ResourceEventHandler};
use crate::reflector::Reflector;
use crate::source::{EventSource, WatchTarget};
use crate::state::ReflectorState;
use crate::subscription::{Fanout, Subscription};

/// One kind in one scope: the cache, its reflector and its subscribers.
pub struct Informer<K: Object> {
    store: Arc<Store<K>>,
    fanout: Arc<Fanout<K>>,
    reflector: Arc<Reflector<K>>,
    started: AtomicBool,
}

impl<K: Object> Informer<K> {
    /// Create an informer for `target`. Nothing happens until [`Informer::start`].
    #[must_use]
    pub fn new(target: WatchTarget, source: Arc<dyn EventSource<K>>, config: InformerConfig) -> Self {
        let store = Arc::new(Store::new());
        let fanout = Arc::new(Fanout::new(config.queue_capacity, config.lag_threshold()));
        let reflector = Arc::new(Reflector::new(
            target,
            source,
            Arc::clone(&store),
            Arc::clone(&fanout),
            config,
        ));
        Self {
            store,
            fanout,
            reflector,
            started: AtomicBool::new(false),
        }
    }

    /// What this informer lists and watches.
    #[must_use]
    pub fn target(&self) -> &WatchTarget {
        self.reflector.target()
    }

    /// The store the reflector writes into.
    #[must_use]
    pub fn store(&self) -> &Arc<Store<K>> {
        &self.store
    }

    /// Spawn the reflector on the current runtime.
    ///
    /// Returns `None` if the informer was already started.
    pub fn start(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return None;
        }
        debug!(informer = %self.target(), "spawning reflector");
        let reflector = Arc::clone(&self.reflector);
        Some(tokio::spawn(async move { reflector.run(cancel).await }))
    }

    /// Returns true once [`Informer::start`] has been called.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Returns true once the initial LIST has populated the store.
    #[must_use]
    pub fn has_synced(&self) -> bool {
        self.reflector.has_synced()
    }

    /// The newest resource version the store reflects, from a LIST, an
    /// applied change or a bookmark. Empty before the first LIST.
    #[must_use]
    pub fn last_sync_resource_version(&self) -> String {
        self.store.resource_version()
    }

    /// Wait until the initial LIST has populated the store.
    ///
    /// Returns false if the reflector stopped before syncing.
    pub async fn wait_for_sync(&self) -> bool {
        let mut synced = self.reflector.watch_synced();
        let mut state = self.reflector.watch_state();
        loop {
            if *synced.borrow_and_update() {
                return true;
            }
            if state.borrow_and_update().is_terminal() {
                return false;
            }
            tokio::select! {
                changed = synced.changed() => if changed.is_err() { return self.has_synced() },
                changed = state.changed() => if changed.is_err() { return self.has_synced() },
            }
        }
    }

    /// Wait until the reflector has stopped.
    pub async fn stopped(&self) {
        let mut state = self.reflector.watch_state();
        // The sender lives as long as the reflector, which `self` keeps alive.
        let _ = state.wait_for(|s| s.is_terminal()).await;
    }

    /// Current reflector state.
    #[must_use]
    pub fn state(&self) -> ReflectorState {
        self.reflector.state()
    }

    /// Subscribe to changes in the informer's whole scope.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<K> {
        self.subscribe_scoped(self.target().scope.clone())
    }

    /// Subscribe to changes inside `scope`.
    ///
    /// Only changes the informer observes are delivered, so a scope wider than
    /// the informer's own sees no more than [`Informer::subscribe`] would.
    #[must_use]
    pub fn subscribe_scoped(&self, scope: Scope) -> Subscription<K> {
        self.fanout.subscribe(scope)
    }

    /// Run `handler` on its own task for every change in the informer's scope.
    ///
    /// Objects already in the store are replayed to the handler as additions.
    pub fn add_handler<H>(&self, handler: H) -> JoinHandle<()>
    where
        H: ResourceEventHandler<K>,
    {
        let scope = self.target().scope.clone();
        let subscription = self.fanout.subscribe(scope.clone());
        subscription.prepend_snapshot(self.store.snapshot_matching(&scope));
        tokio::spawn(handler::run(subscription, handler))
    }

    /// Number of live subscriptions, handlers included.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.fanout.len()
    }
}

impl<K: Object> std::fmt::Debug for Informer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Informer")
            .field("target", self.target())
            .field("state", &self.state())
            .field("objects", &self.store.len())
            .finish_non_exhaustive()
    }
}
