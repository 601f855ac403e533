//! List-then-watch loop feeding a store.
//!
//! A reflector LISTs its target page by page, atomically replaces the store
//! contents with the result, then WATCHes from the listed resource version and
//! applies every change to the store before handing it to subscribers. Any
//! failure sends it back to a fresh LIST after a back-off.

use std::sync::Arc;

use futures::StreamExt;
use tenant_cache_core::Object;
use tenant_cache_store::{Store, StoreEvent};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::config::InformerConfig;
use crate::source::{EventSource, ListOptions, SourceError, WatchEvent, WatchTarget};
use crate::state::{is_valid_transition, ReflectorState};
use crate::subscription::{Fanout, Notification};

enum WatchOutcome {
    Cancelled,
    Failed(SourceError),
}

/// Keeps a store in sync with an [`EventSource`].
pub struct Reflector<K: Object> {
    target: WatchTarget,
    source: Arc<dyn EventSource<K>>,
    store: Arc<Store<K>>,
    fanout: Arc<Fanout<K>>,
    config: InformerConfig,
    state: watch::Sender<ReflectorState>,
    synced: watch::Sender<bool>,
}

impl<K: Object> Reflector<K> {
    pub(crate) fn new(
        target: WatchTarget,
        source: Arc<dyn EventSource<K>>,
        store: Arc<Store<K>>,
        fanout: Arc<Fanout<K>>,
        config: InformerConfig,
    ) -> Self {
        Self {
            target,
            source,
            store,
            fanout,
            config,
            state: watch::Sender::new(ReflectorState::Initial),
            synced: watch::Sender::new(false),
        }
    }

    /// What this reflector lists and watches.
    #[must_use]
    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ReflectorState {
        *self.state.borrow()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ReflectorState> {
        self.state.subscribe()
    }

    /// Returns true once the first LIST has been applied to the store.
    #[must_use]
    pub fn has_synced(&self) -> bool {
        *self.synced.borrow()
    }

    /// Subscribe to the synced flag.
    #[must_use]
    pub fn watch_synced(&self) -> watch::Receiver<bool> {
        self.synced.subscribe()
    }

    fn transition(&self, to: ReflectorState) {
        let from = self.state();
        if from == to {
            return;
        }
        if !is_valid_transition(from, to) {
            warn!(informer = %self.target, %from, %to, "unexpected reflector transition");
        }
        debug!(informer = %self.target, %from, %to, "reflector state change");
        self.state.send_replace(to);
    }

    /// Run until `cancel` fires.
    ///
    /// On return the reflector is `Stopped` and every subscription is closed.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut backoff = Backoff::new(self.config.initial_backoff(), self.config.max_backoff());
        info!(informer = %self.target, "starting reflector");

        loop {
            self.transition(ReflectorState::Listing);
            let listed = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                listed = self.list_and_replace() => listed,
            };

            let failure = match listed {
                Ok(resource_version) => {
                    backoff.reset();
                    self.transition(ReflectorState::Watching);
                    match self.watch_from(resource_version, &cancel).await {
                        WatchOutcome::Cancelled => break,
                        WatchOutcome::Failed(err) => err,
                    }
                }
                Err(err) => err,
            };

            self.transition(ReflectorState::Error);
            if failure.is_gone() {
                info!(informer = %self.target, error = %failure, "resource version expired, relisting");
            } else {
                warn!(informer = %self.target, error = %failure, "list/watch failed, will retry");
            }

            self.transition(ReflectorState::Backoff);
            let delay = backoff.next_delay();
            debug!(informer = %self.target, delay = ?delay, "backing off");
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.transition(ReflectorState::Stopped);
        self.fanout.close_all();
        info!(informer = %self.target, "reflector stopped");
    }

    async fn list_and_replace(&self) -> Result<String, SourceError> {
        let mut items = Vec::new();
        let mut options = ListOptions {
            limit: Some(self.config.page_size).filter(|&n| n > 0),
            continue_token: None,
        };
        let mut pages = 0usize;

        let resource_version = loop {
            let page = self.source.list(&self.target, &options).await?;
            pages += 1;
            items.extend(page.items);
            match page.continue_token.filter(|t| !t.is_empty()) {
                Some(token) => options.continue_token = Some(token),
                None => break page.resource_version,
            }
        };

        let count = items.len();
        let events = self.store.replace_all(items, resource_version.clone());
        self.synced.send_replace(true);
        info!(
            informer = %self.target,
            objects = count,
            pages,
            resource_version = %resource_version,
            "list applied"
        );

        for event in events {
            self.fanout.dispatch(event.into(), &self.store).await;
        }
        Ok(resource_version)
    }

    async fn watch_from(&self, resource_version: String, cancel: &CancellationToken) -> WatchOutcome {
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => return WatchOutcome::Cancelled,
            opened = self.source.watch(&self.target, &resource_version) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => return WatchOutcome::Failed(err),
        };

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return WatchOutcome::Cancelled,
                next = stream.next() => next,
            };
            match next {
                None => return WatchOutcome::Failed(SourceError::WatchClosed),
                Some(Err(err)) => return WatchOutcome::Failed(err),
                Some(Ok(WatchEvent::Error(status))) => return WatchOutcome::Failed(status.into()),
                Some(Ok(WatchEvent::Bookmark { resource_version })) => {
                    self.store.set_resource_version(resource_version);
                }
                Some(Ok(WatchEvent::Added(obj) | WatchEvent::Modified(obj))) => self.apply_upsert(obj).await,
                Some(Ok(WatchEvent::Deleted(obj))) => self.apply_delete(obj).await,
            }
        }
    }

    fn is_stale(&self, obj: &K, key: &str) -> bool {
        let Some(incoming) = obj.meta().resource_version_number() else {
            return false;
        };
        self.store
            .get(key)
            .and_then(|held| held.meta().resource_version_number())
            .is_some_and(|held| incoming < held)
    }

    async fn apply_upsert(&self, obj: K) {
        let Ok(key) = obj.meta().key() else {
            warn!(informer = %self.target, name = %obj.meta().name, "dropping event for object without a valid key");
            return;
        };
        if self.is_stale(&obj, &key) {
            debug!(informer = %self.target, key = %key, "ignoring stale event");
            return;
        }

        let resource_version = obj.meta().resource_version.clone();
        match self.store.put(obj) {
            Ok(StoreEvent::Updated { old, new }) if new.meta().is_recreation_of(old.meta()) => {
                self.store.set_resource_version(resource_version);
                debug!(informer = %self.target, key = %key, "object recreated under the same key");
                self.fanout.dispatch(Notification::Deleted(old), &self.store).await;
                self.fanout.dispatch(Notification::Added(new), &self.store).await;
            }
            Ok(event) => {
                self.store.set_resource_version(resource_version);
                self.fanout.dispatch(event.into(), &self.store).await;
            }
            Err(err) => warn!(informer = %self.target, key = %key, error = %err, "dropping invalid object"),
        }
    }

    async fn apply_delete(&self, obj: K) {
        let Ok(key) = obj.meta().key() else {
            warn!(informer = %self.target, name = %obj.meta().name, "dropping event for object without a valid key");
            return;
        };
        if self.is_stale(&obj, &key) {
            debug!(informer = %self.target, key = %key, "ignoring stale delete");
            return;
        }

        let resource_version = obj.meta().resource_version.clone();
        match self.store.delete(&key) {
            Ok(_) => {
                self.store.set_resource_version(resource_version);
                self.fanout
                    .dispatch(Notification::Deleted(Arc::new(obj)), &self.store)
                    .await;
            }
            Err(err) if err.is_not_found() => {
                debug!(informer = %self.target, key = %key, "delete for unknown object");
            }
            Err(err) => warn!(informer = %self.target, key = %key, error = %err, "delete failed"),
        }
    }
}

impl<K: Object> std::fmt::Debug for Reflector<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reflector")
            .field("target", &self.target)
            .field("state", &self.state())
            .field("synced", &self.has_synced())
            .finish_non_exhaustive()
    }
}
