//! Process-wide registry of informers.
//!
//! Every consumer asking for the same kind in the same scope shares one
//! informer, so one upstream watch feeds all of them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tenant_cache_core::{DynamicObject, Resource, Scope};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::InformerConfig;
use crate::informer::Informer;
use crate::lister::Listable;
use crate::source::{EventSource, WatchTarget};

/// Creates and shares informers over one [`EventSource`].
pub struct SharedInformerFactory {
    source: Arc<dyn EventSource<DynamicObject>>,
    config: InformerConfig,
    informers: Mutex<HashMap<WatchTarget, Arc<Informer<DynamicObject>>>>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl SharedInformerFactory {
    /// Create a factory.
    #[must_use]
    pub fn new(source: Arc<dyn EventSource<DynamicObject>>, config: InformerConfig) -> Self {
        Self {
            source,
            config,
            informers: Mutex::new(HashMap::new()),
            cancel: Mutex::new(None),
        }
    }

    /// The informer for `kind` in `scope`, created on first use.
    ///
    /// Informers requested after [`SharedInformerFactory::start`] are started
    /// immediately, which requires a Tokio runtime.
    pub fn informer_for(&self, kind: &str, scope: Scope) -> Arc<Informer<DynamicObject>> {
        let target = WatchTarget::new(kind, scope);
        let mut informers = self.informers.lock();
        if let Some(informer) = informers.get(&target) {
            return Arc::clone(informer);
        }

        let informer = Arc::new(Informer::new(
            target.clone(),
            Arc::clone(&self.source),
            self.config.clone(),
        ));
        informers.insert(target, Arc::clone(&informer));
        drop(informers);

        if let Some(cancel) = self.cancel.lock().as_ref() {
            informer.start(cancel.clone());
        }
        informer
    }

    /// The cluster-wide informer for `T`.
    pub fn informer<T: Resource>(&self) -> Arc<Informer<DynamicObject>> {
        self.informer_for(T::KIND, Scope::all())
    }

    /// The informer for `T` restricted to `tenant`.
    ///
    /// `""`, `system` and `all` share the cluster-wide informer.
    pub fn tenant_informer<T: Resource>(&self, tenant: &str) -> Arc<Informer<DynamicObject>> {
        self.informer_for(T::KIND, Scope::tenant(tenant))
    }

    /// A lister for `T` reading across every tenant.
    pub fn lister<T: Listable>(&self) -> T::Lister {
        T::lister(Arc::clone(self.informer::<T>().store()), "")
    }

    /// A lister for `T` reading only `tenant`, backed by a tenant-scoped informer.
    pub fn tenant_lister<T: Listable>(&self, tenant: &str) -> T::Lister {
        let informer = self.tenant_informer::<T>(tenant);
        T::lister(Arc::clone(informer.store()), tenant)
    }

    /// Start every registered informer, and every informer registered later,
    /// until `cancel` fires. Calling it again has no effect.
    pub fn start(&self, cancel: &CancellationToken) {
        {
            let mut current = self.cancel.lock();
            if current.is_some() {
                return;
            }
            *current = Some(cancel.clone());
        }

        let informers: Vec<_> = self.informers.lock().values().cloned().collect();
        info!(informers = informers.len(), "starting shared informers");
        for informer in informers {
            informer.start(cancel.clone());
        }
    }

    /// Wait until every started informer has synced.
    ///
    /// Returns the sync result per target; an informer that stopped before
    /// its first LIST completed reports false.
    pub async fn wait_for_cache_sync(&self) -> HashMap<WatchTarget, bool> {
        let informers: Vec<_> = self
            .informers
            .lock()
            .values()
            .filter(|i| i.is_started())
            .cloned()
            .collect();

        let results = futures::future::join_all(informers.iter().map(|i| i.wait_for_sync())).await;
        informers
            .iter()
            .map(|i| i.target().clone())
            .zip(results)
            .collect()
    }

    /// Number of distinct informers created.
    #[must_use]
    pub fn informer_count(&self) -> usize {
        self.informers.lock().len()
    }

    /// Returns true if an informer for `kind` in `scope` exists.
    #[must_use]
    pub fn has_informer(&self, kind: &str, scope: &Scope) -> bool {
        self.informers
            .lock()
            .keys()
            .any(|t| t.kind == kind && &t.scope == scope)
    }

    /// Stop every informer and wait for their reflectors to finish.
    pub async fn shutdown(&self) {
        let Some(cancel) = self.cancel.lock().clone() else {
            return;
        };
        cancel.cancel();

        let informers: Vec<_> = self.informers.lock().values().cloned().collect();
        futures::future::join_all(informers.iter().map(|i| i.stopped())).await;
        info!("shared informers stopped");
    }
}

impl std::fmt::Debug for SharedInformerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedInformerFactory")
            .field("informers", &self.informer_count())
            .field("started", &self.cancel.lock().is_some())
            .finish_non_exhaustive()
    }
}

