//! The indexed store.
//!
//! One `RwLock` guards the primary map and both secondary indices, so a
//! reader never observes an object that is missing from an index or vice
//! versa. Readers collect `Arc`s under the read lock and visit them after it
//! is released; nothing runs caller code while a lock is held.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tenant_cache_core::{Object, Scope, Tenant, TenantScope};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// A mutation applied to the store, as observed by subscribers.
#[derive(Debug, Clone)]
pub enum StoreEvent<K> {
    /// A key that was absent now holds an object.
    Added(Arc<K>),
    /// A key holding an object was overwritten.
    Updated {
        /// The object before the write.
        old: Arc<K>,
        /// The object after the write.
        new: Arc<K>,
    },
    /// A key was removed; carries the last stored object.
    Deleted(Arc<K>),
}

impl<K: Object> StoreEvent<K> {
    /// The object the event is about (the new one for updates).
    #[must_use]
    pub fn object(&self) -> &Arc<K> {
        match self {
            Self::Added(obj) | Self::Deleted(obj) | Self::Updated { new: obj, .. } => obj,
        }
    }
}

struct Inner<K> {
    items: BTreeMap<String, Arc<K>>,
    by_tenant: BTreeMap<Tenant, BTreeSet<String>>,
    by_namespace: BTreeMap<(Tenant, String), BTreeSet<String>>,
    resource_version: String,
}

impl<K: Object> Inner<K> {
    fn insert(&mut self, key: String, obj: Arc<K>) -> Option<Arc<K>> {
        let old = self.items.insert(key.clone(), Arc::clone(&obj));
        if let Some(prev) = &old {
            self.unindex(&key, prev);
        }
        let meta = obj.meta();
        self.by_tenant
            .entry(meta.tenant.clone())
            .or_default()
            .insert(key.clone());
        self.by_namespace
            .entry((meta.tenant.clone(), meta.namespace.clone()))
            .or_default()
            .insert(key);
        old
    }

    fn remove(&mut self, key: &str) -> Option<Arc<K>> {
        let old = self.items.remove(key)?;
        self.unindex(key, &old);
        Some(old)
    }

    fn unindex(&mut self, key: &str, obj: &Arc<K>) {
        let meta = obj.meta();
        if let Some(keys) = self.by_tenant.get_mut(&meta.tenant) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_tenant.remove(&meta.tenant);
            }
        }
        let partition = (meta.tenant.clone(), meta.namespace.clone());
        if let Some(keys) = self.by_namespace.get_mut(&partition) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_namespace.remove(&partition);
            }
        }
    }

    fn collect<'a>(&self, keys: impl IntoIterator<Item = &'a String>) -> Vec<Arc<K>> {
        keys.into_iter()
            .filter_map(|k| self.items.get(k).cloned())
            .collect()
    }
}

/// Thread-safe map from canonical key to object with tenant and namespace indices.
pub struct Store<K> {
    inner: RwLock<Inner<K>>,
}

impl<K: Object> Default for Store<K> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner {
                items: BTreeMap::new(),
                by_tenant: BTreeMap::new(),
                by_namespace: BTreeMap::new(),
                resource_version: String::new(),
            }),
        }
    }
}

impl<K: Object> Store<K> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key_of(obj: &K) -> Result<String> {
        let meta = obj.meta();
        meta.validate()?;
        Ok(meta.key()?)
    }

    /// Insert or replace an object.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidObject` if the object has no name or cannot form a key.
    pub fn put(&self, obj: K) -> Result<StoreEvent<K>> {
        let key = Self::key_of(&obj)?;
        let new = Arc::new(obj);
        let old = self.inner.write().insert(key, Arc::clone(&new));
        Ok(match old {
            Some(old) => StoreEvent::Updated { old, new },
            None => StoreEvent::Added(new),
        })
    }

    /// Insert or replace an object only if the stored version is `expected`.
    ///
    /// An empty `expected` requires the key to be absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::VersionConflict` if the stored version differs, or
    /// `StoreError::InvalidObject` if the object cannot be indexed.
    pub fn put_if_version(&self, obj: K, expected: &str) -> Result<StoreEvent<K>> {
        let key = Self::key_of(&obj)?;
        let new = Arc::new(obj);

        let mut inner = self.inner.write();
        let found = inner
            .items
            .get(&key)
            .map(|o| o.meta().resource_version.clone());
        let matches = match &found {
            Some(rv) => rv == expected,
            None => expected.is_empty(),
        };
        if !matches {
            return Err(StoreError::VersionConflict {
                key,
                expected: expected.to_string(),
                found,
            });
        }
        let old = inner.insert(key, Arc::clone(&new));
        drop(inner);

        Ok(match old {
            Some(old) => StoreEvent::Updated { old, new },
            None => StoreEvent::Added(new),
        })
    }

    /// Remove the object stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if nothing is stored under the key.
    pub fn delete(&self, key: &str) -> Result<Arc<K>> {
        self.inner
            .write()
            .remove(key)
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    /// Fetch the object stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if nothing is stored under the key.
    pub fn get_by_key(&self, key: &str) -> Result<Arc<K>> {
        self.get(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })
    }

    /// Fetch the object stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<K>> {
        self.inner.read().items.get(key).cloned()
    }

    /// Returns true if an object is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().items.contains_key(key)
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    /// Returns true if the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    /// All stored keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().items.keys().cloned().collect()
    }

    /// The resource version of the last snapshot or applied event.
    #[must_use]
    pub fn resource_version(&self) -> String {
        self.inner.read().resource_version.clone()
    }

    /// Record the resource version the store is synced to.
    pub fn set_resource_version(&self, resource_version: impl Into<String>) {
        self.inner.write().resource_version = resource_version.into();
    }

    /// Visit every stored object.
    pub fn list_all(&self, mut visitor: impl FnMut(&Arc<K>)) {
        let snapshot: Vec<_> = self.inner.read().items.values().cloned().collect();
        snapshot.iter().for_each(&mut visitor);
    }

    /// Visit every object owned by `tenant`.
    pub fn list_by_tenant(&self, tenant: &Tenant, mut visitor: impl FnMut(&Arc<K>)) {
        let snapshot = {
            let inner = self.inner.read();
            inner
                .by_tenant
                .get(tenant)
                .map(|keys| inner.collect(keys))
                .unwrap_or_default()
        };
        snapshot.iter().for_each(&mut visitor);
    }

    /// Visit every object in `namespace`.
    ///
    /// A `Legacy` tenant scope visits the namespace across every tenant, the
    /// way cluster-wide reads behaved before tenants existed. A named tenant
    /// visits exactly its own partition.
    pub fn list_by_namespace(
        &self,
        tenant: &TenantScope,
        namespace: &str,
        mut visitor: impl FnMut(&Arc<K>),
    ) {
        let snapshot = {
            let inner = self.inner.read();
            match tenant {
                TenantScope::Legacy => inner.collect(
                    inner
                        .by_namespace
                        .iter()
                        .filter(|((_, ns), _)| ns == namespace)
                        .flat_map(|(_, keys)| keys),
                ),
                TenantScope::Tenanted(t) => inner
                    .by_namespace
                    .get(&(Tenant::Named(t.clone()), namespace.to_string()))
                    .map(|keys| inner.collect(keys))
                    .unwrap_or_default(),
            }
        };
        snapshot.iter().for_each(&mut visitor);
    }

    /// Collect every object inside `scope`.
    #[must_use]
    pub fn snapshot_matching(&self, scope: &Scope) -> Vec<Arc<K>> {
        let mut out = Vec::new();
        match (&scope.namespace, &scope.tenant) {
            (Some(ns), tenant) => self.list_by_namespace(tenant, ns, |o| out.push(Arc::clone(o))),
            (None, TenantScope::Legacy) => self.list_all(|o| out.push(Arc::clone(o))),
            (None, TenantScope::Tenanted(t)) => {
                self.list_by_tenant(&Tenant::Named(t.clone()), |o| out.push(Arc::clone(o)));
            }
        }
        out
    }

    /// Atomically replace the whole contents of the store.
    ///
    /// Returns the events that turn the previous contents into the new ones:
    /// deletions for keys that vanished, then additions and updates in key
    /// order. Keys whose resource version is unchanged produce no event. A key
    /// whose uid changed was deleted and created again upstream, and yields a
    /// deletion of the old object followed by an addition of the new one.
    /// Objects that cannot be indexed are skipped and logged.
    pub fn replace_all(
        &self,
        objs: impl IntoIterator<Item = K>,
        resource_version: impl Into<String>,
    ) -> Vec<StoreEvent<K>> {
        let mut next = Inner {
            items: BTreeMap::new(),
            by_tenant: BTreeMap::new(),
            by_namespace: BTreeMap::new(),
            resource_version: resource_version.into(),
        };
        for obj in objs {
            match Self::key_of(&obj) {
                Ok(key) => {
                    next.insert(key, Arc::new(obj));
                }
                Err(e) => warn!(error = %e, kind = obj.kind(), "skipping invalid object in snapshot"),
            }
        }

        let current = next.items.clone();
        let prev = std::mem::replace(&mut *self.inner.write(), next);

        let mut events = Vec::new();
        for (key, old) in &prev.items {
            if !current.contains_key(key) {
                events.push(StoreEvent::Deleted(Arc::clone(old)));
            }
        }
        for (key, new) in &current {
            match prev.items.get(key) {
                None => events.push(StoreEvent::Added(Arc::clone(new))),
                Some(old) if new.meta().is_recreation_of(old.meta()) => {
                    events.push(StoreEvent::Deleted(Arc::clone(old)));
                    events.push(StoreEvent::Added(Arc::clone(new)));
                }
                Some(old) if old.meta().resource_version != new.meta().resource_version => {
                    events.push(StoreEvent::Updated {
                        old: Arc::clone(old),
                        new: Arc::clone(new),
                    });
                }
                Some(_) => {}
            }
        }
        debug!(
            previous = prev.items.len(),
            current = current.len(),
            events = events.len(),
            "replaced store contents"
        );
        events
    }
}
