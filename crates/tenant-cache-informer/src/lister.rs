//! Typed, tenant-aware read views over an informer's store.
//!
//! Listers never touch the upstream. Every read decodes the stored
//! [`DynamicObject`] into the lister's kind; an object of the wrong kind or
//! shape means the store was wired to the wrong source and surfaces as
//! [`InformerError::StoreCorruption`].
//!
//! Tenant handling follows the compatibility rules of the key codec: a lister
//! built without a tenant, or with `system` or `all`, lists across every
//! tenant and looks objects up by their legacy key. A lister built for a named
//! tenant sees only that tenant's partition.

use std::marker::PhantomData;
use std::sync::Arc;

use tenant_cache_core::kinds::{
    DaemonSet, DataPartitionConfig, Deployment, Mission, Network, ServiceAccount, StorageCluster,
};
use tenant_cache_core::{
    keys, DynamicObject, Object, Resource, ResourceScope, Selector, Tenant, TenantScope,
};
use tenant_cache_store::Store;

use crate::error::{InformerError, Result};

fn decode<T: Resource>(obj: &DynamicObject) -> Result<T> {
    T::from_dynamic(obj).map_err(|err| InformerError::StoreCorruption {
        kind: T::KIND,
        key: obj.meta().key().unwrap_or_else(|_| obj.meta().name.clone()),
        reason: err.to_string(),
    })
}

fn select<T: Resource>(objects: &[Arc<DynamicObject>], selector: &Selector) -> Result<Vec<T>> {
    objects
        .iter()
        .filter(|obj| selector.matches(&obj.meta().labels))
        .map(|obj| decode(obj))
        .collect()
}

fn fetch<T: Resource>(store: &Store<DynamicObject>, key: String) -> Result<T> {
    match store.get(&key) {
        Some(obj) => decode(&obj),
        None => Err(InformerError::NotFound { kind: T::KIND, key }),
    }
}

fn collect(store: &Store<DynamicObject>, tenant: &TenantScope) -> Vec<Arc<DynamicObject>> {
    let mut out = Vec::new();
    match tenant {
        TenantScope::Legacy => store.list_all(|o| out.push(Arc::clone(o))),
        TenantScope::Tenanted(t) => {
            store.list_by_tenant(&Tenant::Named(t.clone()), |o| out.push(Arc::clone(o)));
        }
    }
    out
}

/// Lister for a namespaced kind.
pub struct NamespacedLister<T> {
    store: Arc<Store<DynamicObject>>,
    tenant: TenantScope,
    _kind: PhantomData<fn() -> T>,
}

impl<T: Resource> NamespacedLister<T> {
    /// A lister spanning every tenant.
    #[must_use]
    pub fn new(store: Arc<Store<DynamicObject>>) -> Self {
        Self::with_tenant(store, "")
    }

    /// A lister restricted to `tenant`; `""`, `system` and `all` span every tenant.
    #[must_use]
    pub fn with_tenant(store: Arc<Store<DynamicObject>>, tenant: &str) -> Self {
        debug_assert_eq!(T::SCOPE, ResourceScope::Namespaced);
        Self {
            store,
            tenant: TenantScope::parse(tenant),
            _kind: PhantomData,
        }
    }

    /// The tenant scope this lister reads.
    #[must_use]
    pub fn tenant(&self) -> &TenantScope {
        &self.tenant
    }

    /// Every object in the lister's tenant scope matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns `InformerError::StoreCorruption` if a stored object does not decode.
    pub fn list(&self, selector: &Selector) -> Result<Vec<T>> {
        select(&collect(&self.store, &self.tenant), selector)
    }

    /// Objects in `namespace`, read the legacy way: listing spans every tenant
    /// and lookups use `namespace/name` keys.
    #[must_use]
    pub fn for_namespace(&self, namespace: &str) -> NamespaceLister<T> {
        self.for_tenant_and_namespace("", namespace)
    }

    /// Objects in `namespace` owned by `tenant`.
    #[must_use]
    pub fn for_tenant_and_namespace(&self, tenant: &str, namespace: &str) -> NamespaceLister<T> {
        NamespaceLister {
            store: Arc::clone(&self.store),
            tenant: TenantScope::parse(tenant),
            namespace: namespace.to_string(),
            _kind: PhantomData,
        }
    }

    /// The same store read as `tenant`.
    #[must_use]
    pub fn for_tenant(&self, tenant: &str) -> Self {
        Self::with_tenant(Arc::clone(&self.store), tenant)
    }
}

impl<T> Clone for NamespacedLister<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            tenant: self.tenant.clone(),
            _kind: PhantomData,
        }
    }
}

/// A namespaced lister narrowed to one `(tenant, namespace)`.
pub struct NamespaceLister<T> {
    store: Arc<Store<DynamicObject>>,
    tenant: TenantScope,
    namespace: String,
    _kind: PhantomData<fn() -> T>,
}

impl<T: Resource> NamespaceLister<T> {
    /// The namespace this view reads.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Every object in the namespace matching `selector`.
    ///
    /// A view built without a tenant, or with `system` or `all`, lists the
    /// namespace across every tenant, while its [`NamespaceLister::get`] only
    /// resolves legacy `namespace/name` keys. An object of a named tenant can
    /// therefore appear here and still miss on `get`; look it up through
    /// [`NamespacedLister::for_tenant_and_namespace`] with its own tenant.
    ///
    /// # Errors
    ///
    /// Returns `InformerError::StoreCorruption` if a stored object does not decode.
    pub fn list(&self, selector: &Selector) -> Result<Vec<T>> {
        let mut objects = Vec::new();
        self.store
            .list_by_namespace(&self.tenant, &self.namespace, |o| objects.push(Arc::clone(o)));
        select(&objects, selector)
    }

    /// The object called `name`, looked up by the key this view's tenant forms.
    /// Without a named tenant that is the legacy `namespace/name` key.
    ///
    /// # Errors
    ///
    /// Returns `InformerError::NotFound` on a miss, `InformerError::MalformedKey`
    /// if no key can be formed and `InformerError::StoreCorruption` if the
    /// stored object does not decode.
    pub fn get(&self, name: &str) -> Result<T> {
        let key = keys::scoped_key(&self.tenant, &self.namespace, name)?;
        fetch(&self.store, key)
    }
}

/// Lister for a cluster-scoped kind.
pub struct ClusterLister<T> {
    store: Arc<Store<DynamicObject>>,
    tenant: TenantScope,
    _kind: PhantomData<fn() -> T>,
}

impl<T: Resource> ClusterLister<T> {
    /// A lister spanning every tenant.
    #[must_use]
    pub fn new(store: Arc<Store<DynamicObject>>) -> Self {
        Self::with_tenant(store, "")
    }

    /// A lister restricted to `tenant`; `""`, `system` and `all` span every tenant.
    #[must_use]
    pub fn with_tenant(store: Arc<Store<DynamicObject>>, tenant: &str) -> Self {
        debug_assert_eq!(T::SCOPE, ResourceScope::Cluster);
        Self {
            store,
            tenant: TenantScope::parse(tenant),
            _kind: PhantomData,
        }
    }

    /// The tenant scope this lister reads.
    #[must_use]
    pub fn tenant(&self) -> &TenantScope {
        &self.tenant
    }

    /// Every object in the lister's tenant scope matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns `InformerError::StoreCorruption` if a stored object does not decode.
    pub fn list(&self, selector: &Selector) -> Result<Vec<T>> {
        select(&collect(&self.store, &self.tenant), selector)
    }

    /// The object called `name`.
    ///
    /// # Errors
    ///
    /// Returns `InformerError::NotFound` on a miss, `InformerError::MalformedKey`
    /// if no key can be formed and `InformerError::StoreCorruption` if the
    /// stored object does not decode.
    pub fn get(&self, name: &str) -> Result<T> {
        let key = keys::scoped_key(&self.tenant, "", name)?;
        fetch(&self.store, key)
    }

    /// The same store read as `tenant`.
    #[must_use]
    pub fn for_tenant(&self, tenant: &str) -> Self {
        Self::with_tenant(Arc::clone(&self.store), tenant)
    }
}

impl<T> Clone for ClusterLister<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            tenant: self.tenant.clone(),
            _kind: PhantomData,
        }
    }
}

/// A kind with a lister.
pub trait Listable: Resource {
    /// The lister serving this kind.
    type Lister;

    /// Build a lister over `store` reading as `tenant`.
    fn lister(store: Arc<Store<DynamicObject>>, tenant: &str) -> Self::Lister;
}

macro_rules! listable {
    ($($kind:ty => $lister:ident: $shape:ident;)*) => {
        $(
            #[doc = concat!("Lister for [`", stringify!($kind), "`] objects.")]
            pub type $lister = $shape<$kind>;

            impl Listable for $kind {
                type Lister = $lister;

                fn lister(store: Arc<Store<DynamicObject>>, tenant: &str) -> Self::Lister {
                    $shape::with_tenant(store, tenant)
                }
            }
        )*
    };
}

listable! {
    Mission => MissionLister: NamespacedLister;
    Deployment => DeploymentLister: NamespacedLister;
    DaemonSet => DaemonSetLister: NamespacedLister;
    ServiceAccount => ServiceAccountLister: NamespacedLister;
    Network => NetworkLister: ClusterLister;
    DataPartitionConfig => DataPartitionConfigLister: ClusterLister;
    StorageCluster => StorageClusterLister: ClusterLister;
}
