//! [`EventSource`] backed by a Kubernetes API server.
//!
//! Objects are read through the dynamic API, so any kind can be cached once
//! its API resource is registered. The owning tenant is taken from an
//! annotation; objects without it belong to the legacy tenant. The API server
//! cannot filter on annotations, so tenant scoping happens client-side while
//! namespace scoping is pushed to the server.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::{future, StreamExt};
use kube::api::{Api, ListParams, WatchParams};
use kube::core::{ApiResource, GroupVersionKind, WatchEvent as KubeWatchEvent};
use kube::Client;
use tenant_cache_core::{DynamicObject, ObjectMeta, Resource, ResourceScope, Scope, Tenant};
use tenant_cache_informer::{
    EventSource, ListOptions, ListPage, SourceError, WatchEvent, WatchStatus, WatchStream,
    WatchTarget,
};
use tracing::{debug, warn};

use crate::config::KubeSourceConfig;
use crate::error::{KubeSourceError, Result};

/// How a kind is reached on the API server.
#[derive(Debug, Clone)]
pub struct KindRegistration {
    /// Group, version and plural of the kind.
    pub resource: ApiResource,
    /// Whether the kind is namespaced.
    pub scope: ResourceScope,
}

/// Lists and watches registered kinds through `kube`.
pub struct KubeEventSource {
    client: Client,
    config: KubeSourceConfig,
    kinds: HashMap<String, KindRegistration>,
}

impl KubeEventSource {
    /// Create a source using in-cluster config or the local kubeconfig.
    ///
    /// # Errors
    ///
    /// Returns an error if the Kubernetes client cannot be created.
    pub async fn try_default(config: KubeSourceConfig) -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::with_client(client, config))
    }

    /// Create a source with a pre-configured client.
    #[must_use]
    pub fn with_client(client: Client, config: KubeSourceConfig) -> Self {
        Self {
            client,
            config,
            kinds: HashMap::new(),
        }
    }

    /// Get a reference to the source config.
    #[must_use]
    pub fn config(&self) -> &KubeSourceConfig {
        &self.config
    }

    /// Register the API resource serving `kind`.
    #[must_use]
    pub fn register(
        mut self,
        kind: &str,
        group: &str,
        version: &str,
        plural: &str,
        scope: ResourceScope,
    ) -> Self {
        let gvk = GroupVersionKind::gvk(group, version, kind);
        self.kinds.insert(
            kind.to_string(),
            KindRegistration {
                resource: ApiResource::from_gvk_with_plural(&gvk, plural),
                scope,
            },
        );
        self
    }

    /// Register a typed kind under its own kind tag and scope.
    #[must_use]
    pub fn register_resource<T: Resource>(self, group: &str, version: &str, plural: &str) -> Self {
        self.register(T::KIND, group, version, plural, T::SCOPE)
    }

    /// Register every kind shipped with `tenant-cache-core`.
    #[must_use]
    pub fn with_builtin_kinds(self) -> Self {
        use tenant_cache_core::kinds::{
            DaemonSet, DataPartitionConfig, Deployment, Mission, Network, ServiceAccount,
            StorageCluster,
        };

        self.register_resource::<Mission>("edge.multitenancy.io", "v1", "missions")
            .register_resource::<Network>("multitenancy.io", "v1", "networks")
            .register_resource::<DataPartitionConfig>("multitenancy.io", "v1", "datapartitionconfigs")
            .register_resource::<StorageCluster>("multitenancy.io", "v1", "storageclusters")
            .register_resource::<Deployment>("apps", "v1", "deployments")
            .register_resource::<DaemonSet>("apps", "v1", "daemonsets")
            .register_resource::<ServiceAccount>("", "v1", "serviceaccounts")
    }

    /// Kinds this source can serve.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    fn api(&self, target: &WatchTarget) -> Result<Api<kube::core::DynamicObject>> {
        let registration = self
            .kinds
            .get(&target.kind)
            .ok_or_else(|| KubeSourceError::UnknownKind(target.kind.clone()))?;

        Ok(match (&registration.scope, &target.scope.namespace) {
            (ResourceScope::Namespaced, Some(ns)) => {
                Api::namespaced_with(self.client.clone(), ns, &registration.resource)
            }
            _ => Api::all_with(self.client.clone(), &registration.resource),
        })
    }
}

/// Convert an API server object into the cache representation.
///
/// # Errors
///
/// Returns `KubeSourceError::Conversion` if the object has no usable name or
/// names a reserved tenant.
pub fn convert(
    kind: &str,
    tenant_annotation: &str,
    obj: kube::core::DynamicObject,
) -> Result<DynamicObject> {
    let meta = obj.metadata;
    let name = meta.name.unwrap_or_default();
    let conversion = |reason: String| KubeSourceError::Conversion {
        kind: kind.to_string(),
        name: name.clone(),
        reason,
    };

    let annotations = meta.annotations.unwrap_or_default();
    let tenant = match annotations.get(tenant_annotation) {
        Some(t) => Tenant::parse(t).map_err(|e| conversion(e.to_string()))?,
        None => Tenant::Legacy,
    };

    let metadata = ObjectMeta {
        tenant,
        namespace: meta.namespace.unwrap_or_default(),
        name: name.clone(),
        uid: meta.uid.unwrap_or_default(),
        resource_version: meta.resource_version.unwrap_or_default(),
        labels: meta.labels.unwrap_or_default(),
        annotations,
        creation_timestamp: meta.creation_timestamp.map(|t| t.0),
    };
    metadata.validate().map_err(|e| conversion(e.to_string()))?;

    let mut data = obj.data;
    let mut take = |field: &str| {
        data.get_mut(field)
            .map(serde_json::Value::take)
            .unwrap_or_default()
    };
    let spec = take("spec");
    let status = take("status");

    Ok(DynamicObject {
        kind: kind.to_string(),
        metadata,
        spec,
        status,
    })
}

/// Convert one raw watch event, dropping objects outside `scope`.
fn translate(
    kind: &str,
    scope: &Scope,
    tenant_annotation: &str,
    event: kube::Result<KubeWatchEvent<kube::core::DynamicObject>>,
) -> Option<std::result::Result<WatchEvent<DynamicObject>, SourceError>> {
    let event = match event {
        Ok(event) => event,
        Err(e) => return Some(Err(KubeSourceError::from(e).into())),
    };

    let (obj, wrap): (_, fn(DynamicObject) -> WatchEvent<DynamicObject>) = match event {
        KubeWatchEvent::Added(obj) => (obj, WatchEvent::Added),
        KubeWatchEvent::Modified(obj) => (obj, WatchEvent::Modified),
        KubeWatchEvent::Deleted(obj) => (obj, WatchEvent::Deleted),
        KubeWatchEvent::Bookmark(bookmark) => {
            return Some(Ok(WatchEvent::Bookmark {
                resource_version: bookmark.metadata.resource_version,
            }));
        }
        KubeWatchEvent::Error(response) => {
            return Some(Ok(WatchEvent::Error(WatchStatus {
                code: response.code,
                reason: response.reason,
                message: response.message,
            })));
        }
    };

    match convert(kind, tenant_annotation, obj) {
        Ok(obj) if scope.covers(&obj.metadata) => Some(Ok(wrap(obj))),
        Ok(obj) => {
            debug!(kind, name = %obj.metadata.name, tenant = %obj.metadata.tenant, "event outside scope");
            None
        }
        Err(e) => {
            warn!(error = %e, "dropping unconvertible watch event");
            None
        }
    }
}

#[async_trait]
impl EventSource<DynamicObject> for KubeEventSource {
    async fn list(
        &self,
        target: &WatchTarget,
        options: &ListOptions,
    ) -> std::result::Result<ListPage<DynamicObject>, SourceError> {
        let api = self.api(target)?;
        let mut params = ListParams::default();
        if let Some(limit) = options.limit {
            params = params.limit(limit);
        }
        if let Some(token) = &options.continue_token {
            params = params.continue_token(token);
        }

        let list = api.list(&params).await.map_err(KubeSourceError::from)?;
        let total = list.items.len();
        let items: Vec<_> = list
            .items
            .into_iter()
            .filter_map(|obj| match convert(&target.kind, &self.config.tenant_annotation, obj) {
                Ok(obj) => Some(obj).filter(|o| target.scope.covers(&o.metadata)),
                Err(e) => {
                    warn!(error = %e, "dropping unconvertible object");
                    None
                }
            })
            .collect();
        debug!(
            watch_target = %target,
            received = total,
            kept = items.len(),
            "listed page"
        );

        Ok(ListPage {
            items,
            resource_version: list.metadata.resource_version.unwrap_or_default(),
            continue_token: list.metadata.continue_.filter(|t| !t.is_empty()),
        })
    }

    async fn watch(
        &self,
        target: &WatchTarget,
        resource_version: &str,
    ) -> std::result::Result<WatchStream<DynamicObject>, SourceError> {
        let api = self.api(target)?;
        let params = WatchParams::default().timeout(self.config.watch_timeout_seconds);
        let stream = api
            .watch(&params, resource_version)
            .await
            .map_err(KubeSourceError::from)?;

        let kind = target.kind.clone();
        let scope = target.scope.clone();
        let annotation = self.config.tenant_annotation.clone();
        Ok(stream
            .filter_map(move |event| future::ready(translate(&kind, &scope, &annotation, event)))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ANNOTATION: &str = "multitenancy.io/tenant";

    fn raw(value: serde_json::Value) -> kube::core::DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    fn mission(tenant: Option<&str>, name: &str) -> kube::core::DynamicObject {
        let mut annotations = serde_json::Map::new();
        if let Some(t) = tenant {
            annotations.insert(ANNOTATION.to_string(), json!(t));
        }
        raw(json!({
            "apiVersion": "edge.multitenancy.io/v1",
            "kind": "Mission",
            "metadata": {
                "name": name,
                "namespace": "web",
                "uid": "uid-1",
                "resourceVersion": "7",
                "labels": {"app": "edge"},
                "annotations": annotations,
            },
            "spec": {"content": "payload"},
            "status": {"delivered": 3},
        }))
    }

    #[test]
    fn convert_reads_tenant_annotation() {
        let obj = convert("Mission", ANNOTATION, mission(Some("acme"), "m1")).unwrap();
        assert_eq!(obj.kind, "Mission");
        assert_eq!(obj.metadata.tenant.as_str(), "acme");
        assert_eq!(obj.metadata.key().unwrap(), "acme/web/m1");
        assert_eq!(obj.metadata.resource_version, "7");
        assert_eq!(obj.metadata.labels.get("app").map(String::as_str), Some("edge"));
        assert_eq!(obj.spec, json!({"content": "payload"}));
        assert_eq!(obj.status, json!({"delivered": 3}));
    }

    #[test]
    fn missing_annotation_is_legacy() {
        let obj = convert("Mission", ANNOTATION, mission(None, "m1")).unwrap();
        assert!(obj.metadata.tenant.is_legacy());
        assert_eq!(obj.metadata.key().unwrap(), "web/m1");
    }

    #[test]
    fn converted_objects_decode_as_typed_kinds() {
        use tenant_cache_core::kinds::Mission;

        let obj = convert("Mission", ANNOTATION, mission(Some("acme"), "m1")).unwrap();
        let typed = Mission::from_dynamic(&obj).unwrap();
        assert_eq!(typed.spec.content, "payload");
    }

    #[test]
    fn reserved_tenant_and_missing_name_are_rejected() {
        assert!(matches!(
            convert("Mission", ANNOTATION, mission(Some("all"), "m1")),
            Err(KubeSourceError::Conversion { .. })
        ));
        let nameless = raw(json!({"apiVersion": "v1", "kind": "ServiceAccount", "metadata": {}}));
        assert!(convert("ServiceAccount", ANNOTATION, nameless).is_err());
    }

    #[test]
    fn translate_filters_by_scope() {
        let added = || Ok(KubeWatchEvent::Added(mission(Some("acme"), "m1")));
        let kept = translate("Mission", &Scope::tenant("acme"), ANNOTATION, added());
        assert!(matches!(kept, Some(Ok(WatchEvent::Added(_)))));

        let dropped = translate("Mission", &Scope::tenant("beta"), ANNOTATION, added());
        assert!(dropped.is_none());
    }

    #[test]
    fn translate_passes_bookmarks_and_errors() {
        let bookmark: KubeWatchEvent<kube::core::DynamicObject> = serde_json::from_value(json!({
            "type": "BOOKMARK",
            "object": {
                "apiVersion": "edge.multitenancy.io/v1",
                "kind": "Mission",
                "metadata": {"resourceVersion": "12"},
            },
        }))
        .unwrap();
        assert!(matches!(
            translate("Mission", &Scope::all(), ANNOTATION, Ok(bookmark)),
            Some(Ok(WatchEvent::Bookmark { resource_version })) if resource_version == "12"
        ));

        let error: KubeWatchEvent<kube::core::DynamicObject> = serde_json::from_value(json!({
            "type": "ERROR",
            "object": {
                "status": "Failure",
                "message": "too old resource version",
                "reason": "Expired",
                "code": 410,
            },
        }))
        .unwrap();
        let Some(Ok(WatchEvent::Error(status))) =
            translate("Mission", &Scope::all(), ANNOTATION, Ok(error))
        else {
            panic!("expected an in-band error");
        };
        assert!(SourceError::from(status).is_gone());
    }
}
