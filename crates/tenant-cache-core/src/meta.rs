//! Object metadata and the kind-tagged dynamic object.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::keys;
use crate::tenant::Tenant;

/// Identity and bookkeeping fields carried by every cached object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Owning tenant.
    #[serde(default)]
    pub tenant: Tenant,
    /// Namespace; empty for cluster-scoped objects.
    #[serde(default)]
    pub namespace: String,
    /// Object name. Never empty on a stored object.
    pub name: String,
    /// Server-assigned unique identifier.
    #[serde(default)]
    pub uid: String,
    /// Opaque version assigned by the event source.
    #[serde(default)]
    pub resource_version: String,
    /// Labels; the only input to label selectors.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Build metadata for a namespaced object with a fresh uid.
    #[must_use]
    pub fn new(tenant: Tenant, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tenant,
            namespace: namespace.into(),
            name: name.into(),
            uid: uuid::Uuid::new_v4().to_string(),
            creation_timestamp: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Build metadata for a cluster-scoped object with a fresh uid.
    #[must_use]
    pub fn cluster(tenant: Tenant, name: impl Into<String>) -> Self {
        Self::new(tenant, String::new(), name)
    }

    /// Set the resource version.
    #[must_use]
    pub fn with_resource_version(mut self, resource_version: impl Into<String>) -> Self {
        self.resource_version = resource_version.into();
        self
    }

    /// Set the uid.
    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    /// Add labels.
    #[must_use]
    pub fn with_labels<I, K, V>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Returns true if the object lives in a namespace.
    #[must_use]
    pub fn is_namespaced(&self) -> bool {
        !self.namespace.is_empty()
    }

    /// Check the fields a store needs to index the object.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidObject` if the name is empty, a segment
    /// contains `/`, or the tenant is a reserved value held as a named tenant.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CoreError::InvalidObject("metadata.name is empty".to_string()));
        }
        if !self.tenant.is_well_formed() {
            return Err(CoreError::InvalidObject(format!(
                "tenant {:?} is reserved or malformed",
                self.tenant.as_str()
            )));
        }
        if self.name.contains('/') || self.namespace.contains('/') {
            return Err(CoreError::InvalidObject(format!(
                "{}/{} contains a path separator",
                self.namespace, self.name
            )));
        }
        Ok(())
    }

    /// The canonical key of the object.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MalformedKey` if the identity cannot form a key.
    pub fn key(&self) -> Result<String> {
        keys::object_key(&self.tenant, &self.namespace, &self.name)
    }

    /// Returns true if `self` is a new incarnation of the object `earlier`
    /// described: same key, different uid. Objects without a uid never count
    /// as recreated.
    #[must_use]
    pub fn is_recreation_of(&self, earlier: &ObjectMeta) -> bool {
        !self.uid.is_empty() && !earlier.uid.is_empty() && self.uid != earlier.uid
    }

    /// The resource version as a number, when the source uses numeric versions.
    #[must_use]
    pub fn resource_version_number(&self) -> Option<u64> {
        self.resource_version.parse().ok()
    }
}

/// Anything the store can hold.
pub trait Object: Clone + Send + Sync + 'static {
    /// Identity and bookkeeping metadata.
    fn meta(&self) -> &ObjectMeta;

    /// The kind tag of the object.
    fn kind(&self) -> &str;
}

/// An object whose payload is kept as JSON, tagged with its kind.
///
/// This is what flows from the event source into the store. Typed views are
/// produced on read by [`crate::Resource::from_dynamic`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicObject {
    /// Kind tag carried by the event source.
    pub kind: String,
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Desired state.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub spec: serde_json::Value,
    /// Observed state.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub status: serde_json::Value,
}

impl DynamicObject {
    /// Create an object with an empty payload.
    #[must_use]
    pub fn new(kind: impl Into<String>, metadata: ObjectMeta) -> Self {
        Self {
            kind: kind.into(),
            metadata,
            spec: serde_json::Value::Null,
            status: serde_json::Value::Null,
        }
    }

    /// Set the spec payload.
    #[must_use]
    pub fn with_spec(mut self, spec: serde_json::Value) -> Self {
        self.spec = spec;
        self
    }

    /// Set the status payload.
    #[must_use]
    pub fn with_status(mut self, status: serde_json::Value) -> Self {
        self.status = status;
        self
    }
}

impl Object for DynamicObject {
    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn kind(&self) -> &str {
        &self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_name() {
        let meta = ObjectMeta::new(Tenant::Legacy, "default", "");
        assert!(matches!(meta.validate(), Err(CoreError::InvalidObject(_))));
    }

    #[test]
    fn validate_rejects_separator() {
        let meta = ObjectMeta::new(Tenant::Legacy, "default", "a/b");
        assert!(meta.validate().is_err());
    }

    #[test]
    fn validate_rejects_reserved_named_tenants() {
        for reserved in ["", "system", "all"] {
            let meta = ObjectMeta::new(Tenant::Named(reserved.to_string()), "web", "svc");
            assert!(
                matches!(meta.validate(), Err(CoreError::InvalidObject(_))),
                "{reserved:?}"
            );
        }
        let meta = ObjectMeta::new(Tenant::Named("acme".to_string()), "web", "svc");
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn recreation_needs_two_differing_uids() {
        let first = ObjectMeta::new(Tenant::Legacy, "web", "a").with_uid("uid-a");
        let same = first.clone().with_resource_version("9");
        let again = first.clone().with_uid("uid-b");
        let anonymous = first.clone().with_uid("");

        assert!(!same.is_recreation_of(&first));
        assert!(again.is_recreation_of(&first));
        assert!(!anonymous.is_recreation_of(&first));
        assert!(!first.is_recreation_of(&anonymous));
    }

    #[test]
    fn key_follows_tenant() {
        let meta = ObjectMeta::new(Tenant::Legacy, "default", "svc-a");
        assert_eq!(meta.key().unwrap(), "default/svc-a");

        let meta = ObjectMeta::cluster(Tenant::Named("acme".to_string()), "net-1");
        assert_eq!(meta.key().unwrap(), "acme/net-1");
    }

    #[test]
    fn meta_serde_json() {
        let json = r#"{"tenant":"","namespace":"default","name":"a","resourceVersion":"7","labels":{"app":"web"}}"#;
        let meta: ObjectMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.tenant, Tenant::Legacy);
        assert_eq!(meta.resource_version_number(), Some(7));
        assert_eq!(meta.labels.get("app").map(String::as_str), Some("web"));
    }

    #[test]
    fn dynamic_object_without_payload() {
        let obj = DynamicObject::new("Mission", ObjectMeta::new(Tenant::Legacy, "default", "m"));
        let json = serde_json::to_value(&obj).unwrap();
        assert!(json.get("spec").is_none());
        let back: DynamicObject = serde_json::from_value(json).unwrap();
        assert_eq!(back, obj);
    }
}
