//! Typed resource kinds.
//!
//! The store holds kind-tagged [`DynamicObject`]s. A [`Resource`] is a typed
//! view of one kind, produced on read. The kind tag is checked on every
//! conversion, so a store wired to the wrong lister is detected instead of
//! silently decoding garbage.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::meta::{DynamicObject, Object};

/// Whether objects of a kind live inside namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceScope {
    /// Objects are keyed by `[tenant/]namespace/name`.
    Namespaced,
    /// Objects are keyed by `[tenant/]name`.
    Cluster,
}

/// A typed kind with `metadata`, `spec` and `status` fields.
pub trait Resource: Object + Serialize + DeserializeOwned {
    /// The kind tag this type decodes.
    const KIND: &'static str;

    /// Whether the kind is namespaced.
    const SCOPE: ResourceScope;

    /// Decode a dynamic object of this kind.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::KindMismatch` if the kind tag differs and
    /// `CoreError::Decode` if the payload does not fit the type.
    fn from_dynamic(obj: &DynamicObject) -> Result<Self> {
        if obj.kind != Self::KIND {
            return Err(CoreError::KindMismatch {
                expected: Self::KIND,
                found: obj.kind.clone(),
            });
        }

        let decode = |source| CoreError::Decode {
            kind: Self::KIND,
            source,
        };

        let mut map = serde_json::Map::new();
        map.insert(
            "metadata".to_string(),
            serde_json::to_value(&obj.metadata).map_err(decode)?,
        );
        if !obj.spec.is_null() {
            map.insert("spec".to_string(), obj.spec.clone());
        }
        if !obj.status.is_null() {
            map.insert("status".to_string(), obj.status.clone());
        }
        serde_json::from_value(serde_json::Value::Object(map)).map_err(decode)
    }

    /// Encode this object as a dynamic object tagged with [`Resource::KIND`].
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Decode` if the type does not serialize to a JSON object.
    fn to_dynamic(&self) -> Result<DynamicObject> {
        let decode = |source| CoreError::Decode {
            kind: Self::KIND,
            source,
        };

        let value = serde_json::to_value(self).map_err(decode)?;
        let serde_json::Value::Object(mut map) = value else {
            return Err(decode(serde::ser::Error::custom("expected a JSON object")));
        };
        let spec = map.remove("spec").unwrap_or_default();
        let status = map.remove("status").unwrap_or_default();

        Ok(DynamicObject {
            kind: Self::KIND.to_string(),
            metadata: self.meta().clone(),
            spec,
            status,
        })
    }
}
