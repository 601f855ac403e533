//! Key codec.
//!
//! Every object is stored under one canonical string key derived from its
//! `(tenant, namespace, name)` identity:
//!
//! | tenant                     | cluster-scoped | namespaced               |
//! |----------------------------|----------------|--------------------------|
//! | `""`, `"system"`, `"all"`  | `name`         | `namespace/name`         |
//! | anything else              | `tenant/name`  | `tenant/namespace/name`  |
//!
//! Callers that predate multi-tenancy keep identifying objects by `name` and
//! `namespace/name`. Admission, schedulers and tests must form keys with these
//! functions so they agree with the store.

use crate::error::{CoreError, Result};
use crate::resource::ResourceScope;
use crate::tenant::{Tenant, TenantScope, ALL_TENANTS, SYSTEM_TENANT};

/// Separator between key segments.
pub const SEPARATOR: char = '/';

/// The identity recovered from a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParts {
    /// Owning tenant; `Legacy` for keys without a tenant segment.
    pub tenant: Tenant,
    /// Namespace for namespaced kinds.
    pub namespace: Option<String>,
    /// Object name.
    pub name: String,
}

/// Form a key from wire strings. An empty `namespace` selects the cluster-scoped form.
///
/// # Errors
///
/// Returns `CoreError::MalformedKey` if `name` is empty or a segment contains `/`.
pub fn key(tenant: &str, namespace: &str, name: &str) -> Result<String> {
    let tenant = match tenant {
        "" | SYSTEM_TENANT | ALL_TENANTS => None,
        t => Some(t),
    };
    join(tenant, namespace, name)
}

/// Form the key of an object owned by `tenant`.
///
/// # Errors
///
/// Returns `CoreError::MalformedKey` if `name` is empty, a segment contains
/// `/`, or `tenant` is a reserved value held as a named tenant.
pub fn object_key(tenant: &Tenant, namespace: &str, name: &str) -> Result<String> {
    match tenant {
        Tenant::Legacy => join(None, namespace, name),
        Tenant::Named(t) if !tenant.is_well_formed() => Err(CoreError::malformed(
            format!("{t}/{namespace}/{name}"),
            "reserved tenant",
        )),
        Tenant::Named(t) => join(Some(t), namespace, name),
    }
}

/// Form the lookup key for a read issued under `scope`.
///
/// A `Legacy` scope reads through the tenant-less key form, which is how
/// callers constructed with `system` or `all` keep finding legacy objects.
///
/// # Errors
///
/// Returns `CoreError::MalformedKey` if `name` is empty or a segment contains `/`.
pub fn scoped_key(scope: &TenantScope, namespace: &str, name: &str) -> Result<String> {
    match scope {
        TenantScope::Legacy => join(None, namespace, name),
        TenantScope::Tenanted(t) => join(Some(t), namespace, name),
    }
}

/// Split a key back into its identity.
///
/// The arity of a key depends on whether the kind is namespaced, so the caller
/// must say which.
///
/// # Errors
///
/// Returns `CoreError::MalformedKey` on empty segments or the wrong number of segments.
pub fn decompose(key: &str, scope: ResourceScope) -> Result<KeyParts> {
    let segments: Vec<&str> = key.split(SEPARATOR).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(CoreError::malformed(key, "empty segment"));
    }

    let (tenant, namespace, name) = match (scope, segments.as_slice()) {
        (ResourceScope::Cluster, [name]) => (None, None, *name),
        (ResourceScope::Cluster, [tenant, name]) => (Some(*tenant), None, *name),
        (ResourceScope::Namespaced, [namespace, name]) => (None, Some(*namespace), *name),
        (ResourceScope::Namespaced, [tenant, namespace, name]) => {
            (Some(*tenant), Some(*namespace), *name)
        }
        _ => return Err(CoreError::malformed(key, "wrong number of segments")),
    };

    let tenant = match tenant {
        None => Tenant::Legacy,
        Some(t) => Tenant::parse(t).map_err(|_| CoreError::malformed(key, "reserved tenant"))?,
    };

    Ok(KeyParts {
        tenant,
        namespace: namespace.map(str::to_string),
        name: name.to_string(),
    })
}

fn join(tenant: Option<&str>, namespace: &str, name: &str) -> Result<String> {
    let describe = || format!("{}/{namespace}/{name}", tenant.unwrap_or(""));

    if name.is_empty() {
        return Err(CoreError::malformed(describe(), "empty name"));
    }
    let segments = [tenant.unwrap_or(""), namespace, name];
    if segments.iter().any(|s| s.contains(SEPARATOR)) {
        return Err(CoreError::malformed(describe(), "segment contains '/'"));
    }

    let mut key = String::with_capacity(
        tenant.map_or(0, |t| t.len() + 1) + namespace.len() + 1 + name.len(),
    );
    if let Some(t) = tenant {
        key.push_str(t);
        key.push(SEPARATOR);
    }
    if !namespace.is_empty() {
        key.push_str(namespace);
        key.push(SEPARATOR);
    }
    key.push_str(name);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_keys() {
        assert_eq!(key("", "", "node-1").unwrap(), "node-1");
        assert_eq!(key("system", "", "node-1").unwrap(), "node-1");
        assert_eq!(key("all", "", "node-1").unwrap(), "node-1");
        assert_eq!(key("", "default", "svc-a").unwrap(), "default/svc-a");
        assert_eq!(key("system", "default", "svc-a").unwrap(), "default/svc-a");
        assert_eq!(key("all", "default", "svc-a").unwrap(), "default/svc-a");
    }

    #[test]
    fn tenanted_keys() {
        assert_eq!(key("acme", "", "net-1").unwrap(), "acme/net-1");
        assert_eq!(key("acme", "web", "svc-a").unwrap(), "acme/web/svc-a");
    }

    #[test]
    fn typed_and_string_forms_agree() {
        let acme = Tenant::Named("acme".to_string());
        assert_eq!(
            object_key(&acme, "web", "svc-a").unwrap(),
            key("acme", "web", "svc-a").unwrap()
        );
        assert_eq!(
            object_key(&Tenant::Legacy, "web", "svc-a").unwrap(),
            key("system", "web", "svc-a").unwrap()
        );
        assert_eq!(
            scoped_key(&TenantScope::parse("all"), "web", "svc-a").unwrap(),
            "web/svc-a"
        );
    }

    #[test]
    fn key_rejects_bad_segments() {
        assert!(matches!(
            key("acme", "web", ""),
            Err(CoreError::MalformedKey { .. })
        ));
        assert!(key("acme", "we/b", "svc").is_err());
        assert!(key("ac/me", "web", "svc").is_err());
    }

    #[test]
    fn object_key_rejects_hand_built_reserved_tenants() {
        for reserved in ["", "system", "all"] {
            assert!(
                matches!(
                    object_key(&Tenant::Named(reserved.to_string()), "web", "svc"),
                    Err(CoreError::MalformedKey { .. })
                ),
                "{reserved:?}"
            );
        }
    }

    #[test]
    fn decompose_round_trip() {
        let cases = [
            ("", "web", "svc-a", Tenant::Legacy),
            ("system", "web", "svc-a", Tenant::Legacy),
            ("acme", "web", "svc-a", Tenant::Named("acme".to_string())),
        ];
        for (tenant, ns, name, expected) in cases {
            let k = key(tenant, ns, name).unwrap();
            let parts = decompose(&k, ResourceScope::Namespaced).unwrap();
            assert_eq!(parts.tenant, expected);
            assert_eq!(parts.namespace.as_deref(), Some(ns));
            assert_eq!(parts.name, name);
        }

        let parts = decompose("acme/net-1", ResourceScope::Cluster).unwrap();
        assert_eq!(parts.tenant, Tenant::Named("acme".to_string()));
        assert_eq!(parts.namespace, None);
        assert_eq!(parts.name, "net-1");
    }

    #[test]
    fn decompose_rejects_malformed() {
        assert!(decompose("", ResourceScope::Cluster).is_err());
        assert!(decompose("a//b", ResourceScope::Namespaced).is_err());
        assert!(decompose("name", ResourceScope::Namespaced).is_err());
        assert!(decompose("a/b/c", ResourceScope::Cluster).is_err());
        assert!(decompose("a/b/c/d", ResourceScope::Namespaced).is_err());
        assert!(decompose("all/web/svc", ResourceScope::Namespaced).is_err());
    }
}
