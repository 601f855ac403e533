//! Tenants and scopes.
//!
//! The control plane partitions its identity space by tenant. Two tenant
//! strings are reserved: [`SYSTEM_TENANT`] is the tenant of every object that
//! predates multi-tenancy, and [`ALL_TENANTS`] marks a subscription that spans
//! tenants. Both, together with the empty string, are folded into tagged
//! variants here so the rest of the code never compares sentinel strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::meta::ObjectMeta;

/// The legacy/default tenant.
pub const SYSTEM_TENANT: &str = "system";

/// The tenant marker for scopes spanning every tenant. Never stored on an object.
pub const ALL_TENANTS: &str = "all";

/// The tenant an object belongs to.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Tenant {
    /// The system tenant (`""` or `"system"` on the wire).
    #[default]
    Legacy,
    /// A named tenant.
    Named(String),
}

impl Tenant {
    /// Parse the tenant carried by an object.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTenant` for `"all"` or a tenant containing `/`.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" | SYSTEM_TENANT => Ok(Self::Legacy),
            ALL_TENANTS => Err(CoreError::InvalidTenant(s.to_string())),
            t if t.contains('/') => Err(CoreError::InvalidTenant(s.to_string())),
            t => Ok(Self::Named(t.to_string())),
        }
    }

    /// The wire form of the tenant; the legacy tenant renders as `"system"`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Legacy => SYSTEM_TENANT,
            Self::Named(t) => t,
        }
    }

    /// Returns true for the system tenant.
    #[must_use]
    pub const fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy)
    }

    /// Returns true if [`Tenant::parse`] would produce this value.
    ///
    /// `Named` is constructible directly, so `Named("")`, `Named("system")`,
    /// `Named("all")` and names containing `/` can exist in memory; none of
    /// them may reach the store.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Legacy => true,
            Self::Named(t) => matches!(Self::parse(t), Ok(Self::Named(_))),
        }
    }
}

impl fmt::Debug for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tenant({})", self.as_str())
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tenant {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Tenant {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Tenant> for String {
    fn from(tenant: Tenant) -> Self {
        match tenant {
            Tenant::Legacy => SYSTEM_TENANT.to_string(),
            Tenant::Named(t) => t,
        }
    }
}

/// The tenant half of a read or watch scope.
///
/// `Legacy` is what callers that predate multi-tenancy get: lists span every
/// tenant and single-object lookups use the tenant-less key form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TenantScope {
    /// Span every tenant; look objects up by their legacy key.
    #[default]
    Legacy,
    /// Exactly one named tenant.
    Tenanted(String),
}

impl TenantScope {
    /// Parse a scope tenant. `""`, `"system"` and `"all"` all map to `Legacy`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "" | SYSTEM_TENANT | ALL_TENANTS => Self::Legacy,
            t => Self::Tenanted(t.to_string()),
        }
    }

    /// Returns true if an object owned by `tenant` falls inside this scope.
    #[must_use]
    pub fn covers(&self, tenant: &Tenant) -> bool {
        match (self, tenant) {
            (Self::Legacy, _) => true,
            (Self::Tenanted(want), Tenant::Named(have)) => want == have,
            (Self::Tenanted(_), Tenant::Legacy) => false,
        }
    }

    /// The tenant string as used in logs and key formation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Legacy => ALL_TENANTS,
            Self::Tenanted(t) => t,
        }
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Tenant> for TenantScope {
    fn from(tenant: Tenant) -> Self {
        match tenant {
            Tenant::Legacy => Self::Legacy,
            Tenant::Named(t) => Self::Tenanted(t),
        }
    }
}

/// A `{tenant, namespace}` coordinate bounding a list or a watch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope {
    /// Tenant half of the scope.
    pub tenant: TenantScope,
    /// Namespace, or `None` for every namespace.
    pub namespace: Option<String>,
}

impl Scope {
    /// Parse a scope from wire strings; empty strings mean "any".
    #[must_use]
    pub fn new(tenant: &str, namespace: &str) -> Self {
        Self {
            tenant: TenantScope::parse(tenant),
            namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
        }
    }

    /// Every object of every tenant.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// One namespace across tenants.
    #[must_use]
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            tenant: TenantScope::Legacy,
            namespace: Some(namespace.into()),
        }
    }

    /// Every namespace of one tenant.
    #[must_use]
    pub fn tenant(tenant: &str) -> Self {
        Self {
            tenant: TenantScope::parse(tenant),
            namespace: None,
        }
    }

    /// One `(tenant, namespace)` partition.
    #[must_use]
    pub fn tenant_namespace(tenant: &str, namespace: impl Into<String>) -> Self {
        Self {
            tenant: TenantScope::parse(tenant),
            namespace: Some(namespace.into()),
        }
    }

    /// Returns true if the object identified by `meta` falls inside this scope.
    #[must_use]
    pub fn covers(&self, meta: &ObjectMeta) -> bool {
        self.tenant.covers(&meta.tenant)
            && self
                .namespace
                .as_deref()
                .map_or(true, |ns| ns == meta.namespace)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.tenant,
            self.namespace.as_deref().unwrap_or("*")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_sentinels_fold_to_legacy() {
        assert_eq!(Tenant::parse("").unwrap(), Tenant::Legacy);
        assert_eq!(Tenant::parse("system").unwrap(), Tenant::Legacy);
        assert_eq!(
            Tenant::parse("acme").unwrap(),
            Tenant::Named("acme".to_string())
        );
    }

    #[test]
    fn tenant_all_is_rejected_on_objects() {
        assert!(matches!(
            Tenant::parse("all"),
            Err(CoreError::InvalidTenant(_))
        ));
        assert!(Tenant::parse("a/b").is_err());
    }

    #[test]
    fn hand_built_reserved_tenants_are_not_well_formed() {
        assert!(Tenant::Legacy.is_well_formed());
        assert!(Tenant::Named("acme".to_string()).is_well_formed());
        for reserved in ["", "system", "all", "a/b"] {
            assert!(
                !Tenant::Named(reserved.to_string()).is_well_formed(),
                "{reserved:?}"
            );
        }
    }

    #[test]
    fn tenant_serde_json() {
        let parsed: Tenant = serde_json::from_str("\"\"").unwrap();
        assert_eq!(parsed, Tenant::Legacy);
        assert_eq!(serde_json::to_string(&Tenant::Legacy).unwrap(), "\"system\"");

        let acme = Tenant::Named("acme".to_string());
        let json = serde_json::to_string(&acme).unwrap();
        assert_eq!(serde_json::from_str::<Tenant>(&json).unwrap(), acme);

        assert!(serde_json::from_str::<Tenant>("\"all\"").is_err());
    }

    #[test]
    fn scope_tenant_sentinels() {
        assert_eq!(TenantScope::parse(""), TenantScope::Legacy);
        assert_eq!(TenantScope::parse("system"), TenantScope::Legacy);
        assert_eq!(TenantScope::parse("all"), TenantScope::Legacy);
        assert_eq!(
            TenantScope::parse("acme"),
            TenantScope::Tenanted("acme".to_string())
        );
    }

    #[test]
    fn scope_covers() {
        let legacy = ObjectMeta::new(Tenant::Legacy, "default", "a");
        let acme = ObjectMeta::new(Tenant::Named("acme".to_string()), "web", "b");

        assert!(Scope::all().covers(&legacy));
        assert!(Scope::all().covers(&acme));

        assert!(Scope::namespace("web").covers(&acme));
        assert!(!Scope::namespace("web").covers(&legacy));

        assert!(Scope::tenant("acme").covers(&acme));
        assert!(!Scope::tenant("acme").covers(&legacy));

        assert!(Scope::tenant_namespace("acme", "web").covers(&acme));
        assert!(!Scope::tenant_namespace("acme", "default").covers(&acme));
        assert!(!Scope::tenant_namespace("other", "web").covers(&acme));
    }

    #[test]
    fn scope_from_wire_strings() {
        let scope = Scope::new("all", "");
        assert_eq!(scope, Scope::all());

        let scope = Scope::new("acme", "web");
        assert_eq!(scope.to_string(), "acme/web");
    }
}
