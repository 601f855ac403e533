//! Core types for tenant-cache.
//!
//! This crate provides the identity model shared by every layer of the cache:
//!
//! - **Tenants and scopes**: the tenant dimension layered on top of
//!   `(namespace, name)`, modelled as tagged variants instead of sentinel strings
//! - **Key codec**: the canonical lookup key for an object and its decomposition
//! - **Objects**: metadata, the kind-tagged [`DynamicObject`] and typed [`Resource`] kinds
//! - **Label selectors**: parsing and matching of label predicates
//!
//! # Example
//!
//! ```
//! use tenant_cache_core::{keys, ObjectMeta, Scope, Tenant};
//!
//! let legacy = ObjectMeta::new(Tenant::Legacy, "default", "svc-a");
//! assert_eq!(legacy.key().unwrap(), "default/svc-a");
//!
//! let acme = ObjectMeta::new(Tenant::parse("acme").unwrap(), "web", "svc-a");
//! assert_eq!(acme.key().unwrap(), "acme/web/svc-a");
//!
//! // The string-level contract used by other subsystems.
//! assert_eq!(keys::key("all", "web", "svc-a").unwrap(), "web/svc-a");
//!
//! assert!(Scope::namespace("web").covers(&acme));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod kinds;
pub mod meta;
pub mod resource;
pub mod selector;
pub mod tenant;

pub use error::{CoreError, Result};
pub use keys::KeyParts;
pub use meta::{DynamicObject, Object, ObjectMeta};
pub use resource::{Resource, ResourceScope};
pub use selector::{Requirement, Selector, SelectorError};
pub use tenant::{Scope, Tenant, TenantScope, ALL_TENANTS, SYSTEM_TENANT};
