//! Tenant-indexed in-memory object store for tenant-cache.
//!
//! The store is the source of truth for every read inside the process. It maps
//! the canonical key of an object (see [`tenant_cache_core::keys`]) to the
//! object and keeps two secondary indices:
//!
//! - `tenant -> keys`: backs tenant-partitioned lists
//! - `(tenant, namespace) -> keys`: backs namespace lists
//!
//! # Example
//!
//! ```
//! use tenant_cache_core::{DynamicObject, ObjectMeta, Tenant, TenantScope};
//! use tenant_cache_store::Store;
//!
//! let store = Store::new();
//! store
//!     .put(DynamicObject::new("Mission", ObjectMeta::new(Tenant::Legacy, "default", "m1")))
//!     .unwrap();
//!
//! assert!(store.get_by_key("default/m1").is_ok());
//!
//! let mut count = 0;
//! store.list_by_namespace(&TenantScope::Legacy, "default", |_| count += 1);
//! assert_eq!(count, 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod indexed;

pub use error::{Result, StoreError};
pub use indexed::{Store, StoreEvent};
