//! Kubernetes event source for tenant-cache informers.
//!
//! [`KubeEventSource`] implements the informer's
//! [`EventSource`](tenant_cache_informer::EventSource) contract on top of the
//! `kube` dynamic API: paginated LISTs, WATCH streams with bookmarks, and
//! `410 Gone` surfaced as an expired resource version so reflectors relist.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tenant_cache_core::kinds::Mission;
//! use tenant_cache_informer::{InformerConfig, SharedInformerFactory};
//! use tenant_cache_kube::{KubeEventSource, KubeSourceConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = KubeEventSource::try_default(KubeSourceConfig::from_env())
//!     .await?
//!     .with_builtin_kinds();
//! let factory = SharedInformerFactory::new(Arc::new(source), InformerConfig::from_env());
//! let missions = factory.tenant_lister::<Mission>("acme");
//!
//! let cancel = CancellationToken::new();
//! factory.start(&cancel);
//! factory.wait_for_cache_sync().await;
//! let m1 = missions.for_tenant_and_namespace("acme", "web").get("m1")?;
//! # let _ = m1;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod source;

pub use config::KubeSourceConfig;
pub use error::{KubeSourceError, Result};
pub use source::{convert, KindRegistration, KubeEventSource};
