//! Reflectors, typed listers and shared informers for tenant-cache.
//!
//! An informer keeps an in-memory [`Store`](tenant_cache_store::Store) of one
//! kind in sync with an upstream [`EventSource`] and fans every change out to
//! subscribers. Listers are typed, tenant-aware read views over that store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         EventSource                           │
//! │                 (paginated LIST + WATCH stream)               │
//! └──────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Reflector                            │
//! │  Listing ─▶ Watching ─▶ Error ─▶ Backoff ─▶ Listing ...       │
//! └──────────────────────────────────────────────────────────────┘
//!                │ write first                  │ then notify
//!                ▼                              ▼
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │          Store           │   │   Subscriptions / handlers   │
//! │ (tenant + ns indices)    │   │   (bounded, resync on lag)   │
//! └──────────────────────────┘   └──────────────────────────────┘
//!                ▲
//!                │ typed reads
//! ┌──────────────────────────┐
//! │         Listers          │
//! └──────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tenant_cache_core::kinds::Mission;
//! use tenant_cache_core::{DynamicObject, Selector};
//! use tenant_cache_informer::{EventSource, InformerConfig, SharedInformerFactory};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(source: Arc<dyn EventSource<DynamicObject>>) -> Result<(), Box<dyn std::error::Error>> {
//! let factory = SharedInformerFactory::new(source, InformerConfig::from_env());
//! let missions = factory.lister::<Mission>();
//!
//! let cancel = CancellationToken::new();
//! factory.start(&cancel);
//! factory.wait_for_cache_sync().await;
//!
//! // Legacy reads: `system` and `all` see every tenant.
//! let everything = missions.list(&Selector::everything())?;
//! let web = missions.for_namespace("web").list(&Selector::parse("app=edge")?)?;
//!
//! // Tenant reads see one partition.
//! let acme = missions.for_tenant_and_namespace("acme", "web").get("m1")?;
//! # let _ = (everything, web, acme);
//!
//! cancel.cancel();
//! factory.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod backoff;
pub mod config;
pub mod error;
pub mod factory;
pub mod handler;
pub mod informer;
pub mod lister;
pub mod reflector;
pub mod source;
pub mod state;
pub mod subscription;

pub use backoff::Backoff;
pub use config::InformerConfig;
pub use error::{InformerError, Result};
pub use factory::SharedInformerFactory;
pub use handler::{FnHandler, ResourceEventHandler};
pub use informer::Informer;
pub use lister::{
    ClusterLister, DaemonSetLister, DataPartitionConfigLister, DeploymentLister, Listable,
    MissionLister, NamespaceLister, NamespacedLister, NetworkLister, ServiceAccountLister,
    StorageClusterLister,
};
pub use reflector::Reflector;
pub use source::{
    EventSource, ListOptions, ListPage, SourceError, WatchEvent, WatchStatus, WatchStream,
    WatchTarget,
};
pub use state::ReflectorState;
pub use subscription::{Notification, Subscription};
