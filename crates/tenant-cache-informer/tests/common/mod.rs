//! Shared fixtures for informer integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use tenant_cache_core::{DynamicObject, ObjectMeta, Tenant};
use tenant_cache_informer::{InformerConfig, Notification};

/// Upper bound on how long a test waits for the reflector.
pub const WAIT: Duration = Duration::from_secs(5);

/// Fast retries so failure paths finish quickly.
pub fn fast_config() -> InformerConfig {
    InformerConfig {
        initial_backoff_ms: 1,
        max_backoff_ms: 10,
        ..InformerConfig::default()
    }
}

/// A namespaced `Mission` as the store holds it.
pub fn mission(tenant: &str, ns: &str, name: &str, rv: &str) -> DynamicObject {
    DynamicObject::new(
        "Mission",
        ObjectMeta::new(Tenant::parse(tenant).unwrap(), ns, name)
            .with_uid(format!("uid-{tenant}-{ns}-{name}"))
            .with_resource_version(rv),
    )
}

/// A cluster-scoped `Network` as the store holds it.
pub fn network(tenant: &str, name: &str, rv: &str) -> DynamicObject {
    DynamicObject::new(
        "Network",
        ObjectMeta::cluster(Tenant::parse(tenant).unwrap(), name)
            .with_uid(format!("uid-{tenant}-{name}"))
            .with_resource_version(rv),
    )
}

/// The same identity under a different uid, as after a delete and re-create upstream.
pub fn with_uid(mut obj: DynamicObject, uid: &str) -> DynamicObject {
    obj.metadata.uid = uid.to_string();
    obj
}

/// Poll `cond` until it holds, panicking after [`WAIT`].
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {what}");
}

/// Await `fut`, panicking after [`WAIT`].
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(WAIT, fut).await.expect("timed out")
}

/// Render a notification as `"<verb> <name>@<rv>"`.
pub fn describe(n: &Notification<DynamicObject>) -> String {
    let id = |o: &DynamicObject| format!("{}@{}", o.metadata.name, o.metadata.resource_version);
    match n {
        Notification::Added(o) => format!("added {}", id(o)),
        Notification::Updated { new, .. } => format!("updated {}", id(new)),
        Notification::Deleted(o) => format!("deleted {}", id(o)),
        Notification::Resync(objs) => format!("resync {}", objs.len()),
    }
}

/// Install a test subscriber so `tracing` output shows up with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tenant_cache=debug")
        .with_test_writer()
        .try_init();
}
