//! Store invariants exercised from several threads.

use std::sync::Arc;
use std::thread;

use tenant_cache_core::{keys, DynamicObject, ObjectMeta, Scope, Tenant, TenantScope};
use tenant_cache_store::Store;

fn mission(tenant: &str, ns: &str, name: &str, rv: u64) -> DynamicObject {
    DynamicObject::new(
        "Mission",
        ObjectMeta::new(Tenant::parse(tenant).unwrap(), ns, name).with_resource_version(rv.to_string()),
    )
}

#[test]
fn concurrent_writers_leave_consistent_indices() {
    let store = Arc::new(Store::new());

    let writers: Vec<_> = (0..2u64)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..500u64 {
                    store.put(mission("acme", "web", "contested", w * 1000 + i)).unwrap();
                }
                w * 1000 + 499
            })
        })
        .collect();
    let last_versions: Vec<u64> = writers.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(store.len(), 1);
    let stored = store.get_by_key("acme/web/contested").unwrap();
    let rv = stored.metadata.resource_version_number().unwrap();
    assert!(last_versions.contains(&rv), "final state is one writer's last write");

    let mut by_tenant = Vec::new();
    store.list_by_tenant(&Tenant::Named("acme".to_string()), |o| by_tenant.push(Arc::clone(o)));
    let mut by_namespace = Vec::new();
    store.list_by_namespace(&TenantScope::parse("acme"), "web", |o| {
        by_namespace.push(Arc::clone(o));
    });
    assert_eq!(by_tenant.len(), 1);
    assert_eq!(by_namespace.len(), 1);
    assert!(Arc::ptr_eq(&by_tenant[0], &stored));
    assert!(Arc::ptr_eq(&by_namespace[0], &stored));
}

#[test]
fn readers_never_see_torn_lists() {
    let store = Arc::new(Store::new());
    for i in 0..50 {
        store.put(mission("", "batch", &format!("job-{i}"), 1)).unwrap();
    }

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for round in 2..200u64 {
                let snapshot = (0..50).map(|i| mission("", "batch", &format!("job-{i}"), round));
                store.replace_all(snapshot, round.to_string());
            }
        })
    };

    for _ in 0..200 {
        let objs = store.snapshot_matching(&Scope::namespace("batch"));
        assert_eq!(objs.len(), 50);
        let versions: std::collections::BTreeSet<_> = objs
            .iter()
            .map(|o| o.metadata.resource_version.clone())
            .collect();
        assert_eq!(versions.len(), 1, "a list reflects a single snapshot");
    }
    writer.join().unwrap();
}

#[test]
fn get_by_key_agrees_with_key_codec() {
    let store = Store::new();
    let cases = [("", "default", "svc-a"), ("system", "kube", "dns"), ("acme", "web", "svc-a")];
    for (tenant, ns, name) in cases {
        store.put(mission(tenant, ns, name, 1)).unwrap();
    }
    for (tenant, ns, name) in cases {
        let key = keys::key(tenant, ns, name).unwrap();
        let obj = store.get_by_key(&key).unwrap();
        assert_eq!(obj.metadata.name, name);
        assert_eq!(obj.metadata.namespace, ns);
    }
}

#[test]
fn namespace_counts_follow_compat_rules() {
    let store = Store::new();
    let objects = [
        ("", "web", "a"),
        ("system", "web", "b"),
        ("acme", "web", "c"),
        ("acme", "db", "d"),
        ("globex", "web", "e"),
    ];
    for (tenant, ns, name) in objects {
        store.put(mission(tenant, ns, name, 1)).unwrap();
    }

    let scopes = [
        Scope::namespace("web"),
        Scope::tenant_namespace("all", "web"),
        Scope::tenant_namespace("acme", "web"),
        Scope::tenant_namespace("globex", "db"),
    ];
    for scope in scopes {
        let expected = objects
            .iter()
            .filter(|(t, ns, name)| scope.covers(&ObjectMeta::new(Tenant::parse(t).unwrap(), *ns, *name)))
            .count();
        let mut count = 0;
        store.list_by_namespace(&scope.tenant, scope.namespace.as_deref().unwrap_or_default(), |_| {
            count += 1;
        });
        assert_eq!(count, expected, "scope {scope}");
    }
}
