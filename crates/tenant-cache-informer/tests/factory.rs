//! Shared informer factory wiring.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::{fast_config, mission, network, within};
use futures::StreamExt;
use tenant_cache_core::kinds::{Mission, Network};
use tenant_cache_core::{DynamicObject, Object, Scope, Selector};
use tenant_cache_informer::{
    EventSource, FnHandler, ListOptions, ListPage, ReflectorState, SharedInformerFactory,
    SourceError, WatchStream, WatchTarget,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Serves a fixed set of objects per kind and never reports changes.
struct FixedSource {
    objects: Vec<DynamicObject>,
    lists: AtomicUsize,
}

impl FixedSource {
    fn new(objects: Vec<DynamicObject>) -> Arc<Self> {
        Arc::new(Self {
            objects,
            lists: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EventSource<DynamicObject> for FixedSource {
    async fn list(
        &self,
        target: &WatchTarget,
        _options: &ListOptions,
    ) -> Result<ListPage<DynamicObject>, SourceError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let items = self
            .objects
            .iter()
            .filter(|o| o.kind() == target.kind && target.scope.covers(o.meta()))
            .cloned()
            .collect();
        Ok(ListPage::complete(items, "1"))
    }

    async fn watch(
        &self,
        _target: &WatchTarget,
        _resource_version: &str,
    ) -> Result<WatchStream<DynamicObject>, SourceError> {
        Ok(futures::stream::pending().boxed())
    }
}

fn fixture() -> Arc<FixedSource> {
    FixedSource::new(vec![
        mission("", "default", "svc-a", "1"),
        mission("acme", "web", "svc-a", "1"),
        mission("beta", "web", "svc-b", "1"),
        network("", "shared", "1"),
        network("acme", "vpc-1", "1"),
    ])
}

#[tokio::test]
async fn informers_are_shared_per_kind_and_scope() {
    let factory = SharedInformerFactory::new(fixture(), fast_config());

    let a = factory.informer::<Mission>();
    let b = factory.informer_for("Mission", Scope::all());
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &factory.tenant_informer::<Mission>("system")));

    let acme = factory.tenant_informer::<Mission>("acme");
    assert!(!Arc::ptr_eq(&a, &acme));
    factory.informer::<Network>();
    assert_eq!(factory.informer_count(), 3);
    assert!(factory.has_informer("Mission", &Scope::tenant("acme")));
    assert!(!a.is_started());
}

#[tokio::test]
async fn start_launches_existing_and_later_informers() {
    let source = fixture();
    let factory = SharedInformerFactory::new(Arc::clone(&source) as _, fast_config());
    let missions = factory.lister::<Mission>();

    let cancel = CancellationToken::new();
    factory.start(&cancel);
    factory.start(&cancel);

    let networks = factory.lister::<Network>();
    assert!(factory.informer::<Network>().is_started());

    let synced = within(factory.wait_for_cache_sync()).await;
    assert_eq!(synced.len(), 2);
    assert!(synced.values().all(|ok| *ok));
    assert_eq!(source.lists.load(Ordering::SeqCst), 2);

    assert_eq!(missions.list(&Selector::everything()).unwrap().len(), 3);
    assert_eq!(networks.list(&Selector::everything()).unwrap().len(), 2);
    assert!(missions.for_namespace("default").get("svc-a").is_ok());
    assert!(missions.for_namespace("web").get("svc-a").unwrap_err().is_not_found());

    within(factory.shutdown()).await;
    assert_eq!(factory.informer::<Mission>().state(), ReflectorState::Stopped);
}

#[tokio::test]
async fn tenant_listers_are_backed_by_tenant_informers() {
    let factory = SharedInformerFactory::new(fixture(), fast_config());
    let acme = factory.tenant_lister::<Mission>("acme");
    let acme_networks = factory.tenant_lister::<Network>("acme");

    let cancel = CancellationToken::new();
    factory.start(&cancel);
    within(factory.wait_for_cache_sync()).await;

    let informer = factory.tenant_informer::<Mission>("acme");
    assert_eq!(informer.store().len(), 1);

    let all = acme.list(&Selector::everything()).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].metadata.tenant.as_str(), "acme");
    assert!(acme.for_tenant_and_namespace("acme", "web").get("svc-a").is_ok());
    assert_eq!(acme_networks.get("vpc-1").unwrap().metadata.name, "vpc-1");

    within(factory.shutdown()).await;
}

#[tokio::test]
async fn handlers_see_existing_objects() {
    let factory = SharedInformerFactory::new(fixture(), fast_config());
    let informer = factory.informer::<Network>();
    let cancel = CancellationToken::new();
    factory.start(&cancel);
    assert!(within(informer.wait_for_sync()).await);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handler = FnHandler::new(
        move |obj: &Arc<DynamicObject>| {
            let _ = tx.send(obj.metadata.name.clone());
        },
        |_: &Arc<DynamicObject>, _: &Arc<DynamicObject>| {},
        |_: &Arc<DynamicObject>| {},
    );
    let task = informer.add_handler(handler);

    let mut names = vec![within(rx.recv()).await.unwrap(), within(rx.recv()).await.unwrap()];
    names.sort();
    assert_eq!(names, ["shared", "vpc-1"]);
    assert_eq!(informer.subscriber_count(), 1);

    within(factory.shutdown()).await;
    within(task).await.unwrap();
}
