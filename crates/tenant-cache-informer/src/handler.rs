//! Callback-style consumption of a subscription.

use std::collections::HashMap;
use std::sync::Arc;

use tenant_cache_core::Object;
use tracing::debug;

use crate::subscription::{Notification, Subscription};

/// Receives changes for the objects an informer holds.
///
/// Callbacks run on a dedicated task per handler, one at a time and in the
/// order the reflector observed the changes.
pub trait ResourceEventHandler<K>: Send + 'static {
    /// An object appeared.
    fn on_add(&mut self, obj: &Arc<K>);

    /// An object changed.
    fn on_update(&mut self, old: &Arc<K>, new: &Arc<K>);

    /// An object went away.
    fn on_delete(&mut self, obj: &Arc<K>);
}

/// A handler assembled from three closures.
pub struct FnHandler<A, U, D> {
    on_add: A,
    on_update: U,
    on_delete: D,
}

impl<A, U, D> FnHandler<A, U, D> {
    /// Create a handler from add, update and delete callbacks.
    pub const fn new(on_add: A, on_update: U, on_delete: D) -> Self {
        Self {
            on_add,
            on_update,
            on_delete,
        }
    }
}

impl<K, A, U, D> ResourceEventHandler<K> for FnHandler<A, U, D>
where
    A: FnMut(&Arc<K>) + Send + 'static,
    U: FnMut(&Arc<K>, &Arc<K>) + Send + 'static,
    D: FnMut(&Arc<K>) + Send + 'static,
{
    fn on_add(&mut self, obj: &Arc<K>) {
        (self.on_add)(obj);
    }

    fn on_update(&mut self, old: &Arc<K>, new: &Arc<K>) {
        (self.on_update)(old, new);
    }

    fn on_delete(&mut self, obj: &Arc<K>) {
        (self.on_delete)(obj);
    }
}

/// Drive `handler` from `subscription` until the informer stops.
///
/// The dispatcher remembers what it has shown the handler, so a resync is
/// turned back into the individual deletes, adds and updates that bring the
/// handler in line with the snapshot.
pub(crate) async fn run<K, H>(mut subscription: Subscription<K>, mut handler: H)
where
    K: Object,
    H: ResourceEventHandler<K>,
{
    let mut known: HashMap<String, Arc<K>> = HashMap::new();

    while let Some(notification) = subscription.recv().await {
        match notification {
            Notification::Added(obj) | Notification::Updated { new: obj, .. } => {
                apply(&mut known, &mut handler, obj);
            }
            Notification::Deleted(obj) => {
                let Ok(key) = obj.meta().key() else { continue };
                if known.remove(&key).is_some() {
                    handler.on_delete(&obj);
                }
            }
            Notification::Resync(objects) => reconcile(&mut known, &mut handler, objects),
        }
    }

    debug!(scope = %subscription.scope(), "handler dispatcher finished");
}

fn apply<K: Object, H: ResourceEventHandler<K>>(
    known: &mut HashMap<String, Arc<K>>,
    handler: &mut H,
    obj: Arc<K>,
) {
    let Ok(key) = obj.meta().key() else { return };
    match known.insert(key, Arc::clone(&obj)) {
        Some(old) if obj.meta().is_recreation_of(old.meta()) => {
            handler.on_delete(&old);
            handler.on_add(&obj);
        }
        Some(old) if old.meta().resource_version == obj.meta().resource_version => {}
        Some(old) => handler.on_update(&old, &obj),
        None => handler.on_add(&obj),
    }
}

fn reconcile<K: Object, H: ResourceEventHandler<K>>(
    known: &mut HashMap<String, Arc<K>>,
    handler: &mut H,
    objects: Vec<Arc<K>>,
) {
    let incoming: HashMap<String, Arc<K>> = objects
        .into_iter()
        .filter_map(|obj| obj.meta().key().ok().map(|key| (key, obj)))
        .collect();

    let vanished: Vec<String> = known
        .keys()
        .filter(|key| !incoming.contains_key(*key))
        .cloned()
        .collect();
    for key in vanished {
        if let Some(obj) = known.remove(&key) {
            handler.on_delete(&obj);
        }
    }

    for obj in incoming.into_values() {
        apply(known, handler, obj);
    }
}
