use super::ObjectRef;
use crate::watcher;
use parking_lot::RwLock;
use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
    sync::Arc,
};
use strela_core::Resource;

type Cache<K> = Arc<RwLock<HashMap<ObjectRef, Arc<K>>>>;

/// A change to the cache that handlers get to see
#[derive(Debug, Clone, PartialEq)]
pub enum Notification<K> {
    /// A key appeared
    Added(Arc<K>),
    /// A key changed from `old` to `new`
    Updated {
        /// The previously cached state
        old: Arc<K>,
        /// The state now in the cache
        new: Arc<K>,
    },
    /// A key disappeared; this is its last known state
    Deleted(Arc<K>),
}

impl<K: Resource> Notification<K> {
    /// The key the notification is about
    pub fn key(&self) -> ObjectRef {
        match self {
            Self::Added(obj) | Self::Updated { new: obj, .. } | Self::Deleted(obj) => ObjectRef::from_obj(obj.as_ref()),
        }
    }
}

/// A writable Store handle
///
/// This is exclusive since it's not safe to share a single `Store` between multiple writers.
/// In particular, `Restarted` events will clobber the state of other writers.
#[derive(Debug)]
pub struct Writer<K> {
    store: Cache<K>,
}

impl<K> Default for Writer<K> {
    fn default() -> Self {
        Self {
            store: Arc::default(),
        }
    }
}

impl<K> Writer<K>
where
    K: Resource + PartialEq + Debug,
{
    /// Return a read handle to the store
    ///
    /// Multiple read handles may be obtained, by either calling `as_reader` multiple times,
    /// or by calling `Store::clone()` afterwards.
    #[must_use]
    pub fn as_reader(&self) -> Store<K> {
        Store {
            store: self.store.clone(),
        }
    }

    /// Applies a single watcher event to the store
    ///
    /// Returns the notifications the event amounts to, in the order they happened.
    pub fn apply_watcher_event(&mut self, event: watcher::Event<K>) -> Vec<Notification<K>> {
        match event {
            watcher::Event::Applied(obj) => self.upsert(obj).into_iter().collect(),
            watcher::Event::Deleted(obj) => self.remove(obj).into_iter().collect(),
            watcher::Event::Restarted(objs) => self.reconcile(objs),
        }
    }

    /// Insert or replace one object
    ///
    /// Replacing an object with an identical one is not a change.
    fn upsert(&mut self, obj: K) -> Option<Notification<K>> {
        let key = ObjectRef::from_obj(&obj);
        let new = Arc::new(obj);
        let old = self.store.write().insert(key, new.clone());
        match old {
            None => Some(Notification::Added(new)),
            Some(old) if old == new => None,
            Some(old) => Some(Notification::Updated { old, new }),
        }
    }

    /// Drop one object; deleting an unknown key is not a change
    fn remove(&mut self, obj: K) -> Option<Notification<K>> {
        let key = ObjectRef::from_obj(&obj);
        if self.store.write().remove(&key).is_none() {
            tracing::debug!(%key, "delete of an object that was never cached");
            return None;
        }
        Some(Notification::Deleted(Arc::new(obj)))
    }

    /// Replace the whole cache with a fresh list
    ///
    /// Keys missing from the list are deleted first, in key order; then every listed
    /// object is upserted in list order.
    fn reconcile(&mut self, objs: Vec<K>) -> Vec<Notification<K>> {
        let listed = objs.iter().map(ObjectRef::from_obj).collect::<HashSet<_>>();
        let mut gone = {
            let mut store = self.store.write();
            let gone_keys = store
                .keys()
                .filter(|key| !listed.contains(*key))
                .cloned()
                .collect::<Vec<_>>();
            gone_keys
                .into_iter()
                .filter_map(|key| store.remove(&key).map(|obj| (key, obj)))
                .collect::<Vec<_>>()
        };
        gone.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut notifications = gone
            .into_iter()
            .map(|(_, obj)| Notification::Deleted(obj))
            .collect::<Vec<_>>();
        notifications.extend(objs.into_iter().filter_map(|obj| self.upsert(obj)));
        notifications
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.store.write().clear();
    }
}

/// A readable cache of objects of kind `K`
///
/// Cloning will produce a new reference to the same backing store.
///
/// Cannot be constructed directly since one writer handle is required,
/// use `Writer::as_reader()` instead.
#[derive(Debug)]
pub struct Store<K> {
    store: Cache<K>,
}

impl<K> Clone for Store<K> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<K> Store<K> {
    /// Retrieve the entry referred to by `key`, if it is in the cache.
    ///
    /// `key.namespace` is ignored for cluster-scoped resources.
    ///
    /// Note that this is a cache and may be stale. Deleted objects may still exist in the cache
    /// despite having been deleted in the cluster, and new objects may not yet exist in the cache.
    #[must_use]
    pub fn get(&self, key: &ObjectRef) -> Option<Arc<K>> {
        let store = self.store.read();
        store
            .get(key)
            // Try to erase the namespace and try again, in case the object is cluster-scoped
            .or_else(|| key.namespace.as_ref().and_then(|_| store.get(&key.cluster_scoped())))
            .cloned()
    }

    /// Return a full snapshot of the current values
    #[must_use]
    pub fn state(&self) -> Vec<Arc<K>> {
        self.store.read().values().cloned().collect()
    }

    /// The number of cached objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    /// Whether the cache holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }
}

/// Create a (Reader, Writer) for a `Store<K>` for a typed resource `K`
///
/// The `Writer` should be fed by a [`watcher`](crate::watcher::watcher) or driven by an
/// [`Informer`](crate::Informer), while the [`Store`] reader can be cloned freely.
#[must_use]
pub fn store<K>() -> (Store<K>, Writer<K>)
where
    K: Resource + PartialEq + Debug,
{
    let w = Writer::default();
    let r = w.as_reader();
    (r, w)
}
