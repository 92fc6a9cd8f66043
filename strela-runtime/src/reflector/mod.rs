//! Caches objects in memory

mod object_ref;
pub mod store;

pub use self::object_ref::ObjectRef;
use crate::watcher;
use futures::{Stream, StreamExt};
use std::fmt::Debug;
pub use store::{store, Notification, Store, Writer};
use strela_core::Resource;

/// Cache objects from a [`watcher()`](watcher::watcher) stream into a local [`Store`]
///
/// Observes the raw `Stream` of [`watcher::Event`] objects, and modifies the cache.
/// It passes the raw stream through unmodified; the notifications each event amounts
/// to are dropped. Use an [`Informer`](crate::Informer) to have them dispatched.
///
/// ```no_run
/// use futures::TryStreamExt;
/// use k8s_openapi::api::core::v1::Pod;
/// use strela_client::{Api, Client};
/// use strela_runtime::{reflector, watcher};
/// # async fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// # let client: Client = todo!();
/// let pods: Api<Pod> = Api::namespaced(client, "games");
/// let (reader, writer) = reflector::store();
/// let rf = reflector::reflector(writer, watcher::watcher(pods, watcher::Config::default()));
/// // poll the stream to keep the store up to date
/// let _ = rf.try_for_each(|_| async { Ok(()) }).await;
/// # Ok(())
/// # }
/// ```
pub fn reflector<K, W>(mut writer: Writer<K>, stream: W) -> impl Stream<Item = W::Item>
where
    K: Resource + Clone + PartialEq + Debug,
    W: Stream<Item = watcher::Result<watcher::Event<K>>>,
{
    stream.map(move |event| {
        if let Ok(ev) = &event {
            writer.apply_watcher_event(ev.clone());
        }
        event
    })
}
