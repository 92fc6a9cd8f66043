//! Watches a resource collection for changes, with error recovery
//!
//! See [`watcher`] for the primary entry point.

use futures::{stream::BoxStream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use strela_client::{api::ListParams, Api, ResourceExt};
use strela_core::{ErrorResponse, Resource, WatchEvent};
use thiserror::Error;

/// Failures of a single watcher step
///
/// None of these are fatal: the next step recovers by retrying or relisting.
#[derive(Debug, Error)]
pub enum Error {
    /// The initial list or a relist failed
    #[error("failed to perform initial object list: {0}")]
    InitialListFailed(#[source] strela_client::Error),
    /// The watch request was refused
    #[error("failed to start watching object: {0}")]
    WatchStartFailed(#[source] strela_client::Error),
    /// The server sent an error event on the watch stream
    #[error("error returned by apiserver during watch: {0}")]
    WatchError(#[source] ErrorResponse),
    /// Reading or decoding the watch stream failed
    #[error("watch stream failed: {0}")]
    WatchFailed(#[source] strela_client::Error),
}

/// Convient alias for `Result<T, Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Watch events returned from the [`watcher`]
#[derive(Debug, Clone)]
pub enum Event<K> {
    /// An object was added or modified
    Applied(K),
    /// An object was deleted; this is its final state
    Deleted(K),
    /// A full list replaced everything seen before
    ///
    /// Objects previously applied but missing here were deleted while nobody watched.
    Restarted(Vec<K>),
}

/// Where in the list/watch cycle a watcher is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The next step performs the first list
    Listing,
    /// The next step watches, or resumes a watch
    Watching,
    /// The next step lists again after the watch could not be resumed
    Relisting,
}

/// The query options of a [`watcher`]
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// A selector to restrict the list of returned objects by their labels
    pub label_selector: Option<String>,
    /// A selector to restrict the list of returned objects by their fields
    pub field_selector: Option<String>,
    /// Server side timeout of each watch request, below 295 seconds
    pub timeout: Option<u32>,
    /// Ask the server for bookmark events
    pub bookmarks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            label_selector: None,
            field_selector: None,
            timeout: None,
            bookmarks: true,
        }
    }
}

impl Config {
    /// Restrict results by label selector
    #[must_use]
    pub fn labels(mut self, label_selector: &str) -> Self {
        self.label_selector = Some(label_selector.to_string());
        self
    }

    /// Restrict results by field selector
    #[must_use]
    pub fn fields(mut self, field_selector: &str) -> Self {
        self.field_selector = Some(field_selector.to_string());
        self
    }

    /// Set the server side timeout of each watch request
    #[must_use]
    pub fn timeout(mut self, timeout_secs: u32) -> Self {
        self.timeout = Some(timeout_secs);
        self
    }

    /// Do not ask for bookmark events
    #[must_use]
    pub fn disable_bookmarks(mut self) -> Self {
        self.bookmarks = false;
        self
    }

    fn to_list_params(&self) -> ListParams {
        ListParams {
            label_selector: self.label_selector.clone(),
            field_selector: self.field_selector.clone(),
            timeout: self.timeout,
            bookmarks: self.bookmarks,
            ..ListParams::default()
        }
    }
}

/// The internal finite state machine driving the [`Watcher`]
enum State<K> {
    /// Nothing listed yet
    Empty,
    /// The previous watch could not be resumed, list everything again
    Relist,
    /// A version is known, open a watch from it
    InitListed { resource_version: String },
    /// A watch is in progress
    Watching {
        resource_version: String,
        stream: BoxStream<'static, strela_client::Result<WatchEvent<K>>>,
    },
}

impl<K> Debug for State<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Relist => f.write_str("Relist"),
            Self::InitListed { resource_version } => f
                .debug_struct("InitListed")
                .field("resource_version", resource_version)
                .finish(),
            Self::Watching { resource_version, .. } => f
                .debug_struct("Watching")
                .field("resource_version", resource_version)
                .finish_non_exhaustive(),
        }
    }
}

/// A list/watch cycle over one resource collection
///
/// Each call to [`step`](Watcher::step) advances the cycle until it has an event or an
/// error to report. Errors leave the watcher in a state the next step recovers from,
/// so callers only decide how long to wait before stepping again.
pub struct Watcher<K: Resource> {
    api: Api<K>,
    list_params: ListParams,
    state: State<K>,
}

impl<K> Watcher<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
{
    /// Start from an empty cycle; the first step lists
    pub fn new(api: Api<K>, config: &Config) -> Self {
        Self {
            api,
            list_params: config.to_list_params(),
            state: State::Empty,
        }
    }

    /// What the next [`step`](Watcher::step) will do
    pub fn phase(&self) -> Phase {
        match self.state {
            State::Empty => Phase::Listing,
            State::Relist => Phase::Relisting,
            State::InitListed { .. } | State::Watching { .. } => Phase::Watching,
        }
    }

    /// The resource version a new watch would resume from
    pub fn resource_version(&self) -> Option<&str> {
        match &self.state {
            State::InitListed { resource_version } | State::Watching { resource_version, .. } => {
                Some(resource_version)
            }
            State::Empty | State::Relist => None,
        }
    }

    /// Advance until there is an event or an error to report
    ///
    /// Dropping the returned future abandons the cycle; the watcher lists from
    /// scratch on the next step.
    pub async fn step(&mut self) -> Result<Event<K>> {
        let mut state = std::mem::replace(&mut self.state, State::Empty);
        loop {
            match step_trampolined(&self.api, &self.list_params, state).await {
                (Some(result), new_state) => {
                    self.state = new_state;
                    return result;
                }
                (None, new_state) => state = new_state,
            }
        }
    }
}

/// Progresses the watcher a single step, returning (event, state)
///
/// This function should be trampolined: if event == `None`
/// then the function should be called again until it returns a Some.
async fn step_trampolined<K>(
    api: &Api<K>,
    list_params: &ListParams,
    state: State<K>,
) -> (Option<Result<Event<K>>>, State<K>)
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
{
    match state {
        State::Empty => list(api, list_params, false).await,
        State::Relist => list(api, list_params, true).await,
        State::InitListed { resource_version } => match api.watch(list_params, &resource_version).await {
            Ok(stream) => {
                tracing::debug!(%resource_version, "watch started");
                (None, State::Watching {
                    resource_version,
                    stream: stream.boxed(),
                })
            }
            Err(err) => {
                tracing::warn!(%resource_version, "watch start failed: {}", err);
                (Some(Err(Error::WatchStartFailed(err))), State::Relist)
            }
        },
        State::Watching {
            resource_version,
            mut stream,
        } => match stream.next().await {
            Some(Ok(WatchEvent::Added(obj) | WatchEvent::Modified(obj))) => {
                let resource_version = obj.resource_version().unwrap_or(resource_version);
                (Some(Ok(Event::Applied(obj))), State::Watching {
                    resource_version,
                    stream,
                })
            }
            Some(Ok(WatchEvent::Deleted(obj))) => {
                let resource_version = obj.resource_version().unwrap_or(resource_version);
                (Some(Ok(Event::Deleted(obj))), State::Watching {
                    resource_version,
                    stream,
                })
            }
            Some(Ok(WatchEvent::Bookmark(bm))) => (None, State::Watching {
                resource_version: bm.metadata.resource_version,
                stream,
            }),
            Some(Ok(WatchEvent::Error(err))) if err.is_malformed_object() => {
                tracing::warn!(%resource_version, "skipping undecodable object: {}", err.message);
                (None, State::Watching {
                    resource_version,
                    stream,
                })
            }
            Some(Ok(WatchEvent::Error(err))) => {
                if err.is_expired() {
                    tracing::debug!(%resource_version, "watch window expired, relisting");
                } else {
                    tracing::warn!(%resource_version, "watch error event: {}", err);
                }
                (Some(Err(Error::WatchError(err))), State::Relist)
            }
            Some(Err(err)) => {
                tracing::warn!(%resource_version, "watch stream failed: {}", err);
                (Some(Err(Error::WatchFailed(err))), State::Relist)
            }
            None => {
                tracing::debug!(%resource_version, "watch closed by server, resuming");
                (None, State::InitListed { resource_version })
            }
        },
    }
}

async fn list<K>(api: &Api<K>, list_params: &ListParams, relist: bool) -> (Option<Result<Event<K>>>, State<K>)
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
{
    match api.list(list_params).await {
        Ok(list) => {
            // `Api::list` rejects lists without a version
            let resource_version = list.resource_version().unwrap_or_default().to_string();
            tracing::debug!(%resource_version, relist, items = list.items.len(), "listed");
            (
                Some(Ok(Event::Restarted(list.items))),
                State::InitListed { resource_version },
            )
        }
        Err(err) => {
            tracing::warn!(relist, "list failed: {}", err);
            let state = if relist { State::Relist } else { State::Empty };
            (Some(Err(Error::InitialListFailed(err))), state)
        }
    }
}

/// Watches a resource collection for changes continuously
///
/// Compared to [`Api::watch`], this automatically recovers the stream upon errors:
/// errors are yielded, after which the next poll resumes or relists.
/// Apply your own backoff by not polling the stream for a while after errors;
/// the [`Informer`](crate::Informer) does exactly that.
///
/// ```no_run
/// use strela_client::{Api, Client};
/// use strela_runtime::watcher::{watcher, Config, Event};
/// use k8s_openapi::api::core::v1::Pod;
/// use futures::{StreamExt, TryStreamExt};
/// # async fn wrapper() -> Result<(), strela_runtime::watcher::Error> {
/// # let client: Client = todo!();
/// let pods: Api<Pod> = Api::namespaced(client, "games");
/// let mut events = watcher(pods, Config::default()).boxed();
/// while let Some(event) = events.try_next().await? {
///     if let Event::Applied(pod) = event {
///         println!("applied {:?}", pod.metadata.name);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn watcher<K>(api: Api<K>, config: Config) -> impl Stream<Item = Result<Event<K>>> + Send
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    futures::stream::unfold(Watcher::new(api, &config), |mut watcher| async move {
        let event = watcher.step().await;
        Some((event, watcher))
    })
}

#[cfg(test)]
mod tests {
    use super::{watcher, Config, Error, Event, Phase, Watcher};
    use crate::test_utils::{cm, list_body, mock_api, watch_line};
    use futures::StreamExt;
    use k8s_openapi::api::core::v1::ConfigMap;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn lists_then_streams_and_resumes_after_close() {
        let (api, mut server) = mock_api::<ConfigMap>("games");
        let mut watcher = Watcher::new(api, &Config::default());
        assert_eq!(watcher.phase(), Phase::Listing);

        let scenario = tokio::spawn(async move {
            server.expect_list(list_body("10", &[cm("games", "a", "9")])).await;
            let feed = server.expect_watch("10").await;
            feed.send(watch_line("ADDED", cm("games", "b", "11")));
            feed.send(json!({ "type": "BOOKMARK", "object": { "metadata": { "resourceVersion": "15" } } }));
            feed.send(watch_line("DELETED", cm("games", "a", "16")));
            feed.close();
            // EOF resumes from the last seen version without relisting
            let feed = server.expect_watch("16").await;
            (server, feed)
        });

        match watcher.step().await.unwrap() {
            Event::Restarted(objs) => assert_eq!(objs.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(watcher.phase(), Phase::Watching);
        assert_eq!(watcher.resource_version(), Some("10"));
        assert!(matches!(watcher.step().await.unwrap(), Event::Applied(o) if o.metadata.name.as_deref() == Some("b")));
        assert!(matches!(watcher.step().await.unwrap(), Event::Deleted(_)));
        assert_eq!(watcher.resource_version(), Some("16"));
        // the resumed watch stays open
        assert!(timeout(Duration::from_millis(200), watcher.step()).await.is_err());
        let (_server, _feed) = scenario.await.unwrap();
    }

    #[tokio::test]
    async fn expired_watch_relists() {
        let (api, mut server) = mock_api::<ConfigMap>("games");
        let scenario = tokio::spawn(async move {
            server.expect_list(list_body::<ConfigMap>("10", &[])).await;
            let feed = server.expect_watch("10").await;
            feed.send(json!({
                "type": "ERROR",
                "object": { "status": "Failure", "message": "too old resource version", "reason": "Expired", "code": 410 }
            }));
            server.expect_list(list_body("40", &[cm("games", "a", "39")])).await;
            (server, feed)
        });

        let mut watcher = Watcher::new(api, &Config::default());
        assert!(matches!(watcher.step().await, Ok(Event::Restarted(_))));
        match watcher.step().await {
            Err(Error::WatchError(e)) => assert!(e.is_expired()),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(watcher.phase(), Phase::Relisting);
        match watcher.step().await.unwrap() {
            Event::Restarted(objs) => assert_eq!(objs.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(watcher.resource_version(), Some("40"));
        let (_server, _feed) = scenario.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_objects_are_skipped_but_broken_envelopes_relist() {
        let (api, mut server) = mock_api::<ConfigMap>("games");
        let scenario = tokio::spawn(async move {
            server.expect_list(list_body::<ConfigMap>("10", &[])).await;
            let feed = server.expect_watch("10").await;
            feed.send(json!({ "type": "MODIFIED", "object": { "metadata": { "name": "x" }, "data": 12 } }));
            feed.send(watch_line("MODIFIED", cm("games", "y", "12")));
            feed.send_raw("{\"type\": [}\n");
            (server, feed)
        });

        let mut events = watcher(api, Config::default()).boxed();
        assert!(matches!(events.next().await, Some(Ok(Event::Restarted(_)))));
        assert!(matches!(events.next().await, Some(Ok(Event::Applied(o))) if o.metadata.name.as_deref() == Some("y")));
        assert!(matches!(events.next().await, Some(Err(Error::WatchFailed(_)))));
        let (_server, _feed) = scenario.await.unwrap();
    }

    #[tokio::test]
    async fn refused_watches_relist() {
        let (api, mut server) = mock_api::<ConfigMap>("games");
        let scenario = tokio::spawn(async move {
            server.expect_list(list_body::<ConfigMap>("10", &[])).await;
            server.refuse(503).await;
            server
        });
        let mut watcher = Watcher::new(api, &Config::default().labels("app=lobby"));
        assert!(watcher.step().await.is_ok());
        assert!(matches!(watcher.step().await, Err(Error::WatchStartFailed(_))));
        assert_eq!(watcher.phase(), Phase::Relisting);
        let _server = scenario.await.unwrap();
    }
}
