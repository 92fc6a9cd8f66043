//! Keeps a local cache of a resource collection in sync and notifies handlers
//!
//! An [`Informer`] runs one task that lists, then watches, and relists whenever the
//! watch cannot be resumed. Every change to the cache is dispatched to the registered
//! [`EventHandler`]s before the next event is read, so handlers observe the changes
//! of a key in the order the server made them.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use strela_client::Api;
use strela_core::Resource;
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    dispatcher::{Dispatcher, ErrorSink, EventHandler},
    reflector::{store, ObjectRef, Store, Writer},
    utils::{DefaultBackoff, ResettableBackoff},
    watcher::{self, Phase, Watcher},
};

/// Errors of the [`Informer`] api
#[derive(Debug, Error)]
pub enum Error {
    /// The requested key is not in the cache
    #[error("{0} is not in the cache")]
    NotFound(ObjectRef),
    /// An informer runs at most once
    #[error("informer was already started")]
    AlreadyStarted,
    /// The informer stopped before it became ready
    #[error("informer was stopped")]
    Stopped,
}

/// Lifecycle of an [`Informer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Created, not started
    Initializing,
    /// Performing the first list
    Listing,
    /// Watching for changes
    Watching,
    /// Listing again to recover a watch that could not be resumed
    Relisting,
    /// Stopped for good
    Stopped,
}

impl State {
    /// Whether the first list has completed and the informer has not stopped
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Watching | Self::Relisting)
    }
}

impl From<Phase> for State {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Listing => Self::Listing,
            Phase::Watching => Self::Watching,
            Phase::Relisting => Self::Relisting,
        }
    }
}

/// Informer configuration
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    /// What to list and watch
    pub watcher: watcher::Config,
    /// Delays between failed attempts
    pub backoff: DefaultBackoff,
}

impl Config {
    /// Use the given watcher configuration
    #[must_use]
    pub fn watcher(mut self, watcher: watcher::Config) -> Self {
        self.watcher = watcher;
        self
    }

    /// Use the given backoff between failed attempts
    #[must_use]
    pub fn backoff(mut self, backoff: DefaultBackoff) -> Self {
        self.backoff = backoff;
        self
    }
}

/// A list/watch loop feeding a local cache and a [`Dispatcher`]
///
/// ```no_run
/// use k8s_openapi::api::core::v1::Pod;
/// use strela_client::{Api, Client};
/// use strela_runtime::{dispatcher::{EventHandler, HandlerError}, informer, Informer};
///
/// struct Logger;
/// impl EventHandler<Pod> for Logger {
///     fn on_add(&self, pod: &Pod) -> Result<(), HandlerError> {
///         println!("added {:?}", pod.metadata.name);
///         Ok(())
///     }
/// }
///
/// # async fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// # let client: Client = todo!();
/// let informer = Informer::new(Api::<Pod>::namespaced(client, "games"), informer::Config::default());
/// informer.register(Logger);
/// informer.start()?;
/// informer.wait_until_ready().await?;
/// let lobby = informer.get_by_key("games", "lobby-0")?;
/// informer.stop();
/// # Ok(())
/// # }
/// ```
pub struct Informer<K: Resource> {
    api: Api<K>,
    config: Config,
    reader: Store<K>,
    writer: Mutex<Option<Writer<K>>>,
    dispatcher: Dispatcher<K>,
    state: Arc<watch::Sender<State>>,
    token: CancellationToken,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<K> Informer<K>
where
    K: Resource + Clone + PartialEq + DeserializeOwned + Debug + Send + Sync + 'static,
{
    /// An informer that logs handler failures with `tracing`
    pub fn new(api: Api<K>, config: Config) -> Self {
        Self::with_dispatcher(api, config, Dispatcher::default())
    }

    /// An informer reporting handler failures to `sink`
    pub fn with_error_sink(api: Api<K>, config: Config, sink: impl ErrorSink + 'static) -> Self {
        Self::with_dispatcher(api, config, Dispatcher::with_sink(sink))
    }

    fn with_dispatcher(api: Api<K>, config: Config, dispatcher: Dispatcher<K>) -> Self {
        let (reader, writer) = store();
        let (state, _) = watch::channel(State::Initializing);
        Self {
            api,
            config,
            reader,
            writer: Mutex::new(Some(writer)),
            dispatcher,
            state: Arc::new(state),
            token: CancellationToken::new(),
            started: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// Add a handler; it sees every notification dispatched from now on
    pub fn register(&self, handler: impl EventHandler<K> + 'static) {
        self.dispatcher.register(handler);
    }

    /// Spawn the list/watch task on the current tokio runtime
    ///
    /// Returns [`Error::AlreadyStarted`] on every call after the first, including after a stop.
    pub fn start(&self) -> Result<(), Error> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }
        let writer = self.writer.lock().take().ok_or(Error::AlreadyStarted)?;
        let task = tokio::spawn(run(
            self.api.clone(),
            self.config.clone(),
            writer,
            self.dispatcher.clone(),
            self.state.clone(),
            self.token.clone(),
        ));
        *self.task.lock() = Some(task);
        Ok(())
    }

    /// Stop the task; no handler is called after this returns
    ///
    /// A handler that is already running when `stop` is called runs to completion.
    ///
    /// The cache is cleared once the task has noticed; see [`Informer::shutdown`] to wait for that.
    pub fn stop(&self) {
        self.token.cancel();
        self.state.send_replace(State::Stopped);
    }

    /// Stop the task and wait until it is gone
    pub async fn shutdown(&self) {
        self.stop();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                tracing::warn!("informer task failed: {}", err);
            }
        }
    }

    /// Subscribe to state changes
    pub fn state(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// A read handle to the cache
    pub fn store(&self) -> Store<K> {
        self.reader.clone()
    }

    /// Wait until the first list has populated the cache
    pub async fn wait_until_ready(&self) -> Result<(), Error> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|s| s.is_ready() || *s == State::Stopped)
            .await
            .map_err(|_| Error::Stopped)?;
        if *state == State::Stopped {
            return Err(Error::Stopped);
        }
        Ok(())
    }

    /// The cached object with the given namespace and name
    ///
    /// The namespace is ignored for cluster scoped kinds.
    pub fn get_by_key(&self, namespace: &str, name: &str) -> Result<Arc<K>, Error> {
        let key = ObjectRef::new(name).within(namespace);
        self.reader.get(&key).ok_or(Error::NotFound(key))
    }
}

impl<K: Resource> Drop for Informer<K> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn publish(state: &watch::Sender<State>, next: State) {
    state.send_if_modified(|current| {
        if *current == State::Stopped || *current == next {
            return false;
        }
        tracing::debug!(from = ?*current, to = ?next, "informer state changed");
        *current = next;
        true
    });
}

async fn run<K>(
    api: Api<K>,
    config: Config,
    mut writer: Writer<K>,
    dispatcher: Dispatcher<K>,
    state: Arc<watch::Sender<State>>,
    token: CancellationToken,
) where
    K: Resource + Clone + PartialEq + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let mut watcher = Watcher::new(api, &config.watcher);
    let mut backoff = ResettableBackoff::new(config.backoff);
    'run: loop {
        publish(&state, watcher.phase().into());
        let result = tokio::select! {
            biased;
            () = token.cancelled() => break 'run,
            result = watcher.step() => result,
        };
        match result {
            Ok(event) => {
                backoff.reset();
                for notification in writer.apply_watcher_event(event) {
                    if !dispatcher.dispatch_while(&notification, || !token.is_cancelled()) {
                        break 'run;
                    }
                }
            }
            Err(err) => {
                let Some(delay) = backoff.next() else {
                    continue;
                };
                tracing::warn!(?delay, "informer retrying after error: {}", err);
                tokio::select! {
                    biased;
                    () = token.cancelled() => break 'run,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    writer.clear();
    state.send_replace(State::Stopped);
    tracing::debug!("informer stopped");
}
