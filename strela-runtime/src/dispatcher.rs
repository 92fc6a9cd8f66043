//! Fans cache notifications out to registered handlers
//!
//! Handlers run synchronously and in registration order. A handler that fails, by
//! returning an error or by panicking, is reported to the [`ErrorSink`] and stays
//! registered; the remaining handlers still see the notification.

use parking_lot::RwLock;
use std::{
    any::Any,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};
use strela_core::Resource;
use thiserror::Error;

use crate::reflector::{Notification, ObjectRef};

/// The error a handler returns when it could not process a notification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    /// A failure described by a message only
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// A failure caused by another error
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// Reacts to changes of the local cache
///
/// Every method defaults to doing nothing, so handlers only implement what they need.
/// Handlers are called on the informer task; a slow handler delays every later
/// notification of that informer.
pub trait EventHandler<K>: Send + Sync {
    /// A new object appeared
    fn on_add(&self, obj: &K) -> Result<(), HandlerError> {
        let _ = obj;
        Ok(())
    }

    /// A known object changed
    fn on_update(&self, old: &K, new: &K) -> Result<(), HandlerError> {
        let _ = (old, new);
        Ok(())
    }

    /// An object went away; `obj` is its last known state
    fn on_delete(&self, obj: &K) -> Result<(), HandlerError> {
        let _ = obj;
        Ok(())
    }
}

/// How a handler failed
#[derive(Debug)]
pub enum Failure {
    /// The handler returned an error
    Error(HandlerError),
    /// The handler panicked with this message
    Panic(String),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(err) => write!(f, "{err}"),
            Self::Panic(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

/// A failed handler invocation
#[derive(Debug)]
pub struct HandlerFailure {
    /// Position of the handler in registration order
    pub handler: usize,
    /// `add`, `update` or `delete`
    pub notification: &'static str,
    /// The object the notification was about
    pub key: ObjectRef,
    /// What went wrong
    pub failure: Failure,
}

/// Receives handler failures
pub trait ErrorSink: Send + Sync {
    /// Called once per failed handler invocation
    fn report(&self, failure: HandlerFailure);
}

/// The default [`ErrorSink`], logging every failure as a warning
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, failure: HandlerFailure) {
        tracing::warn!(
            handler = failure.handler,
            notification = failure.notification,
            key = %failure.key,
            "event handler failed: {}",
            failure.failure
        );
    }
}

/// Calls registered handlers for every notification
///
/// Clones share the same handler list.
pub struct Dispatcher<K> {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler<K>>>>>,
    sink: Arc<dyn ErrorSink>,
}

impl<K> Clone for Dispatcher<K> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<K> Default for Dispatcher<K> {
    fn default() -> Self {
        Self::with_sink(TracingSink)
    }
}

impl<K> fmt::Debug for Dispatcher<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers.read().len())
            .finish_non_exhaustive()
    }
}

impl<K> Dispatcher<K> {
    /// A dispatcher reporting failures to `sink`
    pub fn with_sink(sink: impl ErrorSink + 'static) -> Self {
        Self {
            handlers: Arc::default(),
            sink: Arc::new(sink),
        }
    }

    /// Add a handler after every handler registered so far
    pub fn register(&self, handler: impl EventHandler<K> + 'static) {
        self.handlers.write().push(Arc::new(handler));
    }

    /// The number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl<K: Resource> Dispatcher<K> {
    /// Call every handler with `notification`, in registration order
    ///
    /// Handlers registered while a dispatch is running first see the next notification.
    pub fn dispatch(&self, notification: &Notification<K>) {
        self.dispatch_while(notification, || true);
    }

    /// Like [`Dispatcher::dispatch`], but asks `proceed` before every handler
    ///
    /// Returns `false` when `proceed` cut the dispatch short.
    pub fn dispatch_while(&self, notification: &Notification<K>, mut proceed: impl FnMut() -> bool) -> bool {
        let handlers = self.handlers.read().clone();
        let kind = match notification {
            Notification::Added(_) => "add",
            Notification::Updated { .. } => "update",
            Notification::Deleted(_) => "delete",
        };
        for (idx, handler) in handlers.iter().enumerate() {
            if !proceed() {
                return false;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| match notification {
                Notification::Added(obj) => handler.on_add(obj),
                Notification::Updated { old, new } => handler.on_update(old, new),
                Notification::Deleted(obj) => handler.on_delete(obj),
            }));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => Failure::Error(err),
                Err(payload) => Failure::Panic(panic_message(payload.as_ref())),
            };
            self.sink.report(HandlerFailure {
                handler: idx,
                notification: kind,
                key: notification.key(),
                failure,
            });
        }
        true
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        String::from("non-string panic payload")
    }
}
