//! Informers for strela
//!
//! This crate keeps local caches of resource collections in sync with the api server
//! and tells interested handlers about every change.
//!
//! - [`watcher()`] turns list and watch requests into a resilient stream of [`watcher::Event`]s
//! - [`reflector()`] applies those events to an in-memory [`Store`]
//! - [`Informer`] runs both on a task and feeds the resulting notifications to [`EventHandler`]s

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod dispatcher;
pub mod informer;
pub mod reflector;
pub mod utils;
pub mod watcher;

#[cfg(test)] mod test_utils;

pub use dispatcher::{EventHandler, HandlerError};
pub use informer::Informer;
pub use reflector::{reflector, Store};
pub use watcher::watcher;
