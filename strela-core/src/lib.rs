//! Types and traits necessary for interacting with the Kubernetes API
//!
//! This crate holds everything that does not need a client: the resource
//! schema [`Registry`], the [`Resource`] trait, request building and the wire
//! types for lists and watches.
//! The same information is re-exported from `strela` under `strela::core`.
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod descriptor;
pub use descriptor::ResourceDescriptor;

pub mod dynamic;
pub use dynamic::DynamicObject;

pub mod metadata;
pub use metadata::{ListMeta, ObjectMeta, TypeMeta};

pub mod object;
pub use object::ObjectList;

pub mod params;

pub mod registry;
pub use registry::{Registry, RegisteredKind, UnknownResourceKind};

pub mod request;
pub use request::Request;

mod resource;
pub use resource::{KnownScope, Resource, ResourceExt};

pub mod response;

pub mod watch;
pub use watch::WatchEvent;

mod error;
pub use error::{Error, ErrorResponse};

/// Convient alias for `Result<T, Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;
