//! Crate for talking to the Kubernetes API on behalf of strela
//!
//! This crate holds the cluster [`Client`], the typed [`Api`] wrapper around it
//! and the [`Config`] the client is built from. Every failed call surfaces as an
//! [`Error`] tagged with the [`Origin`] of the request.
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::TryStreamExt;
//! use strela_client::api::{Api, ListParams, ResourceExt, WatchEvent};
//! use strela_client::Client;
//! use k8s_openapi::api::core::v1::Pod;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::try_default().await?;
//!     let pods: Api<Pod> = Api::default_namespaced(client);
//!
//!     let list = pods.list(&ListParams::default()).await?;
//!     for p in &list {
//!         println!("found pod {}", p.name_any());
//!     }
//!
//!     let version = list.resource_version().unwrap_or("0").to_string();
//!     let mut events = Box::pin(pods.watch(&ListParams::default(), &version).await?);
//!     while let Some(event) = events.try_next().await? {
//!         if let WatchEvent::Added(p) = event {
//!             println!("added {}", p.name_any());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod api;
#[doc(inline)]
pub use api::Api;

pub mod client;
#[doc(inline)]
pub use client::Client;

pub mod config;
#[doc(inline)]
pub use config::Config;

pub mod error;
#[doc(inline)]
pub use error::{ConfigError, Error, Origin};

/// Convient alias for `Result<T, Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub use crate::core::{Resource, ResourceExt};
/// Re-exports from strela_core
pub use strela_core as core;
