//! Strela is an umbrella-crate for talking to the Kubernetes API of a Strela cluster.
//!
//! # Overview
//!
//! The main modules are:
//!
//! - [`client`](crate::client) with the [`Client`](crate::Client) and its default http stack
//! - [`config`](crate::config) for the cluster [`Config`](crate::Config)
//! - [`api`](crate::api) with the generic [`Api`](crate::Api)
//! - [`runtime`](crate::runtime) with the [`watcher`](crate::runtime::watcher()), the
//!   [`Store`](crate::runtime::Store) and the [`Informer`](crate::runtime::Informer)
//! - [`sdk`](crate::sdk) with repositories for the Strela custom resources
//! - [`core`](crate::core) with the resource registry and the wire types
//!
//! # Using the Client
//! ```no_run
//! use strela::{Client, api::{Api, ListParams, ResourceExt}};
//! use k8s_openapi::api::core::v1::Pod;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::try_default().await?;
//!     let pods: Api<Pod> = Api::default_namespaced(client);
//!     for p in pods.list(&ListParams::default()).await?.items {
//!         println!("found pod {}", p.name_any());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Using the SDK
//! ```no_run
//! use strela::sdk::StrelaSdk;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sdk = StrelaSdk::try_default().await?;
//!     for proxy in sdk.minecraft_deployments().list_proxies().await? {
//!         println!("proxy deployment {:?}", proxy.metadata.name);
//!     }
//!     if let Some(me) = sdk.current_server().await? {
//!         println!("running as {:?}", me.metadata.name);
//!     }
//!     Ok(())
//! }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use strela_client::{api, client, config, error};

#[doc(inline)] pub use api::Api;
#[doc(inline)] pub use client::Client;
#[doc(inline)] pub use config::Config;
#[doc(inline)] pub use error::Error;
/// Convient alias for `Result<T, Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Re-exports from [`strela_runtime`]
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
#[doc(inline)]
pub use strela_runtime as runtime;

#[cfg(feature = "sdk")]
#[cfg_attr(docsrs, doc(cfg(feature = "sdk")))]
pub mod sdk;

pub use crate::core::{Resource, ResourceExt};
/// Re-exports from [`strela_core`]
#[doc(inline)]
pub use strela_core as core;

#[cfg(all(test, feature = "runtime", feature = "sdk"))] mod mock_tests;
