//! Typed repositories for the Strela custom resources
//!
//! [`StrelaSdk`] bundles one repository per kind, all bound to the same client and
//! default namespace.
//!
//! ```no_run
//! use strela::{sdk::{MinecraftServer, MinecraftServerSpec, StrelaSdk}, Client};
//!
//! # async fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::try_default().await?;
//! let sdk = StrelaSdk::new(client, "games");
//! let servers = sdk.minecraft_servers();
//! servers.create(&MinecraftServer::new("lobby-0", MinecraftServerSpec::default())).await?;
//! let lobby = servers
//!     .update_with("lobby-0", |s| {
//!         s.metadata.labels.get_or_insert_with(Default::default).insert("tier".into(), "lobby".into());
//!     })
//!     .await?;
//! let pod = servers.pod_for_server(&lobby).await?;
//! # Ok(())
//! # }
//! ```

mod deployments;
mod repository;
mod resources;
mod servers;

use thiserror::Error;

pub use deployments::MinecraftDeployments;
pub use repository::CrudRepository;
pub use resources::{
    registry, MinecraftDeployment, MinecraftDeploymentSpec, MinecraftDeploymentType, MinecraftServer,
    MinecraftServerSet, MinecraftServerSetSpec, MinecraftServerSpec, MinecraftStatefulSet,
    MinecraftStatefulSetSpec, GROUP, VERSION,
};
pub use servers::{MinecraftServerSets, MinecraftServers, MinecraftStatefulSets};

use crate::{Client, Config};

/// Namespace used by [`StrelaSdk::try_default`]
pub const DEFAULT_NAMESPACE: &str = "strela-system";
/// Environment variable holding the name of the pod the process runs in
pub const POD_NAME_ENV: &str = "POD_NAME";

/// Errors of the SDK
#[derive(Debug, Error)]
pub enum Error {
    /// A call to the api server failed
    #[error(transparent)]
    Client(#[from] crate::Error),

    /// The process does not run in a pod, so there is no current server
    #[error("not running in a pod: {POD_NAME_ENV} is not set")]
    NotInPod,
}

/// Convient alias for `Result<T, sdk::Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Entry point to the Strela custom resources
#[derive(Clone, Debug)]
pub struct StrelaSdk {
    deployments: MinecraftDeployments,
    stateful_sets: MinecraftStatefulSets,
    server_sets: MinecraftServerSets,
    servers: MinecraftServers,
    pod_name: Option<String>,
}

impl StrelaSdk {
    /// Repositories bound to `client` and `namespace`
    ///
    /// The current pod name is read from `POD_NAME` once, here.
    pub fn new(client: Client, namespace: &str) -> Self {
        Self::with_pod_name(client, namespace, std::env::var(POD_NAME_ENV).ok())
    }

    fn with_pod_name(client: Client, namespace: &str, pod_name: Option<String>) -> Self {
        Self {
            deployments: CrudRepository::new(client.clone(), namespace),
            stateful_sets: CrudRepository::new(client.clone(), namespace),
            server_sets: CrudRepository::new(client.clone(), namespace),
            servers: CrudRepository::new(client, namespace),
            pod_name: pod_name.filter(|name| !name.is_empty()),
        }
    }

    /// Repositories bound to the inferred client and the `strela-system` namespace
    pub async fn try_default() -> Result<Self> {
        Self::try_default_in(DEFAULT_NAMESPACE).await
    }

    /// Repositories bound to the inferred client and `namespace`
    pub async fn try_default_in(namespace: &str) -> Result<Self> {
        let config = Config::infer().map_err(crate::Error::InferConfig)?;
        Self::from_config(config, namespace)
    }

    /// Repositories over the default stack for `config`, bound to `namespace`
    ///
    /// `namespace` wins over the default namespace of `config`. Must be called
    /// within a tokio runtime.
    pub fn from_config(config: Config, namespace: &str) -> Result<Self> {
        let client = Client::try_from(config)?;
        Ok(Self::new(client, namespace))
    }

    /// The [`MinecraftDeployment`] repository
    pub fn minecraft_deployments(&self) -> &MinecraftDeployments {
        &self.deployments
    }

    /// The [`MinecraftStatefulSet`] repository
    pub fn minecraft_stateful_sets(&self) -> &MinecraftStatefulSets {
        &self.stateful_sets
    }

    /// The [`MinecraftServerSet`] repository
    pub fn minecraft_server_sets(&self) -> &MinecraftServerSets {
        &self.server_sets
    }

    /// The [`MinecraftServer`] repository
    pub fn minecraft_servers(&self) -> &MinecraftServers {
        &self.servers
    }

    /// Name of the server this process runs as
    ///
    /// Fails with [`Error::NotInPod`] outside of a pod.
    pub fn current_server_name(&self) -> Result<&str> {
        self.pod_name.as_deref().ok_or(Error::NotInPod)
    }

    /// The server this process runs as, looked up in the default namespace
    pub async fn current_server(&self) -> Result<Option<MinecraftServer>> {
        let name = self.current_server_name()?;
        self.servers.get(name).await
    }
}

#[cfg(test)]
pub(crate) fn sdk_for_pod(client: Client, namespace: &str, pod_name: Option<&str>) -> StrelaSdk {
    StrelaSdk::with_pod_name(client, namespace, pod_name.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::{sdk_for_pod, Error, StrelaSdk};
    use crate::client::Body;
    use http::{Request, Response};
    use tower_test::mock;

    #[tokio::test]
    async fn current_server_needs_a_pod() {
        let (service, _handle) = mock::pair::<Request<Body>, Response<Body>>();
        let client = crate::Client::new(service, "default");

        let outside = sdk_for_pod(client.clone(), "strela-system", None);
        assert!(matches!(outside.current_server_name(), Err(Error::NotInPod)));
        assert!(matches!(outside.current_server().await, Err(Error::NotInPod)));
        assert!(matches!(
            sdk_for_pod(client.clone(), "strela-system", Some("")).current_server_name(),
            Err(Error::NotInPod)
        ));

        let inside = sdk_for_pod(client, "games", Some("lobby-0"));
        assert_eq!(inside.current_server_name().unwrap(), "lobby-0");
        assert_eq!(inside.minecraft_servers().default_namespace(), "games");
        assert_eq!(inside.minecraft_deployments().default_namespace(), "games");
    }

    #[tokio::test]
    async fn sdk_from_config_uses_the_given_namespace() {
        let mut config = crate::Config::new(http::Uri::from_static("http://127.0.0.1:8001"));
        config.default_namespace = "default".into();
        let sdk = StrelaSdk::from_config(config, "games").unwrap();
        assert_eq!(sdk.minecraft_servers().default_namespace(), "games");
        assert_eq!(sdk.minecraft_server_sets().default_namespace(), "games");

        let https = crate::Config::new(http::Uri::from_static("https://10.96.0.1:443"));
        assert!(matches!(
            StrelaSdk::from_config(https, "games"),
            Err(Error::Client(crate::Error::TlsRequired(_)))
        ));
    }
}
