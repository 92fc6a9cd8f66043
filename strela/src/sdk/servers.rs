use k8s_openapi::api::core::v1::Pod;

use super::{CrudRepository, MinecraftServer, MinecraftServerSet, MinecraftStatefulSet, Result};
use crate::{core::ResourceExt, Api};

/// Repository of [`MinecraftServer`]s
pub type MinecraftServers = CrudRepository<MinecraftServer>;
/// Repository of [`MinecraftServerSet`]s
pub type MinecraftServerSets = CrudRepository<MinecraftServerSet>;
/// Repository of [`MinecraftStatefulSet`]s
pub type MinecraftStatefulSets = CrudRepository<MinecraftStatefulSet>;

impl CrudRepository<MinecraftServer> {
    /// The pod running `server`, looked up in the default namespace
    pub async fn pod_for_server(&self, server: &MinecraftServer) -> Result<Option<Pod>> {
        self.pod_for_server_in(self.default_namespace(), server).await
    }

    /// The pod running `server`, looked up in `namespace`
    ///
    /// A server runs in the pod of the same name.
    pub async fn pod_for_server_in(&self, namespace: &str, server: &MinecraftServer) -> Result<Option<Pod>> {
        let pods: Api<Pod> = Api::namespaced(self.client().clone(), namespace);
        Ok(pods.get_opt(&server.name_any()).await?)
    }
}
