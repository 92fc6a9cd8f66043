use super::{CrudRepository, MinecraftDeployment, MinecraftDeploymentType, Result};

/// Repository of [`MinecraftDeployment`]s
pub type MinecraftDeployments = CrudRepository<MinecraftDeployment>;

impl CrudRepository<MinecraftDeployment> {
    /// Deployments of the default namespace running `type_`
    pub async fn list_by_type(&self, type_: MinecraftDeploymentType) -> Result<Vec<MinecraftDeployment>> {
        self.list_by_type_in(self.default_namespace(), type_).await
    }

    /// Deployments of `namespace` running `type_`
    ///
    /// Filters client side on `spec.type`, ignoring case.
    pub async fn list_by_type_in(
        &self,
        namespace: &str,
        type_: MinecraftDeploymentType,
    ) -> Result<Vec<MinecraftDeployment>> {
        let mut deployments = self.list_in(namespace).await?;
        deployments.retain(|d| type_.matches(&d.spec.type_));
        Ok(deployments)
    }

    /// Proxy deployments of the default namespace
    pub async fn list_proxies(&self) -> Result<Vec<MinecraftDeployment>> {
        self.list_by_type(MinecraftDeploymentType::Proxy).await
    }

    /// Proxy deployments of `namespace`
    pub async fn list_proxies_in(&self, namespace: &str) -> Result<Vec<MinecraftDeployment>> {
        self.list_by_type_in(namespace, MinecraftDeploymentType::Proxy).await
    }

    /// Server deployments of the default namespace
    pub async fn list_servers(&self) -> Result<Vec<MinecraftDeployment>> {
        self.list_by_type(MinecraftDeploymentType::Server).await
    }

    /// Server deployments of `namespace`
    pub async fn list_servers_in(&self, namespace: &str) -> Result<Vec<MinecraftDeployment>> {
        self.list_by_type_in(namespace, MinecraftDeploymentType::Server).await
    }
}
