use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

use super::Result;
use crate::{
    api::{Api, DeleteParams, ListParams, PostParams},
    core::Resource,
    Client, Error,
};

/// Create, read, update and delete objects of one kind
///
/// Every operation has a variant taking an explicit namespace (`*_in`); the others
/// use the namespace the repository was created with.
pub struct CrudRepository<K> {
    client: Client,
    namespace: String,
    _kind: std::marker::PhantomData<fn() -> K>,
}

impl<K> Clone for CrudRepository<K> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            namespace: self.namespace.clone(),
            _kind: std::marker::PhantomData,
        }
    }
}

impl<K> Debug for CrudRepository<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrudRepository")
            .field("kind", &std::any::type_name::<K>())
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl<K> CrudRepository<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
{
    /// A repository using `namespace` unless told otherwise
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
            _kind: std::marker::PhantomData,
        }
    }

    /// The namespace used by the operations without an explicit one
    pub fn default_namespace(&self) -> &str {
        &self.namespace
    }

    /// The underlying [`Api`] for `namespace`
    pub fn api_in(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Create `resource` in the default namespace
    pub async fn create(&self, resource: &K) -> Result<K> {
        self.create_in(&self.namespace, resource).await
    }

    /// Create `resource` in `namespace`
    pub async fn create_in(&self, namespace: &str, resource: &K) -> Result<K> {
        let resource = placed(namespace, resource);
        Ok(self.api_in(namespace).create(&PostParams::default(), &resource).await?)
    }

    /// Create `resource` in the default namespace, or replace it when it exists
    pub async fn update(&self, resource: &K) -> Result<K> {
        self.update_in(&self.namespace, resource).await
    }

    /// Create `resource` in `namespace`, or replace it when it exists
    ///
    /// The replace is unconditional: the resource version of `resource` is ignored.
    pub async fn update_in(&self, namespace: &str, resource: &K) -> Result<K> {
        let resource = placed(namespace, resource);
        let api = self.api_in(namespace);
        match api.create(&PostParams::default(), &resource).await {
            Err(Error::ConflictVersion { .. }) => {
                let name = resource.meta().name.clone().unwrap_or_default();
                tracing::debug!(%namespace, %name, "object exists, replacing it");
                Ok(api.replace(&name, &PostParams::default(), &resource).await?)
            }
            res => Ok(res?),
        }
    }

    /// Fetch `name` from the default namespace, change it with `updater` and write it back
    pub async fn update_with<F>(&self, name: &str, updater: F) -> Result<K>
    where
        F: FnOnce(&mut K),
    {
        self.update_with_in(&self.namespace, name, updater).await
    }

    /// Fetch `name` from `namespace`, change it with `updater` and write it back
    ///
    /// Fails with a not found error when the object does not exist.
    pub async fn update_with_in<F>(&self, namespace: &str, name: &str, updater: F) -> Result<K>
    where
        F: FnOnce(&mut K),
    {
        let mut resource = self.api_in(namespace).get(name).await?;
        updater(&mut resource);
        self.update_in(namespace, &resource).await
    }

    /// The object called `name` in the default namespace, if it exists
    pub async fn get(&self, name: &str) -> Result<Option<K>> {
        self.get_in(&self.namespace, name).await
    }

    /// The object called `name` in `namespace`, if it exists
    pub async fn get_in(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        Ok(self.api_in(namespace).get_opt(name).await?)
    }

    /// Every object in the default namespace
    pub async fn list(&self) -> Result<Vec<K>> {
        self.list_in(&self.namespace).await
    }

    /// Every object in `namespace`
    pub async fn list_in(&self, namespace: &str) -> Result<Vec<K>> {
        Ok(self.api_in(namespace).list(&ListParams::default()).await?.items)
    }

    /// Delete `name` from the default namespace
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.delete_in(&self.namespace, name).await
    }

    /// Delete `name` from `namespace`; deleting a missing object is not an error
    pub async fn delete_in(&self, namespace: &str, name: &str) -> Result<()> {
        match self.api_in(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(Error::NotFound { .. }) => {
                tracing::debug!(%namespace, %name, "nothing to delete");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// A copy of `resource` that can be written to `namespace` unconditionally
fn placed<K: Resource + Clone>(namespace: &str, resource: &K) -> K {
    let mut resource = resource.clone();
    let meta = resource.meta_mut();
    meta.namespace = Some(namespace.to_string());
    meta.resource_version = None;
    resource
}
