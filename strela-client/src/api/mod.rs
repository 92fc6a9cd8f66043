//! Typed calls against one kind, optionally scoped to a namespace
mod core_methods;

use std::fmt::Debug;

pub use strela_core::{
    dynamic::DynamicObject,
    metadata::{ListMeta, ObjectMeta, TypeMeta},
    object::ObjectList,
    params::{DeleteParams, ListParams, Patch, PatchParams, PostParams, Preconditions, PropagationPolicy},
    request::Request,
    response::Status,
    watch::WatchEvent,
    Registry, Resource, ResourceExt,
};

use crate::{error::Origin, Client, Result};

/// Typed access to the objects of kind `K`
///
/// Builds requests with a [`Request`], sends them through the [`Client`] and decodes the
/// answers with [`Resource::decode`]. Holds no state between calls; clones are as
/// cheap as the [`Client`].
pub struct Api<K: Resource> {
    pub(crate) request: Request,
    pub(crate) client: Client,
    namespace: Option<String>,
    dyntype: K::DynamicType,
}

impl<K: Resource> Api<K> {
    /// Objects of every namespace, or of a cluster scoped kind
    pub fn all_with(client: Client, dyntype: &K::DynamicType) -> Self {
        let url = K::url_path(dyntype, None);
        Self {
            client,
            request: Request::new(url),
            namespace: None,
            dyntype: dyntype.clone(),
        }
    }

    /// Objects inside `ns`; cluster scoped kinds ignore it
    pub fn namespaced_with(client: Client, ns: &str, dyntype: &K::DynamicType) -> Self {
        let url = K::url_path(dyntype, Some(ns));
        let namespace = K::descriptor(dyntype).namespaced.then(|| ns.to_string());
        Self {
            client,
            request: Request::new(url),
            namespace,
            dyntype: dyntype.clone(),
        }
    }

    /// Objects inside the client's default namespace
    pub fn default_namespaced_with(client: Client, dyntype: &K::DynamicType) -> Self {
        let ns = client.default_namespace().to_string();
        Self::namespaced_with(client, &ns, dyntype)
    }

    /// Give back the client
    pub fn into_client(self) -> Client {
        self.into()
    }

    /// Collection path all calls are relative to
    pub fn resource_url(&self) -> &str {
        &self.request.url_path
    }

    /// The namespace this api is scoped to, if any
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// The dynamic type this api decodes with
    pub fn dyntype(&self) -> &K::DynamicType {
        &self.dyntype
    }

    pub(crate) fn origin(&self, name: Option<&str>) -> Origin {
        Origin {
            status: None,
            kind: Some(K::descriptor(&self.dyntype).kind.clone()),
            namespace: self.namespace.clone(),
            name: name.map(String::from),
        }
    }
}

impl Api<DynamicObject> {
    /// Api for a kind looked up in a [`Registry`]
    ///
    /// Fails with [`Error::UnknownResourceKind`](crate::Error::UnknownResourceKind) for unregistered kinds.
    pub fn from_registry(client: Client, registry: &Registry, kind: &str, ns: Option<&str>) -> Result<Self> {
        let registered = registry.entry(kind)?;
        Ok(match ns {
            Some(ns) => Self::namespaced_with(client, ns, registered),
            None => Self::all_with(client, registered),
        })
    }
}

/// Constructors for statically typed kinds
impl<K: Resource> Api<K>
where
    <K as Resource>::DynamicType: Default,
{
    /// Objects of every namespace
    ///
    /// ```no_run
    /// # use strela_client::{Api, Client};
    /// # let client: Client = todo!();
    /// use k8s_openapi::api::core::v1::Node;
    /// let nodes: Api<Node> = Api::all(client);
    /// ```
    pub fn all(client: Client) -> Self {
        Self::all_with(client, &K::DynamicType::default())
    }

    /// Objects inside `ns`
    ///
    /// ```no_run
    /// # use strela_client::{Api, Client};
    /// # let client: Client = todo!();
    /// use k8s_openapi::api::core::v1::Pod;
    /// let game_pods: Api<Pod> = Api::namespaced(client, "games");
    /// ```
    pub fn namespaced(client: Client, ns: &str) -> Self {
        Self::namespaced_with(client, ns, &K::DynamicType::default())
    }

    /// Objects inside the client's default namespace
    pub fn default_namespaced(client: Client) -> Self {
        let ns = client.default_namespace().to_string();
        Self::namespaced(client, &ns)
    }
}

impl<K: Resource> Clone for Api<K> {
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            client: self.client.clone(),
            namespace: self.namespace.clone(),
            dyntype: self.dyntype.clone(),
        }
    }
}

impl<K: Resource> From<Api<K>> for Client {
    fn from(api: Api<K>) -> Self {
        api.client
    }
}

impl<K: Resource> Debug for Api<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            request,
            client: _,
            namespace,
            dyntype,
        } = self;
        f.debug_struct("Api")
            .field("request", &request)
            .field("client", &"...")
            .field("namespace", &namespace)
            .field("kind", &K::descriptor(dyntype).kind)
            .finish()
    }
}
