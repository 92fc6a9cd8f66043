pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{de::DeserializeOwned, Serialize};
use std::{borrow::Cow, collections::BTreeMap};

use crate::descriptor::ResourceDescriptor;

/// A single object of a kind the client can talk about
///
/// Implementors carry an [`ObjectMeta`], know their [`ResourceDescriptor`] and
/// convert to and from the json the api server speaks. List wrappers are not resources.
///
/// Persisted objects always have a name; namespace, resource version and uid are
/// filled in by the server.
pub trait Resource: Sized {
    /// What a value needs to know its kind at runtime
    ///
    /// `()` for statically typed kinds, a [`ResourceDescriptor`] for
    /// [`DynamicObject`](crate::DynamicObject).
    type DynamicType: Clone + Send + Sync + 'static;

    /// Returns the descriptor of this kind
    fn descriptor(dt: &Self::DynamicType) -> Cow<'_, ResourceDescriptor>;

    /// Object metadata
    fn meta(&self) -> &ObjectMeta;
    /// Object metadata, mutably
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    /// Path of the collection of this kind, inside `namespace` if given
    fn url_path(dt: &Self::DynamicType, namespace: Option<&str>) -> String {
        Self::descriptor(dt).collection_path(namespace)
    }

    /// Decode one object of this kind from its json representation
    fn decode(_dt: &Self::DynamicType, value: serde_json::Value) -> serde_json::Result<Self>
    where
        Self: DeserializeOwned,
    {
        serde_json::from_value(value)
    }

    /// Encode this object for a request body
    fn encode(&self, _dt: &Self::DynamicType) -> serde_json::Result<Vec<u8>>
    where
        Self: Serialize,
    {
        serde_json::to_vec(self)
    }
}

// every generated k8s-openapi kind is a resource
impl<K, S> Resource for K
where
    K: k8s_openapi::Metadata<Ty = ObjectMeta> + k8s_openapi::Resource<Scope = S>,
    S: KnownScope,
{
    type DynamicType = ();

    fn descriptor(_: &()) -> Cow<'_, ResourceDescriptor> {
        Cow::Owned(ResourceDescriptor {
            group: K::GROUP.into(),
            version: K::VERSION.into(),
            kind: K::KIND.into(),
            plural: K::URL_PATH_SEGMENT.into(),
            namespaced: S::NAMESPACED,
        })
    }

    fn meta(&self) -> &ObjectMeta {
        self.metadata()
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        self.metadata_mut()
    }
}

/// Maps the k8s-openapi scope markers onto [`ResourceDescriptor::namespaced`]
pub trait KnownScope {
    /// Whether objects in this scope live inside a namespace
    const NAMESPACED: bool;
}

impl KnownScope for k8s_openapi::NamespaceResourceScope {
    const NAMESPACED: bool = true;
}

impl KnownScope for k8s_openapi::ClusterResourceScope {
    const NAMESPACED: bool = false;
}

/// Shorthands over [`Resource::meta`]
pub trait ResourceExt: Resource {
    /// `metadata.name`, panicking when missing
    ///
    /// Safe on anything read back from the api server.
    fn name_unchecked(&self) -> String;

    /// `metadata.name`, else `metadata.generateName`, else `""`
    fn name_any(&self) -> String;

    /// `metadata.namespace`
    fn namespace(&self) -> Option<String>;
    /// `metadata.resourceVersion`
    fn resource_version(&self) -> Option<String>;
    /// `metadata.uid`; a recreated object gets a new one
    fn uid(&self) -> Option<String>;
    /// Labels, empty when unset
    fn labels(&self) -> &BTreeMap<String, String>;
    /// Labels, created on first use
    fn labels_mut(&mut self) -> &mut BTreeMap<String, String>;
    /// Annotations, empty when unset
    fn annotations(&self) -> &BTreeMap<String, String>;
}

static EMPTY_MAP: BTreeMap<String, String> = BTreeMap::new();

impl<K: Resource> ResourceExt for K {
    fn name_unchecked(&self) -> String {
        self.meta().name.clone().expect(".metadata.name missing")
    }

    fn name_any(&self) -> String {
        self.meta()
            .name
            .clone()
            .or_else(|| self.meta().generate_name.clone())
            .unwrap_or_default()
    }

    fn namespace(&self) -> Option<String> {
        self.meta().namespace.clone()
    }

    fn resource_version(&self) -> Option<String> {
        self.meta().resource_version.clone()
    }

    fn uid(&self) -> Option<String> {
        self.meta().uid.clone()
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        self.meta().labels.as_ref().unwrap_or(&EMPTY_MAP)
    }

    fn labels_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.meta_mut().labels.get_or_insert_with(BTreeMap::new)
    }

    fn annotations(&self) -> &BTreeMap<String, String> {
        self.meta().annotations.as_ref().unwrap_or(&EMPTY_MAP)
    }
}
