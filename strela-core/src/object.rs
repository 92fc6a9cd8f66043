//! Generic object list wrapper.
use crate::{
    metadata::{ListMeta, TypeMeta},
    resource::Resource,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A generic Kubernetes object list
///
/// This is used instead of a full struct for `PodList`, `MinecraftServerList`, etc.
///
/// The list level `metadata.resourceVersion` is the snapshot version that a
/// following watch must resume from; it is never taken from an individual item.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ObjectList<T> {
    /// The type fields, not always present
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,

    /// ListMeta - only really used for its `resourceVersion`
    #[serde(default)]
    pub metadata: ListMeta,

    /// The items we are actually interested in.
    #[serde(bound(deserialize = "Vec<T>: Deserialize<'de>"))]
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> ObjectList<T> {
    /// `iter` returns an Iterator over the elements of this ObjectList
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// `iter_mut` returns an Iterator of mutable references to the elements of this ObjectList
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    /// The snapshot version of the list, if the server sent one
    pub fn resource_version(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref().filter(|rv| !rv.is_empty())
    }
}

impl ObjectList<serde_json::Value> {
    /// Decode every raw item through the typed shape of `K`
    ///
    /// Fails on the first item that does not decode; a list is never partially accepted.
    pub fn decode_items<K>(self, dt: &K::DynamicType) -> serde_json::Result<ObjectList<K>>
    where
        K: Resource + DeserializeOwned,
    {
        let items = self
            .items
            .into_iter()
            .map(|item| K::decode(dt, item))
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(ObjectList {
            types: self.types,
            metadata: self.metadata,
            items,
        })
    }
}

impl<T> IntoIterator for ObjectList<T> {
    type IntoIter = ::std::vec::IntoIter<Self::Item>;
    type Item = T;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ObjectList<T> {
    type IntoIter = ::std::slice::Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
