//! The resource schema registry
//!
//! Maps a kind name to its [`ResourceDescriptor`] and, for kinds registered from a
//! compiled type, to a [`Codec`] that checks json payloads against that type.
//! The registry is built once at startup and is read-only afterwards.
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{collections::HashMap, fmt};
use thiserror::Error;

use crate::{descriptor::ResourceDescriptor, Resource};

/// Returned by [`Registry::resolve`] for kinds that were never registered
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown resource kind: {0}")]
pub struct UnknownResourceKind(pub String);

/// Decode/encode capability pair bound to a compiled resource type
///
/// Both directions run the payload through the typed shape and reject anything
/// the type would not accept. The payload itself is passed on untouched, so
/// dynamic consumers still see every field the server sent.
#[derive(Clone, Copy)]
pub struct Codec {
    type_name: &'static str,
    decode: fn(&serde_json::Value) -> serde_json::Result<()>,
    encode: fn(&serde_json::Value) -> serde_json::Result<()>,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").field("type_name", &self.type_name).finish()
    }
}

fn check_shape<K: DeserializeOwned>(value: &serde_json::Value) -> serde_json::Result<()> {
    K::deserialize(value).map(|_| ())
}

fn check_roundtrip<K: DeserializeOwned + Serialize>(value: &serde_json::Value) -> serde_json::Result<()> {
    let typed = K::deserialize(value)?;
    serde_json::to_value(&typed).map(|_| ())
}

impl Codec {
    /// Codec backed by the serde implementation of `K`
    pub fn of<K: DeserializeOwned + Serialize>() -> Self {
        Self {
            type_name: std::any::type_name::<K>(),
            decode: check_shape::<K>,
            encode: check_roundtrip::<K>,
        }
    }

    /// Check an incoming payload against the typed shape
    pub fn decode(&self, value: &serde_json::Value) -> serde_json::Result<()> {
        (self.decode)(value)
    }

    /// Check an outgoing payload against the typed shape
    pub fn encode(&self, value: &serde_json::Value) -> serde_json::Result<()> {
        (self.encode)(value)
    }
}

/// A registered kind: its descriptor plus the optional typed codec
///
/// This is the `DynamicType` of [`DynamicObject`](crate::DynamicObject).
#[derive(Clone, Debug)]
pub struct RegisteredKind {
    descriptor: ResourceDescriptor,
    codec: Option<Codec>,
}

impl RegisteredKind {
    /// A kind without a compiled type; payloads are only checked for object metadata
    pub fn untyped(descriptor: ResourceDescriptor) -> Self {
        Self {
            descriptor,
            codec: None,
        }
    }

    /// A kind backed by the compiled type `K`
    pub fn typed<K>() -> Self
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Serialize,
    {
        Self {
            descriptor: K::descriptor(&()).into_owned(),
            codec: Some(Codec::of::<K>()),
        }
    }

    /// The descriptor of this kind
    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// The typed codec, if the kind was registered from a compiled type
    pub fn codec(&self) -> Option<&Codec> {
        self.codec.as_ref()
    }
}

impl From<ResourceDescriptor> for RegisteredKind {
    fn from(descriptor: ResourceDescriptor) -> Self {
        Self::untyped(descriptor)
    }
}

/// Process wide lookup table from kind to [`RegisteredKind`]
///
/// ```
/// use strela_core::{Registry, ResourceDescriptor};
/// let registry = Registry::builder()
///     .register_descriptor(ResourceDescriptor::namespaced("strela.dev", "v1", "MinecraftServer", "minecraftservers"))
///     .build();
/// let servers = registry.resolve("MinecraftServer").unwrap();
/// assert_eq!(
///     registry.build_path(servers, Some("games"), Some("lobby-0")),
///     "/apis/strela.dev/v1/namespaces/games/minecraftservers/lobby-0"
/// );
/// assert!(registry.resolve("Unicorn").is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Registry {
    kinds: HashMap<String, RegisteredKind>,
}

/// Builder for an immutable [`Registry`]
#[derive(Default)]
pub struct RegistryBuilder {
    kinds: HashMap<String, RegisteredKind>,
}

impl RegistryBuilder {
    /// Register a compiled resource type
    ///
    /// A later registration of the same kind replaces the earlier one.
    #[must_use]
    pub fn register<K>(mut self) -> Self
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Serialize,
    {
        let kind = RegisteredKind::typed::<K>();
        self.kinds.insert(kind.descriptor.kind.clone(), kind);
        self
    }

    /// Register a kind known only by its descriptor
    #[must_use]
    pub fn register_descriptor(mut self, descriptor: ResourceDescriptor) -> Self {
        self.kinds
            .insert(descriptor.kind.clone(), RegisteredKind::untyped(descriptor));
        self
    }

    /// Freeze the registry
    pub fn build(self) -> Registry {
        Registry { kinds: self.kinds }
    }
}

impl Registry {
    /// Start building a registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up the descriptor of a kind
    pub fn resolve(&self, kind: &str) -> Result<&ResourceDescriptor, UnknownResourceKind> {
        self.entry(kind).map(RegisteredKind::descriptor)
    }

    /// Look up the full registration of a kind
    pub fn entry(&self, kind: &str) -> Result<&RegisteredKind, UnknownResourceKind> {
        self.kinds
            .get(kind)
            .ok_or_else(|| UnknownResourceKind(kind.to_string()))
    }

    /// Build the url path for a descriptor
    ///
    /// `/apis/{group}/{version}/namespaces/{namespace}/{plural}/{name}`, where cluster
    /// scoped kinds omit the namespace segment and the core group uses `/api/{version}`.
    pub fn build_path(
        &self,
        descriptor: &ResourceDescriptor,
        namespace: Option<&str>,
        name: Option<&str>,
    ) -> String {
        descriptor.path(namespace, name)
    }

    /// Iterate over all registered descriptors
    pub fn descriptors(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.kinds.values().map(RegisteredKind::descriptor)
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether nothing has been registered
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::{Registry, UnknownResourceKind};
    use crate::ResourceDescriptor;
    use k8s_openapi::api::core::v1::{ConfigMap, Node};
    use serde_json::json;

    fn registry() -> Registry {
        Registry::builder()
            .register::<ConfigMap>()
            .register::<Node>()
            .register_descriptor(ResourceDescriptor::namespaced(
                "strela.dev",
                "v1",
                "MinecraftServerSet",
                "minecraftserversets",
            ))
            .build()
    }

    #[test]
    fn resolves_registered_kinds() {
        let reg = registry();
        assert_eq!(reg.len(), 3);
        let cm = reg.resolve("ConfigMap").unwrap();
        assert_eq!(cm.plural, "configmaps");
        assert_eq!(
            reg.build_path(cm, Some("default"), Some("settings")),
            "/api/v1/namespaces/default/configmaps/settings"
        );
        let node = reg.resolve("Node").unwrap();
        assert_eq!(reg.build_path(node, Some("default"), Some("n1")), "/api/v1/nodes/n1");
    }

    #[test]
    fn unknown_kinds_fail() {
        let err = registry().resolve("Deployment").unwrap_err();
        assert_eq!(err, UnknownResourceKind("Deployment".into()));
        assert_eq!(err.to_string(), "unknown resource kind: Deployment");
    }

    #[test]
    fn typed_codec_rejects_wrong_shapes() {
        let reg = registry();
        let codec = reg.entry("ConfigMap").unwrap().codec().unwrap();
        let good = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "a" },
            "data": { "k": "v" }
        });
        assert!(codec.decode(&good).is_ok());
        assert!(codec.encode(&good).is_ok());
        let bad = json!({ "metadata": { "name": "a" }, "data": { "k": 5 } });
        assert!(codec.decode(&bad).is_err());
        assert!(reg.entry("MinecraftServerSet").unwrap().codec().is_none());
    }
}
