//! The Strela custom resources
//!
//! All kinds live in the `strela.dev/v1` group version and are namespaced.
//! Spec fields the SDK does not model are kept in `other` so that a read, modify,
//! replace cycle never drops them.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{borrow::Cow, collections::BTreeMap};

use crate::core::{ObjectMeta, Registry, Resource, ResourceDescriptor};

/// Group of every Strela kind
pub const GROUP: &str = "strela.dev";
/// Version of every Strela kind
pub const VERSION: &str = "v1";

macro_rules! custom_resource {
    ($(#[$attr:meta])* $kind:ident, $spec:ident, $plural:literal) => {
        $(#[$attr])*
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
        #[serde(rename_all = "camelCase")]
        pub struct $kind {
            /// Always `strela.dev/v1`
            pub api_version: String,
            /// Always the name of the kind
            pub kind: String,
            /// Standard object metadata
            #[serde(default)]
            pub metadata: ObjectMeta,
            /// Desired state
            pub spec: $spec,
            /// Observed state, as reported by the operator
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub status: Option<Value>,
        }

        impl $kind {
            /// Kind name
            pub const KIND: &'static str = stringify!($kind);
            /// Url path segment
            pub const PLURAL: &'static str = $plural;

            /// A new object called `name` in no namespace yet
            pub fn new(name: &str, spec: $spec) -> Self {
                Self {
                    api_version: format!("{}/{}", GROUP, VERSION),
                    kind: Self::KIND.to_string(),
                    metadata: ObjectMeta {
                        name: Some(name.to_string()),
                        ..ObjectMeta::default()
                    },
                    spec,
                    status: None,
                }
            }
        }

        impl Resource for $kind {
            type DynamicType = ();

            fn descriptor(_: &()) -> Cow<'_, ResourceDescriptor> {
                Cow::Owned(ResourceDescriptor::namespaced(GROUP, VERSION, Self::KIND, Self::PLURAL))
            }

            fn meta(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn meta_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }
        }
    };
}

custom_resource!(
    /// A single Minecraft server, backed by a pod of the same name
    MinecraftServer,
    MinecraftServerSpec,
    "minecraftservers"
);
custom_resource!(
    /// A scalable group of interchangeable Minecraft servers or proxies
    MinecraftDeployment,
    MinecraftDeploymentSpec,
    "minecraftdeployments"
);
custom_resource!(
    /// A set of Minecraft servers created from one template
    MinecraftServerSet,
    MinecraftServerSetSpec,
    "minecraftserversets"
);
custom_resource!(
    /// Minecraft servers with stable names and ordered rollout
    MinecraftStatefulSet,
    MinecraftStatefulSetSpec,
    "minecraftstatefulsets"
);

/// Desired state of a [`MinecraftServer`]
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct MinecraftServerSpec {
    /// Pod template of the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Value>,
    /// Fields not modelled here
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Desired state of a [`MinecraftDeployment`]
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct MinecraftDeploymentSpec {
    /// What the deployment runs, see [`MinecraftDeploymentType`]
    #[serde(rename = "type", default)]
    pub type_: String,
    /// Number of servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Template of every server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Value>,
    /// Fields not modelled here
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Desired state of a [`MinecraftServerSet`]
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct MinecraftServerSetSpec {
    /// Number of servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Template of every server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Value>,
    /// Fields not modelled here
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Desired state of a [`MinecraftStatefulSet`]
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct MinecraftStatefulSetSpec {
    /// Number of servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Template of every server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Value>,
    /// Fields not modelled here
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// What a [`MinecraftDeployment`] runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MinecraftDeploymentType {
    /// Proxies players connect through
    Proxy,
    /// Game servers behind the proxies
    Server,
}

impl MinecraftDeploymentType {
    /// The value of `spec.type`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proxy => "PROXY",
            Self::Server => "SERVER",
        }
    }

    /// Whether `spec.type` names this type, ignoring case
    pub fn matches(self, type_: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(type_)
    }
}

impl std::fmt::Display for MinecraftDeploymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MinecraftDeployment {
    /// The type this deployment declares, if it is a known one
    pub fn deployment_type(&self) -> Option<MinecraftDeploymentType> {
        [MinecraftDeploymentType::Proxy, MinecraftDeploymentType::Server]
            .into_iter()
            .find(|t| t.matches(&self.spec.type_))
    }
}

/// A registry holding the Strela kinds and the `Pod` kind they run on
pub fn registry() -> Registry {
    Registry::builder()
        .register::<MinecraftServer>()
        .register::<MinecraftDeployment>()
        .register::<MinecraftServerSet>()
        .register::<MinecraftStatefulSet>()
        .register::<k8s_openapi::api::core::v1::Pod>()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ResourceExt;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn registry_resolves_every_kind() {
        let registry = registry();
        let servers = registry.resolve("MinecraftServer").unwrap();
        assert_eq!(
            registry.build_path(servers, Some("games"), Some("lobby-0")),
            "/apis/strela.dev/v1/namespaces/games/minecraftservers/lobby-0"
        );
        for kind in ["MinecraftDeployment", "MinecraftServerSet", "MinecraftStatefulSet"] {
            let descriptor = registry.resolve(kind).unwrap();
            assert_eq!(descriptor.api_version(), "strela.dev/v1");
            assert!(descriptor.namespaced);
        }
        assert_eq!(
            registry.resolve("Pod").unwrap().collection_path(Some("games")),
            "/api/v1/namespaces/games/pods"
        );
        assert!(registry.resolve("MinecraftProxy").is_err());
    }

    #[test]
    fn unknown_spec_fields_survive_a_round_trip() {
        let raw = json!({
            "apiVersion": "strela.dev/v1",
            "kind": "MinecraftDeployment",
            "metadata": { "name": "lobby", "namespace": "games", "resourceVersion": "7" },
            "spec": { "type": "PROXY", "replicas": 2, "maxPlayers": 100 },
        });
        let deployment: MinecraftDeployment = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(deployment.name_any(), "lobby");
        assert_eq!(deployment.spec.other["maxPlayers"], 100);
        assert_eq!(deployment.deployment_type(), Some(MinecraftDeploymentType::Proxy));
        assert_json_eq!(serde_json::to_value(&deployment).unwrap(), raw);
    }

    #[test]
    fn new_objects_carry_their_type_fields() {
        let server = MinecraftServer::new("lobby-0", MinecraftServerSpec::default());
        assert_json_eq!(
            serde_json::to_value(&server).unwrap(),
            json!({
                "apiVersion": "strela.dev/v1",
                "kind": "MinecraftServer",
                "metadata": { "name": "lobby-0" },
                "spec": {},
            })
        );
    }

    #[test]
    fn deployment_types_match_regardless_of_case() {
        assert!(MinecraftDeploymentType::Server.matches("server"));
        assert!(MinecraftDeploymentType::Server.matches("SERVER"));
        assert!(!MinecraftDeploymentType::Proxy.matches("server"));
        let mut deployment = MinecraftDeployment::new("odd", MinecraftDeploymentSpec::default());
        deployment.spec.type_ = "lobby".into();
        assert_eq!(deployment.deployment_type(), None);
    }
}
