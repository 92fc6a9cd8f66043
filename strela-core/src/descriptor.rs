//! Static description of an API resource kind
use serde::{Deserialize, Serialize};

/// Everything needed to address a resource kind on the API server.
///
/// Descriptors are built once, when the [`Registry`](crate::Registry) is
/// initialized, and are immutable afterwards.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Resource group, empty for the core group.
    pub group: String,
    /// Version within the group
    pub version: String,
    /// Singular PascalCase name of the resource
    pub kind: String,
    /// Plural name of the resource, used in url paths
    pub plural: String,
    /// Whether objects of this kind live inside a namespace
    pub namespaced: bool,
}

impl ResourceDescriptor {
    /// Descriptor for a namespaced kind
    pub fn namespaced(group: &str, version: &str, kind: &str, plural: &str) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            plural: plural.into(),
            namespaced: true,
        }
    }

    /// Descriptor for a cluster scoped kind
    pub fn cluster_scoped(group: &str, version: &str, kind: &str, plural: &str) -> Self {
        Self {
            namespaced: false,
            ..Self::namespaced(group, version, kind, plural)
        }
    }

    /// The `apiVersion` of the kind: `version` for the core group, `group/version` otherwise.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Path to the collection of this kind
    ///
    /// Cluster scoped kinds ignore `namespace`.
    /// A namespaced kind without a namespace addresses the collection across all namespaces.
    pub fn collection_path(&self, namespace: Option<&str>) -> String {
        let prefix = if self.group.is_empty() {
            format!("/api/{}", self.version)
        } else {
            format!("/apis/{}/{}", self.group, self.version)
        };
        match namespace {
            Some(ns) if self.namespaced => format!("{prefix}/namespaces/{ns}/{}", self.plural),
            _ => format!("{prefix}/{}", self.plural),
        }
    }

    /// Path to a collection, or to a single object when `name` is set
    pub fn path(&self, namespace: Option<&str>, name: Option<&str>) -> String {
        let collection = self.collection_path(namespace);
        match name {
            Some(name) => format!("{collection}/{name}"),
            None => collection,
        }
    }
}

#[cfg(test)]
mod test {
    use super::ResourceDescriptor;

    #[test]
    fn namespaced_custom_resource_paths() {
        let d = ResourceDescriptor::namespaced("strela.dev", "v1", "MinecraftServer", "minecraftservers");
        assert_eq!(d.api_version(), "strela.dev/v1");
        assert_eq!(
            d.path(Some("lobby"), Some("hub-0")),
            "/apis/strela.dev/v1/namespaces/lobby/minecraftservers/hub-0"
        );
        assert_eq!(
            d.path(Some("lobby"), None),
            "/apis/strela.dev/v1/namespaces/lobby/minecraftservers"
        );
        assert_eq!(d.path(None, None), "/apis/strela.dev/v1/minecraftservers");
    }

    #[test]
    fn cluster_scoped_paths_drop_namespace() {
        let d = ResourceDescriptor::cluster_scoped("", "v1", "Node", "nodes");
        assert_eq!(d.api_version(), "v1");
        assert_eq!(d.path(Some("ignored"), Some("n1")), "/api/v1/nodes/n1");
    }
}
