//! Metadata structs used in traits, lists, and dynamic objects.
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ListMeta, ObjectMeta};
use serde::{Deserialize, Serialize};

/// Type information that is flattened into every kubernetes object
#[derive(Deserialize, Serialize, Clone, Default, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    /// The version of the API
    pub api_version: String,

    /// The name of the API
    pub kind: String,
}

impl TypeMeta {
    /// Type information describing objects of the given descriptor
    pub fn of(descriptor: &crate::ResourceDescriptor) -> Self {
        Self {
            api_version: descriptor.api_version(),
            kind: descriptor.kind.clone(),
        }
    }

    /// Type information describing a list of the given descriptor
    pub fn list_of(descriptor: &crate::ResourceDescriptor) -> Self {
        Self {
            api_version: descriptor.api_version(),
            kind: format!("{}List", descriptor.kind),
        }
    }
}
