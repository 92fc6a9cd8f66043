use std::fmt::{Display, Formatter};

use strela_core::{Resource, ResourceExt};

/// The cache key of an object: its namespace (if any) and name
///
/// ```
/// use strela_runtime::reflector::ObjectRef;
/// assert_eq!(ObjectRef::new("lobby-0").within("games").to_string(), "games/lobby-0");
/// assert_ne!(ObjectRef::new("lobby-0"), ObjectRef::new("lobby-0").within("games"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub struct ObjectRef {
    /// The namespace of the object
    ///
    /// Only `None` for cluster scoped kinds.
    pub namespace: Option<String>,
    /// The name of the object
    pub name: String,
}

impl ObjectRef {
    /// A reference to a cluster scoped object
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Scope the reference to a namespace
    #[must_use]
    pub fn within(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    /// The reference of an object, taken from its metadata
    #[must_use]
    pub fn from_obj<K: Resource>(obj: &K) -> Self {
        Self {
            namespace: obj.namespace(),
            name: obj.name_any(),
        }
    }

    pub(crate) fn cluster_scoped(&self) -> Self {
        Self {
            namespace: None,
            name: self.name.clone(),
        }
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(namespace) = &self.namespace {
            write!(f, "{namespace}/")?;
        }
        f.write_str(&self.name)
    }
}
