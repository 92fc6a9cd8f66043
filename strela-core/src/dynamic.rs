//! Contains types for using resource kinds not known at compile-time.
use crate::{
    metadata::TypeMeta,
    registry::RegisteredKind,
    resource::{ObjectMeta, Resource},
    ResourceDescriptor,
};

use serde::{de::Error as _, Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to parse this DynamicObject into a Resource: {source}")]
/// Failed to parse `DynamicObject` into `Resource`
pub struct ParseDynamicObjectError {
    #[from]
    source: serde_json::Error,
}

/// A dynamic representation of a kubernetes object
///
/// This will work with any non-list type object.
/// Its dynamic type is a [`RegisteredKind`] resolved from the [`Registry`](crate::Registry).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DynamicObject {
    /// The type fields, not always present
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// All other keys
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl DynamicObject {
    /// Create a DynamicObject with minimal values set from a descriptor.
    #[must_use]
    pub fn new(name: &str, descriptor: &ResourceDescriptor) -> Self {
        Self {
            types: Some(TypeMeta::of(descriptor)),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            data: serde_json::Value::Object(Default::default()),
        }
    }

    /// Attach dynamic data to a DynamicObject
    #[must_use]
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Attach a namespace to a DynamicObject
    #[must_use]
    pub fn within(mut self, ns: &str) -> Self {
        self.metadata.namespace = Some(ns.into());
        self
    }

    /// Attempt to convert this `DynamicObject` to a `Resource`
    pub fn try_parse<K: Resource + for<'a> serde::Deserialize<'a>>(
        self,
    ) -> Result<K, ParseDynamicObjectError> {
        Ok(serde_json::from_value(serde_json::to_value(self)?)?)
    }
}

impl Resource for DynamicObject {
    type DynamicType = RegisteredKind;

    fn descriptor(dt: &RegisteredKind) -> Cow<'_, ResourceDescriptor> {
        Cow::Borrowed(dt.descriptor())
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn decode(dt: &RegisteredKind, value: serde_json::Value) -> serde_json::Result<Self> {
        if let Some(codec) = dt.codec() {
            codec.decode(&value)?;
        } else if !value.is_object() {
            return Err(serde_json::Error::custom("expected a json object"));
        }
        serde_json::from_value(value)
    }

    fn encode(&self, dt: &RegisteredKind) -> serde_json::Result<Vec<u8>> {
        let value = serde_json::to_value(self)?;
        if let Some(codec) = dt.codec() {
            codec.encode(&value)?;
        }
        serde_json::to_vec(&value)
    }
}
