//! JSON:API-shaped documents exchanged between serializers and the store.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::identity::{coerce_json_id, RecordIdentity};
use crate::record::Attributes;

/// A single resource object: `{ id, type, attributes }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl ResourceObject {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            resource_type: resource_type.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Identity of this resource, if it carries an id.
    pub fn identity(&self) -> Option<RecordIdentity> {
        self.id
            .as_ref()
            .map(|id| RecordIdentity::new(self.resource_type.clone(), id.clone()))
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_json_id))
}

/// Primary data of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Many(Vec<ResourceObject>),
    Single(ResourceObject),
}

impl PrimaryData {
    pub fn resources(&self) -> &[ResourceObject] {
        match self {
            Self::Many(resources) => resources,
            Self::Single(resource) => std::slice::from_ref(resource),
        }
    }
}

/// A normalized response document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub data: Option<PrimaryData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<ResourceObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Document {
    pub fn single(resource: ResourceObject) -> Self {
        Self {
            data: Some(PrimaryData::Single(resource)),
            ..Self::default()
        }
    }

    pub fn many(resources: Vec<ResourceObject>) -> Self {
        Self {
            data: Some(PrimaryData::Many(resources)),
            ..Self::default()
        }
    }

    pub fn with_included(mut self, included: Vec<ResourceObject>) -> Self {
        self.included = included;
        self
    }

    pub fn has_primary_data(&self) -> bool {
        self.data.is_some()
    }

    /// Primary resources, empty when there is no primary data.
    pub fn primary(&self) -> &[ResourceObject] {
        self.data.as_ref().map(PrimaryData::resources).unwrap_or(&[])
    }
}

/// Whether a raw adapter payload carries anything at all.
///
/// `null`, `{}` and `[]` are blank; any other value is not.
pub fn payload_is_not_blank(payload: &Value) -> bool {
    match payload {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}
