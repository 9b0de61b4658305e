//! Model schemas.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::ArgumentError;

/// Declared type of a model attribute; selects its transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    String,
    Number,
    Boolean,
    #[default]
    Raw,
}

/// A registered model: its name and declared attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeKind>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Declare an attribute.
    pub fn attr(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.insert(name.into(), kind);
        self
    }

    pub fn attribute_kind(&self, name: &str) -> Option<AttributeKind> {
        self.attributes.get(name).copied()
    }
}

/// The set of models a store knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaRegistry {
    models: HashMap<String, ModelSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model, replacing any earlier schema with the same name.
    pub fn register(&mut self, schema: ModelSchema) {
        self.models.insert(schema.name.clone(), schema);
    }

    pub fn get(&self, model_name: &str) -> Option<&ModelSchema> {
        self.models.get(model_name)
    }

    /// Look up a model, failing for unregistered names.
    pub fn require(&self, model_name: &str) -> Result<&ModelSchema, ArgumentError> {
        if model_name.is_empty() {
            return Err(ArgumentError::EmptyModelName);
        }
        self.models
            .get(model_name)
            .ok_or_else(|| ArgumentError::UnknownModel {
                model_name: model_name.to_string(),
            })
    }

    pub fn contains(&self, model_name: &str) -> bool {
        self.models.contains_key(model_name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl FromIterator<ModelSchema> for SchemaRegistry {
    fn from_iter<I: IntoIterator<Item = ModelSchema>>(iter: I) -> Self {
        let mut registry = Self::new();
        for schema in iter {
            registry.register(schema);
        }
        registry
    }
}
