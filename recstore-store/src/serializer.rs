//! Serializer trait and the default JSON:API serializer.

use recstore_core::{
    transform_for, Document, ModelSchema, PayloadError, PrimaryData, RequestKind, ResourceObject,
    SchemaRegistry, StoreResult,
};
use serde_json::Value;

/// Turns a raw adapter payload into a normalized [`Document`].
pub trait Serializer: Send + Sync {
    /// Normalize the payload of a `request` for `model`.
    ///
    /// `id` is the requested id for single-record requests.
    fn normalize_response(
        &self,
        registry: &SchemaRegistry,
        model: &ModelSchema,
        payload: Value,
        id: Option<&str>,
        request: RequestKind,
    ) -> StoreResult<Document>;
}

/// Serializer for payloads that already follow the JSON:API document shape.
///
/// Resource ids are coerced to strings, resource types must be registered
/// models, and only attributes declared by the model survive, each passed
/// through the transform for its kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonApiSerializer;

impl JsonApiSerializer {
    pub fn new() -> Self {
        Self
    }

    fn normalize_resource(
        &self,
        registry: &SchemaRegistry,
        resource: &mut ResourceObject,
    ) -> StoreResult<()> {
        let schema =
            registry
                .get(&resource.resource_type)
                .ok_or_else(|| PayloadError::UnknownType {
                    resource_type: resource.resource_type.clone(),
                })?;

        let raw = std::mem::take(&mut resource.attributes);
        resource.attributes = raw
            .into_iter()
            .filter_map(|(name, value)| {
                schema
                    .attribute_kind(&name)
                    .map(|kind| (name, transform_for(kind).deserialize(&value)))
            })
            .collect();
        Ok(())
    }
}

impl Serializer for JsonApiSerializer {
    fn normalize_response(
        &self,
        registry: &SchemaRegistry,
        model: &ModelSchema,
        payload: Value,
        _id: Option<&str>,
        request: RequestKind,
    ) -> StoreResult<Document> {
        let mut document: Document =
            serde_json::from_value(payload).map_err(|e| PayloadError::Malformed {
                request,
                model_name: model.name.clone(),
                reason: e.to_string(),
            })?;

        match document.data.as_mut() {
            Some(PrimaryData::Single(resource)) => self.normalize_resource(registry, resource)?,
            Some(PrimaryData::Many(resources)) => {
                for resource in resources.iter_mut() {
                    self.normalize_resource(registry, resource)?;
                }
            }
            None => {}
        }
        for resource in document.included.iter_mut() {
            self.normalize_resource(registry, resource)?;
        }

        Ok(document)
    }
}
