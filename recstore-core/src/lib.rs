//! RECSTORE Core - Record Store Types
//!
//! Pure data structures shared by the store and its collaborators: record
//! identities and id coercion, records and snapshots, JSON:API documents,
//! model schemas, attribute transforms, configuration and errors.
//! No async and no I/O live here.

pub mod config;
pub mod document;
pub mod error;
pub mod identity;
pub mod record;
pub mod schema;
pub mod transform;

pub use config::StoreConfig;
pub use document::{payload_is_not_blank, Document, PrimaryData, ResourceObject};
pub use error::{
    AdapterError, ArgumentError, ConfigError, LifecycleError, MissingIdKind, PayloadError,
    StoreError, StoreResult,
};
pub use identity::{coerce_id, coerce_json_id, new_local_id, LocalId, RawId, RecordIdentity};
pub use record::{Attributes, FindOptions, Record, RecordState, RequestKind, Snapshot};
pub use schema::{AttributeKind, ModelSchema, SchemaRegistry};
pub use transform::{
    transform_for, BooleanTransform, NumberTransform, RawTransform, StringTransform, Transform,
};
