//! RECSTORE Store - Record Fetch Coordination
//!
//! A client-side record store. Callers ask for records by model and id; an
//! injected [`Adapter`] fetches them and a [`Serializer`] normalizes the
//! payload. The store keeps an identity map of loaded records and makes
//! sure that:
//!
//! - concurrent finds for one identity share a single adapter call
//! - `reload` forces a fetch even when a record is cached
//! - blank payloads fail loudly and id mismatches produce a warning
//! - failed first fetches leave nothing behind in the identity map
//!
//! All finds issued in one scheduler turn are flushed together, which lets
//! adapters that opt into coalescing answer them with a single `find_many`.

pub mod adapter;
mod fetch;
pub mod identity_map;
pub mod serializer;
pub mod store;
pub mod warnings;

pub use adapter::{Adapter, AdapterResult};
pub use identity_map::IdentityMap;
pub use serializer::{JsonApiSerializer, Serializer};
pub use store::{RecordFuture, Store, StoreBuilder};
pub use warnings::{StoreWarning, TracingWarnings, WarningHandler};

// Re-export core types so most callers need only this crate.
pub use recstore_core::{
    AdapterError, ArgumentError, AttributeKind, ConfigError, Document, FindOptions,
    LifecycleError, MissingIdKind, ModelSchema, PayloadError, RawId, Record, RecordIdentity,
    RecordState, RequestKind, ResourceObject, SchemaRegistry, Snapshot, StoreConfig, StoreError,
    StoreResult,
};
