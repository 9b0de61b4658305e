//! Adapter trait: the pluggable fetch backend.
//!
//! The store never talks to a transport itself. Each fetch goes through an
//! [`Adapter`], which returns the raw payload for the serializer to
//! normalize. Besides the fetch methods, adapters expose a few policy hooks
//! the coordinator consults when deciding whether and how to fetch.

use async_trait::async_trait;
use recstore_core::{AdapterError, ModelSchema, Snapshot};
use serde_json::Value;

/// Result type for adapter calls.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Fetch backend for one or more models.
///
/// # Implementation Requirements
///
/// - `find_record` must eventually settle; the store has no way to cancel it
/// - payloads are raw JSON handed to the model's serializer unchanged
/// - implementations must be `Send + Sync` since fetches run on spawned tasks
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Fetch a single record.
    async fn find_record(
        &self,
        model: &ModelSchema,
        id: &str,
        snapshot: &Snapshot,
    ) -> AdapterResult<Value>;

    /// Fetch several records of one model in a single call.
    ///
    /// Only called when [`Adapter::coalesce_find_requests`] returns true.
    async fn find_many(
        &self,
        model: &ModelSchema,
        ids: &[String],
        snapshots: &[Snapshot],
    ) -> AdapterResult<Value> {
        let _ = (model, ids, snapshots);
        Err(AdapterError::Unsupported {
            operation: "find_many",
        })
    }

    /// Batch finds issued in the same scheduler turn into `find_many` calls.
    fn coalesce_find_requests(&self) -> bool {
        false
    }

    /// Split a coalesced batch into groups, one `find_many` call per group.
    ///
    /// Snapshots left out of every group are fetched one at a time.
    fn group_records_for_find_many(
        &self,
        model: &ModelSchema,
        snapshots: &[Snapshot],
    ) -> Vec<Vec<Snapshot>> {
        let _ = model;
        vec![snapshots.to_vec()]
    }

    /// Force a blocking reload of a record that is already loaded.
    fn should_reload_record(&self, model: &ModelSchema, snapshot: &Snapshot) -> bool {
        let _ = (model, snapshot);
        false
    }

    /// Refresh a loaded record in the background after serving it from cache.
    ///
    /// `None` leaves the decision to the store configuration.
    fn should_background_reload_record(
        &self,
        model: &ModelSchema,
        snapshot: &Snapshot,
    ) -> Option<bool> {
        let _ = (model, snapshot);
        None
    }
}
