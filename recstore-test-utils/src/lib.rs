//! RECSTORE Test Utilities
//!
//! Shared test infrastructure for the RECSTORE workspace:
//! - Mock adapters (counting, deferred, rejecting, coalescing)
//! - A warning collector
//! - Fixtures for the `person` model and its payloads
//! - Proptest generators for ids
//! - Tracing setup for tests

// Re-export core types for convenience
pub use recstore_core::{
    AdapterError, AttributeKind, FindOptions, ModelSchema, RawId, Record, RecordIdentity,
    RecordState, Snapshot, StoreConfig, StoreError, StoreResult,
};
pub use recstore_store::{Adapter, AdapterResult, Store, StoreWarning, WarningHandler};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

// ============================================================================
// TRACING
// ============================================================================

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// FIXTURES
// ============================================================================

/// The `person` model used throughout the find tests.
pub fn person_schema() -> ModelSchema {
    ModelSchema::new("person")
        .attr("updatedAt", AttributeKind::String)
        .attr("name", AttributeKind::String)
        .attr("firstName", AttributeKind::String)
        .attr("lastName", AttributeKind::String)
}

/// A `{ data: { id, type: "person", attributes: { name } } }` payload.
pub fn person_payload(id: impl Into<Value>, name: &str) -> Value {
    json!({
        "data": {
            "id": id.into(),
            "type": "person",
            "attributes": { "name": name }
        }
    })
}

/// A `find_many` payload with one person per `(id, name)` pair.
pub fn people_payload(people: &[(&str, &str)]) -> Value {
    let data: Vec<Value> = people
        .iter()
        .map(|(id, name)| {
            json!({
                "id": id,
                "type": "person",
                "attributes": { "name": name }
            })
        })
        .collect();
    json!({ "data": data })
}

/// Build a store with the `person` model and the given adapter.
pub fn person_store(adapter: Arc<dyn Adapter>) -> Store {
    person_store_with_warnings(adapter, Arc::new(CollectingWarnings::new()))
}

/// Build a store with the `person` model, the given adapter and warning
/// handler.
pub fn person_store_with_warnings(
    adapter: Arc<dyn Adapter>,
    warnings: Arc<dyn WarningHandler>,
) -> Store {
    Store::builder()
        .model(person_schema())
        .adapter(adapter)
        .warnings(warnings)
        .build()
        .expect("person store config is valid")
}

// ============================================================================
// WARNINGS
// ============================================================================

/// Records every warning it receives.
#[derive(Debug, Default)]
pub struct CollectingWarnings {
    warnings: Mutex<Vec<StoreWarning>>,
}

impl CollectingWarnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<StoreWarning> {
        self.warnings.lock().expect("warnings lock").clone()
    }

    pub fn len(&self) -> usize {
        self.warnings.lock().expect("warnings lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WarningHandler for CollectingWarnings {
    fn warn(&self, warning: &StoreWarning) {
        self.warnings
            .lock()
            .expect("warnings lock")
            .push(warning.clone());
    }
}

// ============================================================================
// MOCK ADAPTERS
// ============================================================================

type Responder = dyn Fn(&str) -> AdapterResult<Value> + Send + Sync;

/// Answers `find_record` immediately from a closure and counts calls.
pub struct CountingAdapter {
    responder: Box<Responder>,
    find_record_calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl CountingAdapter {
    /// Answer every request with `responder(id)`.
    pub fn new(responder: impl Fn(&str) -> AdapterResult<Value> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            find_record_calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the same payload.
    pub fn returning(payload: Value) -> Self {
        Self::new(move |_| Ok(payload.clone()))
    }

    /// Answer every request with a person named `name` under the requested id.
    pub fn people(name: &'static str) -> Self {
        Self::new(move |id| Ok(person_payload(id, name)))
    }

    pub fn find_record_calls(&self) -> usize {
        self.find_record_calls.load(Ordering::SeqCst)
    }

    /// Ids passed to `find_record`, in call order.
    pub fn requested_ids(&self) -> Vec<String> {
        self.requested.lock().expect("requested lock").clone()
    }
}

#[async_trait]
impl Adapter for CountingAdapter {
    async fn find_record(
        &self,
        _model: &ModelSchema,
        id: &str,
        _snapshot: &Snapshot,
    ) -> AdapterResult<Value> {
        self.find_record_calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .expect("requested lock")
            .push(id.to_string());
        (self.responder)(id)
    }
}

/// Rejects every request.
#[derive(Debug, Default)]
pub struct RejectingAdapter {
    calls: AtomicUsize,
}

impl RejectingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Adapter for RejectingAdapter {
    async fn find_record(
        &self,
        model: &ModelSchema,
        id: &str,
        _snapshot: &Snapshot,
    ) -> AdapterResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AdapterError::Rejected {
            reason: format!("{} {} is unavailable", model.name, id),
        })
    }
}

/// `find_record` stays pending until the test resolves it.
#[derive(Debug, Default)]
pub struct DeferredAdapter {
    waiting: Mutex<VecDeque<oneshot::Sender<AdapterResult<Value>>>>,
    calls: AtomicUsize,
}

impl DeferredAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Yield to the scheduler until at least `n` requests have arrived.
    pub async fn wait_for_calls(&self, n: usize) {
        for _ in 0..1_000 {
            if self.calls() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {} adapter calls, saw {}", n, self.calls());
    }

    /// Settle the oldest pending request. Returns false if none is waiting.
    pub fn resolve_next(&self, result: AdapterResult<Value>) -> bool {
        let next = self.waiting.lock().expect("waiting lock").pop_front();
        match next {
            Some(sender) => sender.send(result).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Adapter for DeferredAdapter {
    async fn find_record(
        &self,
        model: &ModelSchema,
        id: &str,
        _snapshot: &Snapshot,
    ) -> AdapterResult<Value> {
        let (sender, receiver) = oneshot::channel();
        self.waiting
            .lock()
            .expect("waiting lock")
            .push_back(sender);
        self.calls.fetch_add(1, Ordering::SeqCst);
        receiver.await.unwrap_or_else(|_| {
            Err(AdapterError::Abandoned {
                model_name: model.name.clone(),
                id: id.to_string(),
            })
        })
    }
}

/// Opts into coalescing and answers `find_many` from a closure.
pub struct CoalescingAdapter {
    responder: Box<dyn Fn(&[String]) -> AdapterResult<Value> + Send + Sync>,
    find_many_calls: Mutex<Vec<Vec<String>>>,
    find_record_calls: AtomicUsize,
}

impl CoalescingAdapter {
    pub fn new(
        responder: impl Fn(&[String]) -> AdapterResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            find_many_calls: Mutex::new(Vec::new()),
            find_record_calls: AtomicUsize::new(0),
        }
    }

    /// Answer every `find_many` with the same payload.
    pub fn returning(payload: Value) -> Self {
        Self::new(move |_| Ok(payload.clone()))
    }

    /// Answer with one person per requested id, named after the id.
    pub fn echoing() -> Self {
        Self::new(|ids| {
            let people: Vec<(&str, &str)> = ids.iter().map(|id| (id.as_str(), id.as_str())).collect();
            Ok(people_payload(&people))
        })
    }

    /// Id lists passed to `find_many`, one entry per call.
    pub fn find_many_calls(&self) -> Vec<Vec<String>> {
        self.find_many_calls.lock().expect("calls lock").clone()
    }

    pub fn find_record_calls(&self) -> usize {
        self.find_record_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Adapter for CoalescingAdapter {
    async fn find_record(
        &self,
        model: &ModelSchema,
        id: &str,
        _snapshot: &Snapshot,
    ) -> AdapterResult<Value> {
        self.find_record_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "data": { "id": id, "type": model.name, "attributes": { "name": id } }
        }))
    }

    async fn find_many(
        &self,
        _model: &ModelSchema,
        ids: &[String],
        _snapshots: &[Snapshot],
    ) -> AdapterResult<Value> {
        self.find_many_calls
            .lock()
            .expect("calls lock")
            .push(ids.to_vec());
        (self.responder)(ids)
    }

    fn coalesce_find_requests(&self) -> bool {
        true
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    use super::RawId;
    use proptest::prelude::*;

    /// Valid ids: positive integers or non-empty alphanumeric text.
    pub fn arb_valid_id() -> impl Strategy<Value = RawId> {
        prop_oneof![
            (1i64..1_000_000).prop_map(RawId::Int),
            "[a-z0-9-]{1,12}".prop_map(RawId::Text),
        ]
    }

    /// Integer ids paired with their text spelling.
    pub fn arb_int_id_spellings() -> impl Strategy<Value = (RawId, RawId)> {
        (0i64..1_000_000).prop_map(|n| (RawId::Int(n), RawId::Text(n.to_string())))
    }
}
