//! The record store and its public API.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use recstore_core::{
    AdapterError, ArgumentError, ConfigError, Document, FindOptions, LifecycleError, ModelSchema,
    RawId, Record, RecordIdentity, RecordState, SchemaRegistry, StoreConfig, StoreError,
    StoreResult,
};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::adapter::Adapter;
use crate::fetch::PendingFetch;
use crate::identity_map::IdentityMap;
use crate::serializer::{JsonApiSerializer, Serializer};
use crate::warnings::{TracingWarnings, WarningHandler};

/// A pending or settled find, shareable between every caller of the same
/// identity.
pub type RecordFuture = Shared<BoxFuture<'static, StoreResult<Record>>>;

/// Mutable store state. Only touched in short critical sections that never
/// span an await.
#[derive(Default)]
pub(crate) struct StoreState {
    pub(crate) records: IdentityMap,
    pub(crate) in_flight: HashMap<RecordIdentity, RecordFuture>,
    pub(crate) pending: Vec<PendingFetch>,
    pub(crate) flush_scheduled: bool,
    pub(crate) destroyed: bool,
}

pub(crate) struct StoreInner {
    pub(crate) schemas: SchemaRegistry,
    pub(crate) adapter: Arc<dyn Adapter>,
    pub(crate) model_adapters: HashMap<String, Arc<dyn Adapter>>,
    pub(crate) serializer: Arc<dyn Serializer>,
    pub(crate) model_serializers: HashMap<String, Arc<dyn Serializer>>,
    pub(crate) warnings: Arc<dyn WarningHandler>,
    pub(crate) config: StoreConfig,
    pub(crate) state: Mutex<StoreState>,
}

/// Record store with single-flight fetch coordination.
///
/// Cloning a `Store` is cheap; clones share one identity map.
///
/// # Example
///
/// ```ignore
/// let store = Store::builder()
///     .model(ModelSchema::new("person").attr("name", AttributeKind::String))
///     .adapter(Arc::new(HttpAdapter::new(base_url)))
///     .build()?;
///
/// // Both calls share one adapter request.
/// let first = store.find_record("person", 1, FindOptions::default())?;
/// let second = store.find_record("person", "1", FindOptions::default())?;
/// assert_eq!(first.await?, second.await?);
/// ```
#[derive(Clone)]
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.inner.schemas
    }

    pub(crate) fn lock(&self) -> StoreResult<MutexGuard<'_, StoreState>> {
        self.inner.state.lock().map_err(|_| StoreError::LockPoisoned)
    }

    pub(crate) fn schema(&self, model_name: &str) -> StoreResult<&ModelSchema> {
        Ok(self.inner.schemas.require(model_name)?)
    }

    pub(crate) fn adapter_for(&self, model_name: &str) -> Arc<dyn Adapter> {
        self.inner
            .model_adapters
            .get(model_name)
            .unwrap_or(&self.inner.adapter)
            .clone()
    }

    pub(crate) fn serializer_for(&self, model_name: &str) -> Arc<dyn Serializer> {
        self.inner
            .model_serializers
            .get(model_name)
            .unwrap_or(&self.inner.serializer)
            .clone()
    }

    /// Find a record by model and id.
    ///
    /// Validation happens synchronously: a null or undefined id, an unknown
    /// model or a destroyed store fail here, before any adapter call. The
    /// returned future resolves to:
    ///
    /// - the cached record, immediately, if it is loaded and no reload was
    ///   asked for
    /// - the result of the fetch already in flight for this identity, if any
    /// - otherwise the result of a new fetch, flushed on the next scheduler
    ///   turn together with every other find issued in the same turn
    pub fn find_record(
        &self,
        model_name: &str,
        id: impl Into<RawId>,
        options: FindOptions,
    ) -> StoreResult<RecordFuture> {
        let id = id.into().require()?;
        let schema = self.schema(model_name)?;
        let identity = RecordIdentity::new(model_name, id);
        let adapter = self.adapter_for(model_name);

        let cached = {
            let state = self.live_state()?;
            state
                .records
                .peek(&identity)
                .map(|record| (record, state.records.snapshot(&identity, &options)))
        };

        // Adapter hooks run unlocked; they may call back into the store.
        if let Some((record, snapshot)) = cached {
            let reload = options.reload || adapter.should_reload_record(schema, &snapshot);
            if !reload {
                let background = options
                    .background_reload
                    .or_else(|| adapter.should_background_reload_record(schema, &snapshot))
                    .unwrap_or(self.inner.config.background_reload_default);
                if background {
                    tracing::debug!(identity = %identity, "scheduling background reload");
                    let mut state = self.live_state()?;
                    let _refresh = self.fetch_or_join(&mut state, identity, &options)?;
                } else {
                    tracing::trace!(identity = %identity, "serving cached record");
                }
                return Ok(future::ready(Ok(record)).boxed().shared());
            }
        }

        let mut state = self.live_state()?;
        self.fetch_or_join(&mut state, identity, &options)
    }

    /// Lock the state of a store that has not been destroyed.
    fn live_state(&self) -> StoreResult<MutexGuard<'_, StoreState>> {
        let state = self.lock()?;
        if state.destroyed {
            return Err(LifecycleError::Destroyed.into());
        }
        Ok(state)
    }

    /// Find several records of one model. Resolves to every record in the
    /// order of `ids`, or to the first failure.
    pub fn find_by_ids<I, T>(
        &self,
        model_name: &str,
        ids: I,
        options: FindOptions,
    ) -> StoreResult<impl Future<Output = StoreResult<Vec<Record>>> + Send + 'static>
    where
        I: IntoIterator<Item = T>,
        T: Into<RawId>,
    {
        let finds = ids
            .into_iter()
            .map(|id| self.find_record(model_name, id, options.clone()))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(future::try_join_all(finds))
    }

    /// Join the fetch in flight for `identity`, or start one.
    fn fetch_or_join(
        &self,
        state: &mut StoreState,
        identity: RecordIdentity,
        options: &FindOptions,
    ) -> StoreResult<RecordFuture> {
        if let Some(existing) = state.in_flight.get(&identity) {
            tracing::debug!(identity = %identity, "joining in-flight fetch");
            return Ok(existing.clone());
        }

        let handle = if state.flush_scheduled {
            None
        } else {
            Some(Handle::try_current().map_err(|_| LifecycleError::NoRuntime)?)
        };

        let snapshot = state.records.begin_fetch(&identity, options);
        let (resolver, settled) = oneshot::channel();
        let abandoned = AdapterError::Abandoned {
            model_name: identity.model_name.clone(),
            id: identity.id.clone(),
        };
        let future: RecordFuture = async move {
            settled
                .await
                .unwrap_or_else(|_| Err(StoreError::Adapter(abandoned)))
        }
        .boxed()
        .shared();

        state.in_flight.insert(identity.clone(), future.clone());
        tracing::debug!(identity = %identity, reload = options.reload, "scheduling fetch");
        state.pending.push(PendingFetch {
            identity,
            snapshot,
            resolver,
        });

        if let Some(handle) = handle {
            state.flush_scheduled = true;
            let store = self.clone();
            handle.spawn(async move {
                // Let every find issued in this turn enqueue before flushing.
                tokio::task::yield_now().await;
                store.flush_pending_fetches().await;
            });
        }

        Ok(future)
    }

    /// Whether a loaded record exists for the identity.
    ///
    /// Placeholders of fetches still in flight do not count.
    pub fn has_record_for_id(&self, model_name: &str, id: impl Into<RawId>) -> bool {
        let Ok(id) = id.into().require() else {
            return false;
        };
        self.lock()
            .map(|state| {
                state
                    .records
                    .has_loaded(&RecordIdentity::new(model_name, id))
            })
            .unwrap_or(false)
    }

    /// The loaded record for an identity, without fetching.
    pub fn peek_record(&self, model_name: &str, id: impl Into<RawId>) -> Option<Record> {
        let id = id.into().require().ok()?;
        let state = self.lock().ok()?;
        state.records.peek(&RecordIdentity::new(model_name, id))
    }

    /// Every loaded record of a model.
    pub fn peek_all(&self, model_name: &str) -> Vec<Record> {
        self.lock()
            .map(|state| state.records.loaded_of(model_name))
            .unwrap_or_default()
    }

    /// Lifecycle state of an identity, `None` when the store knows nothing
    /// about it.
    pub fn record_state(&self, model_name: &str, id: impl Into<RawId>) -> Option<RecordState> {
        let id = id.into().require().ok()?;
        let state = self.lock().ok()?;
        state.records.state(&RecordIdentity::new(model_name, id))
    }

    /// Load already-normalized data into the identity map.
    ///
    /// Returns the primary records followed by the included ones.
    pub fn push(&self, document: Document) -> StoreResult<Vec<Record>> {
        let Document { data, included, .. } = document;
        let resources: Vec<_> = data
            .map(|d| d.resources().to_vec())
            .unwrap_or_default()
            .into_iter()
            .chain(included)
            .collect();

        let mut identities = Vec::with_capacity(resources.len());
        for resource in &resources {
            self.schema(&resource.resource_type)?;
            let identity = resource.identity().ok_or_else(|| ArgumentError::InvalidId {
                received: "null".to_string(),
            })?;
            identities.push(identity);
        }

        let mut state = self.live_state()?;
        Ok(identities
            .into_iter()
            .zip(resources)
            .map(|(identity, resource)| state.records.push(identity, resource.attributes))
            .collect())
    }

    /// Remove a record from the identity map. A fetch in flight for it still
    /// settles and may load it again.
    pub fn unload_record(&self, model_name: &str, id: impl Into<RawId>) -> bool {
        let Ok(id) = id.into().require() else {
            return false;
        };
        self.lock()
            .map(|mut state| state.records.unload(&RecordIdentity::new(model_name, id)))
            .unwrap_or(false)
    }

    /// Tear the store down: drop every record and forget in-flight fetches.
    /// Fetches that settle afterwards do not write anything.
    pub fn destroy(&self) -> StoreResult<()> {
        let mut state = self.lock()?;
        if state.destroyed {
            return Ok(());
        }
        state.destroyed = true;
        let dropped = state.records.len();
        state.records.clear();
        state.in_flight.clear();
        tracing::info!(records = dropped, "store destroyed");
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().map(|state| state.destroyed).unwrap_or(true)
    }
}

/// Builder for [`Store`].
#[derive(Default)]
pub struct StoreBuilder {
    schemas: SchemaRegistry,
    adapter: Option<Arc<dyn Adapter>>,
    model_adapters: HashMap<String, Arc<dyn Adapter>>,
    serializer: Option<Arc<dyn Serializer>>,
    model_serializers: HashMap<String, Arc<dyn Serializer>>,
    warnings: Option<Arc<dyn WarningHandler>>,
    config: StoreConfig,
}

impl StoreBuilder {
    /// Register a model.
    pub fn model(mut self, schema: ModelSchema) -> Self {
        self.schemas.register(schema);
        self
    }

    /// Adapter used for every model without its own.
    pub fn adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn model_adapter(mut self, model_name: impl Into<String>, adapter: Arc<dyn Adapter>) -> Self {
        self.model_adapters.insert(model_name.into(), adapter);
        self
    }

    /// Serializer used for every model without its own. Defaults to
    /// [`JsonApiSerializer`].
    pub fn serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn model_serializer(
        mut self,
        model_name: impl Into<String>,
        serializer: Arc<dyn Serializer>,
    ) -> Self {
        self.model_serializers.insert(model_name.into(), serializer);
        self
    }

    /// Where warnings go. Defaults to [`TracingWarnings`].
    pub fn warnings(mut self, handler: Arc<dyn WarningHandler>) -> Self {
        self.warnings = Some(handler);
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> StoreResult<Store> {
        self.config.validate()?;
        let adapter = self.adapter.ok_or_else(|| ConfigError::MissingRequired {
            field: "adapter".to_string(),
        })?;

        Ok(Store {
            inner: Arc::new(StoreInner {
                schemas: self.schemas,
                adapter,
                model_adapters: self.model_adapters,
                serializer: self
                    .serializer
                    .unwrap_or_else(|| Arc::new(JsonApiSerializer::new())),
                model_serializers: self.model_serializers,
                warnings: self.warnings.unwrap_or_else(|| Arc::new(TracingWarnings)),
                config: self.config,
                state: Mutex::new(StoreState::default()),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterResult;
    use async_trait::async_trait;
    use recstore_core::{AttributeKind, ResourceObject, Snapshot};
    use serde_json::{json, Value};

    struct NeverCalled;

    #[async_trait]
    impl Adapter for NeverCalled {
        async fn find_record(
            &self,
            _model: &ModelSchema,
            _id: &str,
            _snapshot: &Snapshot,
        ) -> AdapterResult<Value> {
            panic!("adapter should not be called");
        }
    }

    fn store() -> Store {
        Store::builder()
            .model(ModelSchema::new("person").attr("name", AttributeKind::String))
            .adapter(Arc::new(NeverCalled))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let result = Store::builder()
            .adapter(Arc::new(NeverCalled))
            .config(StoreConfig::default().with_max_coalesced_ids(0))
            .build();
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn test_push_loads_primary_and_included() {
        let store = store();
        let records = store
            .push(
                Document::single(
                    ResourceObject::new("person", "1").with_attribute("name", json!("A")),
                )
                .with_included(vec![ResourceObject::new("person", "2")]),
            )
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id(), "1");
        assert!(store.has_record_for_id("person", 1));
        assert!(store.has_record_for_id("person", "2"));
        assert_eq!(store.peek_all("person").len(), 2);
    }

    #[test]
    fn test_push_rejects_unregistered_type() {
        let store = store();
        let err = store
            .push(Document::single(ResourceObject::new("dog", "1")))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Argument(ArgumentError::UnknownModel { .. })
        ));
        assert!(store.peek_all("dog").is_empty());
    }

    #[test]
    fn test_push_after_destroy_fails() {
        let store = store();
        store.destroy().unwrap();
        let err = store
            .push(Document::single(ResourceObject::new("person", "1")))
            .unwrap_err();
        assert_eq!(err, StoreError::Lifecycle(LifecycleError::Destroyed));
    }

    #[test]
    fn test_lookups_with_missing_ids_are_empty() {
        let store = store();
        assert!(!store.has_record_for_id("person", RawId::Null));
        assert_eq!(store.peek_record("person", RawId::Undefined), None);
        assert_eq!(store.record_state("person", ""), None);
        assert!(!store.unload_record("person", RawId::Null));
    }

    #[tokio::test]
    async fn test_cached_find_resolves_without_adapter() {
        let store = store();
        store
            .push(Document::single(ResourceObject::new("person", "1")))
            .unwrap();
        let record = store
            .find_record("person", 1, FindOptions::default())
            .unwrap()
            .await
            .unwrap();
        assert_eq!(record.id(), "1");
    }
}
