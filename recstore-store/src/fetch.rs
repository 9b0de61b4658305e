//! Fetch flushing and settlement.
//!
//! Finds enqueue a [`PendingFetch`]; a spawned task flushes the queue one
//! scheduler turn later. Flushing groups pending fetches by model, hands
//! coalesced groups to `find_many` and everything else to `find_record`,
//! validates each payload, updates the identity map and resolves the shared
//! future every waiter of that identity holds.

use std::collections::HashMap;

use futures_util::future::{self, BoxFuture, FutureExt};
use recstore_core::{
    payload_is_not_blank, LifecycleError, ModelSchema, PayloadError, PrimaryData, Record,
    RecordIdentity, RequestKind, Snapshot, StoreError, StoreResult,
};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::store::{RecordFuture, Store};
use crate::warnings::StoreWarning;

/// A fetch waiting for the next flush.
pub(crate) struct PendingFetch {
    pub(crate) identity: RecordIdentity,
    pub(crate) snapshot: Snapshot,
    pub(crate) resolver: oneshot::Sender<StoreResult<Record>>,
}

impl Store {
    /// Run every queued fetch. Completes once all of them have settled.
    pub(crate) async fn flush_pending_fetches(&self) {
        let pending = match self.take_pending() {
            Ok(pending) => pending,
            Err(err) => {
                tracing::error!(error = %err, "could not drain pending fetches");
                return;
            }
        };
        if pending.is_empty() {
            return;
        }
        tracing::debug!(count = pending.len(), "flushing pending fetches");
        let _guard = FlushGuard::new(self, &pending);

        let mut fetches: Vec<BoxFuture<'_, ()>> = Vec::new();
        for (model_name, batch) in group_by_model(pending) {
            let schema = match self.schema(&model_name) {
                Ok(schema) => schema,
                Err(err) => {
                    for fetch in batch {
                        self.resolve(fetch, Err(err.clone()));
                    }
                    continue;
                }
            };
            let adapter = self.adapter_for(&model_name);

            if !adapter.coalesce_find_requests() || batch.len() < 2 {
                fetches.extend(batch.into_iter().map(move |f| self.fetch_one(schema, f).boxed()));
                continue;
            }

            let snapshots: Vec<Snapshot> = batch.iter().map(|f| f.snapshot.clone()).collect();
            let mut by_identity: HashMap<RecordIdentity, PendingFetch> = batch
                .into_iter()
                .map(|f| (f.identity.clone(), f))
                .collect();

            for group in adapter.group_records_for_find_many(schema, &snapshots) {
                for chunk in group.chunks(self.inner.config.max_coalesced_ids) {
                    let mut members: Vec<PendingFetch> = chunk
                        .iter()
                        .filter_map(|s| by_identity.remove(&s.identity))
                        .collect();
                    match members.len() {
                        0 => {}
                        1 => {
                            let only = members.remove(0);
                            fetches.push(self.fetch_one(schema, only).boxed());
                        }
                        _ => fetches.push(self.fetch_many(schema, members).boxed()),
                    }
                }
            }
            // Anything the adapter left out of its groups goes on its own.
            fetches.extend(
                by_identity
                    .into_values()
                    .map(move |f| self.fetch_one(schema, f).boxed()),
            );
        }

        future::join_all(fetches).await;
    }

    fn take_pending(&self) -> StoreResult<Vec<PendingFetch>> {
        let mut state = self.lock()?;
        state.flush_scheduled = false;
        Ok(std::mem::take(&mut state.pending))
    }

    /// Fetch a single record through `find_record`.
    async fn fetch_one(&self, schema: &ModelSchema, fetch: PendingFetch) {
        let adapter = self.adapter_for(&schema.name);
        let outcome = match adapter
            .find_record(schema, &fetch.identity.id, &fetch.snapshot)
            .await
        {
            Ok(payload) => self.settle_find_record(schema, &fetch.identity, payload),
            Err(err) => Err(err.into()),
        };
        self.resolve(fetch, outcome);
    }

    /// Fetch a coalesced group through `find_many`.
    async fn fetch_many(&self, schema: &ModelSchema, fetches: Vec<PendingFetch>) {
        let adapter = self.adapter_for(&schema.name);
        let ids: Vec<String> = fetches.iter().map(|f| f.identity.id.clone()).collect();
        let snapshots: Vec<Snapshot> = fetches.iter().map(|f| f.snapshot.clone()).collect();
        tracing::debug!(model = %schema.name, ids = ?ids, "coalesced find_many");

        let settled = match adapter.find_many(schema, &ids, &snapshots).await {
            Ok(payload) => self.settle_find_many(schema, &fetches, payload),
            Err(err) => Err(err.into()),
        };

        match settled {
            Ok(mut loaded) => {
                for fetch in fetches {
                    let outcome = loaded.remove(&fetch.identity.id).ok_or_else(|| {
                        StoreError::from(PayloadError::MissingFromFindMany {
                            model_name: schema.name.clone(),
                            requested: ids.clone(),
                            missing_id: fetch.identity.id.clone(),
                        })
                    });
                    self.resolve(fetch, outcome);
                }
            }
            Err(err) => {
                for fetch in fetches {
                    self.resolve(fetch, Err(err.clone()));
                }
            }
        }
    }

    /// Validate a `find_record` payload and load its data.
    fn settle_find_record(
        &self,
        schema: &ModelSchema,
        requested: &RecordIdentity,
        payload: Value,
    ) -> StoreResult<Record> {
        let empty = || {
            StoreError::from(PayloadError::EmptyPayload {
                request: RequestKind::FindRecord,
                model_name: schema.name.clone(),
                ids: vec![requested.id.clone()],
            })
        };
        if !payload_is_not_blank(&payload) {
            return Err(empty());
        }

        let document = self.serializer_for(&schema.name).normalize_response(
            &self.inner.schemas,
            schema,
            payload,
            Some(&requested.id),
            RequestKind::FindRecord,
        )?;
        let primary = match &document.data {
            Some(PrimaryData::Single(resource)) => resource,
            Some(PrimaryData::Many(_)) => {
                return Err(PayloadError::PrimaryDataShape {
                    request: RequestKind::FindRecord,
                    expected: "a single resource object",
                }
                .into())
            }
            None => return Err(empty()),
        };
        if primary.resource_type != schema.name {
            return Err(PayloadError::TypeMismatch {
                request: RequestKind::FindRecord,
                model_name: schema.name.clone(),
                id: requested.id.clone(),
                returned_type: primary.resource_type.clone(),
            }
            .into());
        }
        let returned_id = primary.id.clone().ok_or_else(|| PayloadError::Malformed {
            request: RequestKind::FindRecord,
            model_name: schema.name.clone(),
            reason: "primary data has no id".to_string(),
        })?;

        if returned_id != requested.id && self.inner.config.warn_on_id_mismatch {
            self.inner.warnings.warn(&StoreWarning::IdMismatch {
                model_name: schema.name.clone(),
                requested_id: requested.id.clone(),
                returned_id: returned_id.clone(),
            });
        }

        let mut state = self.lock()?;
        if state.destroyed {
            return Err(LifecycleError::Destroyed.into());
        }
        let returned = RecordIdentity::new(schema.name.clone(), returned_id);
        let record = state
            .records
            .settle(requested, returned, primary.attributes.clone());
        for resource in &document.included {
            if let Some(identity) = resource.identity() {
                state.records.push(identity, resource.attributes.clone());
            }
        }
        Ok(record)
    }

    /// Validate a `find_many` payload and load its data. Returns the loaded
    /// records of the requested model keyed by id.
    fn settle_find_many(
        &self,
        schema: &ModelSchema,
        fetches: &[PendingFetch],
        payload: Value,
    ) -> StoreResult<HashMap<String, Record>> {
        let empty = || {
            StoreError::from(PayloadError::EmptyPayload {
                request: RequestKind::FindMany,
                model_name: schema.name.clone(),
                ids: fetches.iter().map(|f| f.identity.id.clone()).collect(),
            })
        };
        if !payload_is_not_blank(&payload) {
            return Err(empty());
        }

        let document = self.serializer_for(&schema.name).normalize_response(
            &self.inner.schemas,
            schema,
            payload,
            None,
            RequestKind::FindMany,
        )?;
        if !document.has_primary_data() {
            return Err(empty());
        }

        let mut state = self.lock()?;
        if state.destroyed {
            return Err(LifecycleError::Destroyed.into());
        }
        let mut loaded = HashMap::new();
        for resource in document.primary() {
            let Some(identity) = resource.identity() else {
                continue;
            };
            let requested = identity.model_name == schema.name
                && fetches.iter().any(|f| f.identity == identity);
            let record = if requested {
                state
                    .records
                    .settle(&identity, identity.clone(), resource.attributes.clone())
            } else {
                state.records.push(identity, resource.attributes.clone())
            };
            if requested {
                loaded.insert(record.identity.id.clone(), record);
            }
        }
        for resource in &document.included {
            if let Some(identity) = resource.identity() {
                state.records.push(identity, resource.attributes.clone());
            }
        }
        Ok(loaded)
    }

    /// Finish a fetch: clear its in-flight entry, unload the placeholder on
    /// failure and hand the outcome to every waiter.
    fn resolve(&self, fetch: PendingFetch, outcome: StoreResult<Record>) {
        let PendingFetch {
            identity, resolver, ..
        } = fetch;

        match self.lock() {
            Ok(mut state) if !state.destroyed => {
                state.in_flight.remove(&identity);
                if outcome.is_err() {
                    state.records.fail_fetch(&identity);
                }
            }
            Ok(_) => {}
            Err(err) => tracing::error!(error = %err, identity = %identity, "could not settle fetch"),
        }

        if let Err(err) = &outcome {
            tracing::warn!(identity = %identity, error = %err, "fetch failed");
        }
        // Every waiter may have gone away; the fetch still counts as settled.
        let _ = resolver.send(outcome);
    }
}

/// Clears what a flush leaves unsettled when it is dropped midway, as
/// happens when an adapter or serializer panics inside the flush task.
/// Waiters see their resolver dropped and fail with `Abandoned`; the guard
/// removes the in-flight entries and placeholders so later finds fetch
/// again.
struct FlushGuard<'a> {
    store: &'a Store,
    fetches: Vec<(RecordIdentity, RecordFuture)>,
}

impl<'a> FlushGuard<'a> {
    fn new(store: &'a Store, pending: &[PendingFetch]) -> Self {
        let fetches = match store.lock() {
            Ok(state) => pending
                .iter()
                .filter_map(|f| {
                    state
                        .in_flight
                        .get(&f.identity)
                        .map(|future| (f.identity.clone(), future.clone()))
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        Self { store, fetches }
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        let Ok(mut state) = self.store.lock() else {
            return;
        };
        if state.destroyed {
            return;
        }
        for (identity, future) in self.fetches.drain(..) {
            // Only entries still owned by this flush; a settled fetch may
            // already have been replaced by a newer one.
            let unsettled = state
                .in_flight
                .get(&identity)
                .is_some_and(|current| current.ptr_eq(&future));
            if unsettled {
                state.in_flight.remove(&identity);
                state.records.fail_fetch(&identity);
                tracing::warn!(identity = %identity, "flush ended before fetch settled");
            }
        }
    }
}

/// Group pending fetches by model, keeping first-seen order.
fn group_by_model(pending: Vec<PendingFetch>) -> Vec<(String, Vec<PendingFetch>)> {
    let mut groups: Vec<(String, Vec<PendingFetch>)> = Vec::new();
    for fetch in pending {
        match groups
            .iter_mut()
            .find(|(model, _)| *model == fetch.identity.model_name)
        {
            Some((_, batch)) => batch.push(fetch),
            None => groups.push((fetch.identity.model_name.clone(), vec![fetch])),
        }
    }
    groups
}
