//! Identity map: one entry per record identity, owned by a single store.
//!
//! Entries move through `Loading -> Loaded` (or are dropped on failure).
//! When an adapter answers with a different id than was requested, the
//! entry is re-keyed under the returned identity and an alias keeps the
//! requested identity pointing at it.

use std::collections::HashMap;

use chrono::Utc;
use recstore_core::{
    new_local_id, Attributes, FindOptions, LocalId, Record, RecordIdentity, RecordState, Snapshot,
};

/// Longest alias chain followed before giving up.
const MAX_ALIAS_HOPS: usize = 8;

#[derive(Debug, Clone)]
struct Entry {
    lid: LocalId,
    record: Option<Record>,
    in_flight: bool,
}

impl Entry {
    fn placeholder() -> Self {
        Self {
            lid: new_local_id(),
            record: None,
            in_flight: true,
        }
    }

    fn state(&self) -> RecordState {
        match (&self.record, self.in_flight) {
            (None, _) => RecordState::Loading,
            (Some(_), false) => RecordState::Loaded,
            (Some(_), true) => RecordState::Reloading,
        }
    }
}

/// Records known to a store, keyed by canonical identity.
#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: HashMap<RecordIdentity, Entry>,
    aliases: HashMap<RecordIdentity, RecordIdentity>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow aliases to the identity an entry is actually stored under.
    pub fn resolve(&self, identity: &RecordIdentity) -> RecordIdentity {
        let mut current = identity;
        for _ in 0..MAX_ALIAS_HOPS {
            match self.aliases.get(current) {
                Some(next) if next != current => current = next,
                _ => break,
            }
        }
        current.clone()
    }

    pub fn state(&self, identity: &RecordIdentity) -> Option<RecordState> {
        self.entries.get(&self.resolve(identity)).map(Entry::state)
    }

    /// The loaded record for an identity, if any.
    pub fn peek(&self, identity: &RecordIdentity) -> Option<Record> {
        self.entries
            .get(&self.resolve(identity))
            .and_then(|entry| entry.record.clone())
    }

    pub fn has_loaded(&self, identity: &RecordIdentity) -> bool {
        self.peek(identity).is_some()
    }

    /// All loaded records of a model.
    pub fn loaded_of(&self, model_name: &str) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .entries
            .iter()
            .filter(|(identity, _)| identity.model_name == model_name)
            .filter_map(|(_, entry)| entry.record.clone())
            .collect();
        records.sort_by(|a, b| a.lid.cmp(&b.lid));
        records
    }

    /// Snapshot of an identity as it currently stands, without touching state.
    pub fn snapshot(&self, identity: &RecordIdentity, options: &FindOptions) -> Snapshot {
        let entry = self.entries.get(&self.resolve(identity));
        let record = entry.and_then(|e| e.record.as_ref());
        Snapshot {
            identity: identity.clone(),
            lid: entry.map(|e| e.lid).unwrap_or_else(new_local_id),
            attributes: record.map(|r| r.attributes.clone()),
            loaded_at: record.map(|r| r.loaded_at),
            adapter_options: options.adapter_options.clone(),
            include: options.include.clone(),
        }
    }

    /// Mark an identity as being fetched, creating a placeholder if needed.
    pub fn begin_fetch(&mut self, identity: &RecordIdentity, options: &FindOptions) -> Snapshot {
        let key = self.resolve(identity);
        self.entries
            .entry(key)
            .and_modify(|entry| entry.in_flight = true)
            .or_insert_with(Entry::placeholder);
        self.snapshot(identity, options)
    }

    /// Settle a fetch for `requested` with data the adapter returned under
    /// `returned`.
    ///
    /// Aliases never cross models: data returned under another model is
    /// loaded as-is and the requested fetch counts as failed.
    pub fn settle(
        &mut self,
        requested: &RecordIdentity,
        returned: RecordIdentity,
        attributes: Attributes,
    ) -> Record {
        if requested.model_name != returned.model_name {
            self.fail_fetch(requested);
            return self.push(returned, attributes);
        }
        let source = self.resolve(requested);
        let source_entry = if source != returned {
            self.entries.remove(&source)
        } else {
            None
        };
        if requested != &returned {
            self.aliases.insert(requested.clone(), returned.clone());
        }
        if source != returned && source != *requested {
            self.aliases.insert(source.clone(), returned.clone());
        }
        // A record that now lives under its own id needs no alias.
        self.aliases.remove(&returned);

        let existing = self.entries.get(&returned);
        let lid = existing
            .map(|e| e.lid)
            .or_else(|| source_entry.as_ref().map(|e| e.lid))
            .unwrap_or_else(new_local_id);
        // Another fetch may still be running against the returned identity.
        let in_flight = source_entry.is_some() && existing.map(|e| e.in_flight).unwrap_or(false);

        self.store(returned, lid, attributes, in_flight)
    }

    /// Load data that was not the answer to a fetch (pushes, included and
    /// unrequested resources). An in-flight fetch for the identity stays
    /// in flight.
    pub fn push(&mut self, identity: RecordIdentity, attributes: Attributes) -> Record {
        let key = self.resolve(&identity);
        let (lid, in_flight) = self
            .entries
            .get(&key)
            .map(|e| (e.lid, e.in_flight))
            .unwrap_or_else(|| (new_local_id(), false));
        self.store(key, lid, attributes, in_flight)
    }

    fn store(
        &mut self,
        identity: RecordIdentity,
        lid: LocalId,
        attributes: Attributes,
        in_flight: bool,
    ) -> Record {
        let record = Record {
            lid,
            identity: identity.clone(),
            attributes,
            loaded_at: Utc::now(),
        };
        self.entries.insert(
            identity,
            Entry {
                lid,
                record: Some(record.clone()),
                in_flight,
            },
        );
        record
    }

    /// Settle a failed fetch: a placeholder is unloaded, a loaded record
    /// keeps its data.
    pub fn fail_fetch(&mut self, requested: &RecordIdentity) {
        let key = self.resolve(requested);
        let unload = match self.entries.get_mut(&key) {
            Some(entry) if entry.record.is_none() => true,
            Some(entry) => {
                entry.in_flight = false;
                false
            }
            None => false,
        };
        if unload {
            self.unload(&key);
        }
    }

    /// Remove an entry and every alias that points at it.
    pub fn unload(&mut self, identity: &RecordIdentity) -> bool {
        let key = self.resolve(identity);
        let removed = self.entries.remove(&key).is_some();
        self.aliases
            .retain(|from, to| to != &key && from != &key && from != identity);
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.aliases.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
