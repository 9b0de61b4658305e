//! Records, snapshots and find options.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::identity::{LocalId, RecordIdentity};

/// Attribute bag of a record, keyed by attribute name.
pub type Attributes = Map<String, Value>;

/// The kind of adapter request a payload answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    FindRecord,
    FindMany,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FindRecord => "findRecord",
            Self::FindMany => "findMany",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loaded record as handed out by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub lid: LocalId,
    pub identity: RecordIdentity,
    pub attributes: Attributes,
    pub loaded_at: DateTime<Utc>,
}

impl Record {
    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn model_name(&self) -> &str {
        &self.identity.model_name
    }

    /// Look up a single attribute.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Lifecycle state of an identity-map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordState {
    /// Placeholder: first fetch in flight, no data yet.
    Loading,
    /// Data present, nothing in flight.
    Loaded,
    /// Data present and a refresh in flight.
    Reloading,
}

impl RecordState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded | Self::Reloading)
    }
}

/// Immutable view of a record handed to adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub identity: RecordIdentity,
    pub lid: LocalId,
    /// Current attributes, if the record has been loaded before.
    pub attributes: Option<Attributes>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub adapter_options: Option<Value>,
    pub include: Option<String>,
}

impl Snapshot {
    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn model_name(&self) -> &str {
        &self.identity.model_name
    }

    /// Whether the snapshot describes data that was already loaded.
    pub fn is_loaded(&self) -> bool {
        self.attributes.is_some()
    }
}

/// Options for a find.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Always ask the adapter, even if the record is loaded.
    pub reload: bool,
    /// Serve the cached record and refresh it behind the caller's back.
    /// `None` defers to the adapter and then to the store config.
    pub background_reload: Option<bool>,
    /// Free-form options passed through to the adapter via the snapshot.
    pub adapter_options: Option<Value>,
    pub include: Option<String>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with `reload` set.
    pub fn reload() -> Self {
        Self {
            reload: true,
            ..Self::default()
        }
    }

    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    pub fn with_background_reload(mut self, background_reload: bool) -> Self {
        self.background_reload = Some(background_reload);
        self
    }

    pub fn with_adapter_options(mut self, options: Value) -> Self {
        self.adapter_options = Some(options);
        self
    }

    pub fn with_include(mut self, include: impl Into<String>) -> Self {
        self.include = Some(include.into());
        self
    }
}
