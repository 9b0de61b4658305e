//! Developer-facing warnings.
//!
//! Warnings never fail a request. They are handed to a [`WarningHandler`];
//! the default one logs through `tracing`.

use std::fmt;

/// A non-fatal condition the store noticed while settling a request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreWarning {
    /// The adapter answered a single-record find with a different id.
    IdMismatch {
        model_name: String,
        requested_id: String,
        returned_id: String,
    },
}

impl fmt::Display for StoreWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdMismatch {
                model_name,
                requested_id,
                returned_id,
            } => write!(
                f,
                "You requested a record of type '{}' with id '{}' but the adapter returned a payload with primary data having an id of '{}'. Use 'find_record' when the requested id is the same as the one returned by the adapter.",
                model_name, requested_id, returned_id
            ),
        }
    }
}

/// Receives store warnings.
pub trait WarningHandler: Send + Sync {
    fn warn(&self, warning: &StoreWarning);
}

/// Logs warnings with `tracing::warn!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingWarnings;

impl WarningHandler for TracingWarnings {
    fn warn(&self, warning: &StoreWarning) {
        match warning {
            StoreWarning::IdMismatch {
                model_name,
                requested_id,
                returned_id,
            } => tracing::warn!(
                model = %model_name,
                requested_id = %requested_id,
                returned_id = %returned_id,
                "{}",
                warning
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_mismatch_message() {
        let warning = StoreWarning::IdMismatch {
            model_name: "person".to_string(),
            requested_id: "me".to_string(),
            returned_id: "1".to_string(),
        };
        assert!(warning.to_string().starts_with(
            "You requested a record of type 'person' with id 'me' but the adapter returned a payload with primary data having an id of '1'"
        ));
    }

    #[test]
    fn test_tracing_handler_accepts_warnings() {
        TracingWarnings.warn(&StoreWarning::IdMismatch {
            model_name: "person".to_string(),
            requested_id: "me".to_string(),
            returned_id: "1".to_string(),
        });
    }
}
