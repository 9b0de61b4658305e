//! Error types for RECSTORE operations

use crate::RequestKind;
use std::fmt;
use thiserror::Error;

/// Which invalid id value a caller passed to a find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingIdKind {
    Null,
    Undefined,
}

impl fmt::Display for MissingIdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Undefined => f.write_str("undefined"),
        }
    }
}

/// Invalid arguments, raised before any adapter interaction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("You cannot pass '{kind}' as id to the store's find method")]
    MissingId { kind: MissingIdKind },

    #[error("Expected id to be a non-empty string or number, received '{received}'")]
    InvalidId { received: String },

    #[error("No model was found for '{model_name}'")]
    UnknownModel { model_name: String },

    #[error("You need to pass a model name to the store's find method")]
    EmptyModelName,
}

/// Problems with what an adapter returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("{}", empty_payload_message(*.request, .model_name, .ids))]
    EmptyPayload {
        request: RequestKind,
        model_name: String,
        ids: Vec<String>,
    },

    #[error(
        "You made a 'findMany' request for '{model_name}' records with ids '[{}]', but the adapter's response did not include a record with id '{missing_id}'",
        .requested.join(",")
    )]
    MissingFromFindMany {
        model_name: String,
        requested: Vec<String>,
        missing_id: String,
    },

    #[error("Malformed '{request}' response for '{model_name}': {reason}")]
    Malformed {
        request: RequestKind,
        model_name: String,
        reason: String,
    },

    #[error("Payload contained a resource of unknown type '{resource_type}'")]
    UnknownType { resource_type: String },

    #[error("A '{request}' response must contain {expected} as primary data")]
    PrimaryDataShape {
        request: RequestKind,
        expected: &'static str,
    },

    #[error(
        "You made a '{request}' request for a '{model_name}' with id '{id}', but the adapter's response had primary data of type '{returned_type}'"
    )]
    TypeMismatch {
        request: RequestKind,
        model_name: String,
        id: String,
        returned_type: String,
    },
}

fn empty_payload_message(request: RequestKind, model_name: &str, ids: &[String]) -> String {
    match request {
        RequestKind::FindRecord => format!(
            "You made a '{}' request for a '{}' with id '{}', but the adapter's response did not have any data",
            request,
            model_name,
            ids.join(",")
        ),
        RequestKind::FindMany => format!(
            "You made a '{}' request for '{}' records with ids '[{}]', but the adapter's response did not have any data",
            request,
            model_name,
            ids.join(",")
        ),
    }
}

/// Adapter-side failures, delivered unchanged to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("Adapter rejected the request: {reason}")]
    Rejected { reason: String },

    #[error("Adapter does not implement {operation}")]
    Unsupported { operation: &'static str },

    #[error("Fetch for '{model_name}' with id '{id}' was abandoned before it settled")]
    Abandoned { model_name: String, id: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Store lifecycle errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Attempted to use a store after it was destroyed")]
    Destroyed,

    #[error("No async runtime is available to schedule fetches")]
    NoRuntime,
}

/// Master error type for all RECSTORE errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid argument: {0}")]
    Argument(#[from] ArgumentError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Result type alias for RECSTORE operations.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_id_messages_are_distinct() {
        let undefined = ArgumentError::MissingId {
            kind: MissingIdKind::Undefined,
        };
        let null = ArgumentError::MissingId {
            kind: MissingIdKind::Null,
        };
        assert_eq!(
            undefined.to_string(),
            "You cannot pass 'undefined' as id to the store's find method"
        );
        assert_eq!(
            null.to_string(),
            "You cannot pass 'null' as id to the store's find method"
        );
    }

    #[test]
    fn test_empty_payload_display_find_record() {
        let err = PayloadError::EmptyPayload {
            request: RequestKind::FindRecord,
            model_name: "person".to_string(),
            ids: vec!["the-id".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "You made a 'findRecord' request for a 'person' with id 'the-id', but the adapter's response did not have any data"
        );
    }

    #[test]
    fn test_empty_payload_display_find_many() {
        let err = PayloadError::EmptyPayload {
            request: RequestKind::FindMany,
            model_name: "person".to_string(),
            ids: vec!["1".to_string(), "2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "You made a 'findMany' request for 'person' records with ids '[1,2]', but the adapter's response did not have any data"
        );
    }

    #[test]
    fn test_type_mismatch_names_both_types() {
        let err = PayloadError::TypeMismatch {
            request: RequestKind::FindRecord,
            model_name: "person".to_string(),
            id: "1".to_string(),
            returned_type: "dog".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("for a 'person' with id '1'"));
        assert!(msg.contains("of type 'dog'"));
    }

    #[test]
    fn test_missing_from_find_many_names_the_id() {
        let err = PayloadError::MissingFromFindMany {
            model_name: "person".to_string(),
            requested: vec!["1".to_string(), "2".to_string()],
            missing_id: "2".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'[1,2]'"));
        assert!(msg.contains("with id '2'"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "max_coalesced_ids".to_string(),
            value: "0".to_string(),
            reason: "must be greater than 0".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("max_coalesced_ids"));
        assert!(msg.contains("must be greater than 0"));
    }

    #[test]
    fn test_store_error_from_variants() {
        let argument = StoreError::from(ArgumentError::EmptyModelName);
        assert!(matches!(argument, StoreError::Argument(_)));

        let adapter = StoreError::from(AdapterError::Rejected {
            reason: "offline".to_string(),
        });
        assert!(matches!(adapter, StoreError::Adapter(_)));

        let lifecycle = StoreError::from(LifecycleError::Destroyed);
        assert!(matches!(lifecycle, StoreError::Lifecycle(_)));

        let config = StoreError::from(ConfigError::MissingRequired {
            field: "adapter".to_string(),
        });
        assert!(matches!(config, StoreError::Config(_)));
    }

    #[test]
    fn test_store_error_wraps_message() {
        let err = StoreError::from(PayloadError::UnknownType {
            resource_type: "dog".to_string(),
        });
        assert!(err.to_string().starts_with("Payload error: "));
        assert!(err.to_string().contains("'dog'"));
    }
}
