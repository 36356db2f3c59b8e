// Lineage Errors
// Error taxonomy shared by the key algebra, output stores, module sets and graph builder

use crate::key::CompositeKey;

use thiserror::Error;

pub type LineageResult<T> = Result<T, LineageError>;

/// Failure reported by an opaque module callable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ModuleError {
    pub message: String,
}

impl ModuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors that can occur while expanding or inspecting a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineageError {
    #[error("cardinality mismatch in '{set_name}': {message}")]
    CardinalityMismatch { set_name: String, message: String },

    #[error("module set '{set_name}' has not been fitted")]
    UnfittedState { set_name: String },

    #[error("key collision: {key} would be written twice")]
    KeyCollision { key: CompositeKey },

    #[error("malformed key {key}: {reason}")]
    MalformedKey { key: CompositeKey, reason: String },

    #[error("lineage conflict in '{set_name}': {left} cannot be paired with {right}")]
    LineageConflict {
        set_name: String,
        left: CompositeKey,
        right: CompositeKey,
    },

    #[error("module failed while computing {key}: {source}")]
    Module {
        key: CompositeKey,
        #[source]
        source: ModuleError,
    },
}

impl LineageError {
    pub fn cardinality(set_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CardinalityMismatch {
            set_name: set_name.into(),
            message: message.into(),
        }
    }

    pub fn unfitted(set_name: impl Into<String>) -> Self {
        Self::UnfittedState {
            set_name: set_name.into(),
        }
    }

    pub fn malformed(key: &CompositeKey, reason: impl Into<String>) -> Self {
        Self::MalformedKey {
            key: key.clone(),
            reason: reason.into(),
        }
    }

    pub fn module(key: &CompositeKey, source: ModuleError) -> Self {
        Self::Module {
            key: key.clone(),
            source,
        }
    }
}
