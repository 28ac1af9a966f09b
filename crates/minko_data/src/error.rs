//! # Data Error Types
//!
//! All errors that can occur while reading or mutating the property namespace.

use thiserror::Error;

/// Errors that can occur in the data layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// No attached provider exposes the requested path.
    #[error("property not found: {path}")]
    PropertyNotFound {
        /// The path that failed to resolve.
        path: String,
    },

    /// The property exists but holds a value of another type.
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The path that was read.
        path: String,
        /// The type the caller asked for.
        expected: &'static str,
        /// The type actually stored.
        found: &'static str,
    },

    /// The path does not follow the `name` / `name[key].property` grammar.
    #[error("invalid property path {path:?}: {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The property is maintained by the store itself and cannot be written.
    #[error("property is read-only: {path}")]
    ReadOnlyProperty {
        /// The read-only path.
        path: String,
    },

    /// The provider is not attached where the caller expected it.
    #[error("provider not found in {context}")]
    ProviderNotFound {
        /// Where the lookup happened (store, collection name).
        context: String,
    },

    /// No collection with this name is attached.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// The collection name.
        name: String,
    },

    /// Positional access outside of a collection's bounds.
    #[error("index {index} out of range for collection of length {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Current collection length.
        len: usize,
    },
}

/// Result type for data operations.
pub type DataResult<T> = Result<T, DataError>;
