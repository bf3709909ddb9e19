//! Error types for normalization and cache reads.

use gql_runtime_types::VariableError;
use thiserror::Error;

/// Errors raised while reading, writing, or normalizing response data.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A non-optional field was absent or `null` in the source.
    #[error("corrupted response: required field `{field}` is missing or null")]
    CorruptedData { field: String },

    /// A field's value does not have the shape its descriptor declares.
    #[error("unexpected value for field `{field}`: expected {expected}")]
    TypeMismatch { field: String, expected: String },

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error("no adapter registered for custom scalar `{0}`")]
    MissingScalarAdapter(String),

    #[error("custom scalar `{scalar_type}` adapter failed: {message}")]
    ScalarAdapter {
        scalar_type: String,
        message: String,
    },

    /// The record (or a reference's target) is not in the store.
    #[error("cache miss: record `{0}` is not cached")]
    MissingRecord(String),

    /// The record exists but has never stored this field.
    #[error("cache miss: field `{field}` of record `{key}` is not cached")]
    MissingField { key: String, field: String },

    /// Internal traversal invariant broken (unbalanced delegate events, bad snapshot).
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Whether this error only means "the cache cannot satisfy the read".
    pub fn is_cache_miss(&self) -> bool {
        matches!(
            self,
            CacheError::MissingRecord(_) | CacheError::MissingField { .. }
        )
    }
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
