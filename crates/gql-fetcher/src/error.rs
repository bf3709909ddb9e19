//! Error types for client calls.

use gql_normalized_cache::CacheError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport could not produce a response.
    #[error("network error: {0:#}")]
    Network(anyhow::Error),

    /// Reading from or writing to the normalized cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The server answered, but the payload is not a usable GraphQL response
    /// for this operation. Nothing from it was merged.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("call was cancelled")]
    Cancelled,
}

impl ClientError {
    /// Classify a normalization failure: shape problems in the payload are
    /// the server's fault, everything else is a cache error.
    pub(crate) fn from_payload(err: CacheError) -> Self {
        match err {
            CacheError::CorruptedData { .. } | CacheError::TypeMismatch { .. } => {
                ClientError::MalformedPayload(err.to_string())
            }
            other => ClientError::Cache(other),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
