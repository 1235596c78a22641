//! Index request types and error definitions.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while fetching data through the gateway.
///
/// `Clone` because one outcome is handed to every caller coalesced onto the
/// same dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// No response before the local deadline.
    #[error("index request timed out after {0} ms")]
    TransportTimeout(u64),

    /// The index rejected the request (4xx).
    #[error("index rejected request with status {status}: {message}")]
    UpstreamClientError { status: u16, message: String },

    /// The index failed to serve the request (5xx).
    #[error("index server error {status}: {message}")]
    UpstreamServerError { status: u16, message: String },

    /// Connection, DNS or body-transfer failure.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The index answered 200 but reported query errors.
    #[error("index query rejected: {0}")]
    QueryRejected(String),

    /// The payload did not match the expected record shape.
    #[error("malformed index payload: {0}")]
    MalformedPayload(String),

    /// Parallel series in a record disagree in length.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// The cache store could not serve a read or write.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The gateway shut down before the request settled.
    #[error("gateway shut down before request completed")]
    Shutdown,
}

impl IndexError {
    /// Whether this failure says something about index health.
    ///
    /// Client errors and payload problems mean the index answered, so they
    /// leave the circuit breaker untouched.
    pub fn counts_toward_breaker(&self) -> bool {
        matches!(
            self,
            IndexError::TransportTimeout(_)
                | IndexError::UpstreamServerError { .. }
                | IndexError::TransportFailure(_)
        )
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            IndexError::TransportTimeout(_) => "timeout",
            IndexError::UpstreamClientError { .. } => "client_error",
            IndexError::UpstreamServerError { .. } => "server_error",
            IndexError::TransportFailure(_) => "transport",
            IndexError::QueryRejected(_) => "rejected",
            IndexError::MalformedPayload(_) => "malformed",
            IndexError::DimensionMismatch { .. } => "dimension_mismatch",
            IndexError::CacheUnavailable(_) => "cache_unavailable",
            IndexError::Shutdown => "shutdown",
        }
    }
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// A query plus its variables, as sent to the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQuery {
    pub query: String,
    #[serde(default)]
    pub variables: Value,
}

impl IndexQuery {
    pub fn new(query: impl Into<String>, variables: Value) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }
}

/// GraphQL-style response envelope returned by the index.
#[derive(Debug, Deserialize)]
pub struct IndexEnvelope {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<IndexErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct IndexErrorDetail {
    pub message: String,
}

impl IndexEnvelope {
    /// Unwrap the envelope into its `data` payload.
    pub fn into_data(self) -> IndexResult<Value> {
        if !self.errors.is_empty() {
            let messages: Vec<_> = self.errors.into_iter().map(|e| e.message).collect();
            return Err(IndexError::QueryRejected(messages.join("; ")));
        }
        self.data
            .ok_or_else(|| IndexError::MalformedPayload("response has no data field".to_string()))
    }
}

/// A typed record decoded from an index payload.
///
/// `validate` runs after deserialization, so structural invariants serde
/// cannot express are checked before anything reaches a caller.
pub trait IndexRecord: DeserializeOwned + Send + 'static {
    fn validate(&self) -> IndexResult<()> {
        Ok(())
    }
}

impl IndexRecord for Value {}

/// Decode and validate a record from a raw payload.
pub fn decode_record<T: IndexRecord>(value: Value) -> IndexResult<T> {
    let record: T =
        serde_json::from_value(value).map_err(|e| IndexError::MalformedPayload(e.to_string()))?;
    record.validate()?;
    Ok(record)
}
