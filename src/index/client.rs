//! HTTP client for the upstream index.
//!
//! # Responsibilities
//! - POST `{query, variables}` to the index endpoint
//! - Enforce connect and request timeouts
//! - Map transport and HTTP failures onto `IndexError`
//! - Unwrap the response envelope into its `data` payload

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::IndexConfig;
use crate::index::types::{IndexEnvelope, IndexError, IndexQuery, IndexResult};
use crate::observability::metrics;

/// Runs one query against the index.
///
/// The returned future owns everything it needs; dropping it abandons the
/// call.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, query: IndexQuery) -> BoxFuture<'static, IndexResult<Value>>;
}

/// `reqwest`-backed executor.
#[derive(Clone)]
pub struct IndexClient {
    http: reqwest::Client,
    endpoint: Arc<url::Url>,
    request_timeout: Duration,
}

impl IndexClient {
    /// Create a new client for the configured endpoint.
    pub fn new(config: &IndexConfig) -> IndexResult<Self> {
        let endpoint: url::Url = config.endpoint.parse().map_err(|e| {
            IndexError::TransportFailure(format!("invalid index endpoint '{}': {}", config.endpoint, e))
        })?;
        let request_timeout = Duration::from_secs(config.request_timeout_secs);

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(request_timeout)
            .user_agent(concat!("stake-risk-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IndexError::TransportFailure(e.to_string()))?;

        tracing::info!(
            endpoint = %endpoint,
            request_timeout_secs = config.request_timeout_secs,
            "Index client initialized"
        );

        Ok(Self {
            http,
            endpoint: Arc::new(endpoint),
            request_timeout,
        })
    }

    /// Send one query and decode the envelope.
    pub async fn send(&self, query: &IndexQuery) -> IndexResult<Value> {
        let response = self
            .http
            .post(self.endpoint.as_str())
            .json(query)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let message = response.text().await.unwrap_or_default();
            metrics::record_upstream_status(status.as_u16());
            return Err(if status.is_client_error() {
                IndexError::UpstreamClientError {
                    status: status.as_u16(),
                    message,
                }
            } else {
                IndexError::UpstreamServerError {
                    status: status.as_u16(),
                    message,
                }
            });
        }
        metrics::record_upstream_status(status.as_u16());

        let envelope: IndexEnvelope = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        envelope.into_data()
    }

    fn map_transport_error(&self, err: reqwest::Error) -> IndexError {
        if err.is_timeout() {
            IndexError::TransportTimeout(self.request_timeout.as_millis() as u64)
        } else if err.is_decode() {
            IndexError::MalformedPayload(err.to_string())
        } else {
            IndexError::TransportFailure(err.to_string())
        }
    }
}

impl QueryExecutor for IndexClient {
    fn execute(&self, query: IndexQuery) -> BoxFuture<'static, IndexResult<Value>> {
        let client = self.clone();
        async move { client.send(&query).await }.boxed()
    }
}

impl std::fmt::Debug for IndexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = IndexConfig {
            endpoint: "not a url".to_string(),
            ..IndexConfig::default()
        };
        let err = IndexClient::new(&config).unwrap_err();
        assert!(err.to_string().contains("invalid index endpoint"));
    }

    #[tokio::test]
    async fn test_unreachable_index_is_transport_failure() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = IndexConfig {
            endpoint: format!("http://{}/graphql", addr),
            ..IndexConfig::default()
        };
        let client = IndexClient::new(&config).unwrap();
        let err = client
            .execute(IndexQuery::new("{ ping }", Value::Null))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::TransportFailure(_)));
        assert!(err.counts_toward_breaker());
    }
}
