//! Remote catalog client: the single entry point for every remote call.
//!
//! - [`operations`] - GraphQL documents and entity kinds
//! - [`models`] - Request/response wire types
//! - [`api`] - Typed helpers built on [`CatalogClient::execute`]
//!
//! The client owns retry/backoff and error classification. The actual I/O
//! goes through the [`Transport`] trait so tests can substitute an in-memory
//! service for the HTTP endpoint.

pub mod api;
pub mod models;
pub mod operations;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::{ApiConfig, RetryConfig};
use crate::error::{Error, RemoteErrorDetail, Result, join_messages};
use crate::retry::with_retry;

pub use models::{GraphqlError, GraphqlRequest, GraphqlResponse};
pub use operations::{EntityKind, Operation};

/// Abstraction over how a GraphQL request reaches the remote service
///
/// Implementations report connection problems as [`Error::Network`] or
/// [`Error::Connection`] and HTTP-level throttling as [`Error::RateLimited`].
/// Everything else, including GraphQL `errors`, is returned as a response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the decoded response envelope
    async fn send(&self, request: &GraphqlRequest<'_>) -> Result<GraphqlResponse>;
}

/// Production [`Transport`] posting JSON to the GraphQL endpoint over HTTP
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpTransport {
    /// Build a transport for the configured endpoint
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &GraphqlRequest<'_>) -> Result<GraphqlResponse> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited {
                operation: request.operation_name.to_string(),
            });
        }

        let body = response.text().await?;
        let gateway_failure = matches!(
            status,
            reqwest::StatusCode::BAD_GATEWAY
                | reqwest::StatusCode::SERVICE_UNAVAILABLE
                | reqwest::StatusCode::GATEWAY_TIMEOUT
        );
        match serde_json::from_str::<GraphqlResponse>(&body) {
            // Gateways in front of the API answer with their own body (HTML or a
            // bare JSON message) when the backend is unreachable
            Ok(parsed) if gateway_failure && !parsed.is_graphql_envelope() => Err(
                Error::Connection(format!("{} returned HTTP {status}", self.endpoint)),
            ),
            Ok(parsed) => Ok(parsed),
            Err(_) if gateway_failure => Err(Error::Connection(format!(
                "{} returned HTTP {status}",
                self.endpoint
            ))),
            Err(e) => Err(Error::Protocol(format!(
                "HTTP {status} for {}: response is not a GraphQL document: {e}",
                request.operation_name
            ))),
        }
    }
}

/// Client for the remote catalog service (cheap to clone)
#[derive(Clone)]
pub struct CatalogClient {
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl CatalogClient {
    /// Create a client over `transport` with its own cancellation token
    pub fn new(transport: Arc<dyn Transport>, retry: RetryConfig) -> Self {
        Self {
            transport,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a client talking HTTP to the configured endpoint
    pub fn http(api: &ApiConfig, retry: RetryConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(api)?), retry))
    }

    /// Same transport and retry policy, governed by a different token
    pub fn with_cancellation(&self, cancel: CancellationToken) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            retry: self.retry.clone(),
            cancel,
        }
    }

    /// Token that aborts this client's calls and backoff waits
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail with [`Error::Cancelled`] if the token has fired
    pub fn ensure_not_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Execute `operation` with `variables` and return its `data` object
    ///
    /// Transient failures are retried per the [`RetryConfig`]. Rate limiting
    /// that survives every attempt becomes [`Error::RateLimitExceeded`];
    /// exhausted network failures surface as the original error.
    pub async fn execute(&self, operation: &Operation, variables: Value) -> Result<Value> {
        let variables = &variables;
        let result = with_retry(&self.retry, &self.cancel, |attempt| async move {
            self.attempt(operation, variables, attempt).await
        })
        .await;

        match result {
            Err(Error::RateLimited { operation }) => Err(Error::RateLimitExceeded {
                operation,
                attempts: self.retry.max_attempts.max(1),
            }),
            other => other,
        }
    }

    async fn attempt(&self, operation: &Operation, variables: &Value, attempt: u32) -> Result<Value> {
        tracing::trace!(operation = operation.name, attempt, "Sending GraphQL request");

        let request = GraphqlRequest {
            query: operation.document,
            operation_name: operation.name,
            variables,
        };
        let response = self.transport.send(&request).await?;
        classify_response(operation, response)
    }
}

/// Map a response envelope onto `data` or a classified error
pub(crate) fn classify_response(operation: &Operation, response: GraphqlResponse) -> Result<Value> {
    if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
        if errors.iter().any(is_rate_limit_error) {
            return Err(Error::RateLimited {
                operation: operation.name.to_string(),
            });
        }

        let details: Vec<RemoteErrorDetail> = errors.iter().map(RemoteErrorDetail::from).collect();
        return Err(Error::RemoteBusiness {
            operation: operation.name.to_string(),
            message: join_messages(&details),
            details,
        });
    }

    match response.data {
        Some(Value::Null) | None => Err(Error::Protocol(format!(
            "response to {} carried no data",
            operation.name
        ))),
        Some(data) => Ok(data),
    }
}

/// Whether a GraphQL error entry is the service's "too many requests" signal
fn is_rate_limit_error(error: &GraphqlError) -> bool {
    if let Some(code) = error.code() {
        if code.eq_ignore_ascii_case("TOO_MANY_REQUESTS") || code.eq_ignore_ascii_case("THROTTLED")
        {
            return true;
        }
    }
    error.message.to_ascii_lowercase().contains("too many requests")
}
