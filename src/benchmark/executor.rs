/// Resilient request execution against the search engine.
///
/// `SearchTransport` is the pluggable seam for a single HTTP call; the
/// reqwest-backed `HttpTransport` is the production implementation.
/// `RequestExecutor` wraps a transport with a per-attempt timeout and
/// exponential backoff retries. Only timeouts are retried; every other
/// failure is returned immediately as an error response. The executor
/// never returns `Err` to its caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;

/// Message recorded when every attempt timed out.
pub const TIMEOUT_EXHAUSTED: &str = "Timeout after retries";

/// Errors a transport can report for one attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The attempt exceeded the request timeout
    #[error("request timed out")]
    Timeout,

    /// The engine answered with a non-success HTTP status
    #[error("HTTP error (status {status}): {message}")]
    Status { status: u16, message: String },

    /// Connection refused, DNS failure, reset, ...
    #[error("connection error: {0}")]
    Connection(String),

    /// Body was not valid JSON
    #[error("malformed response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether a retry may succeed. Only timeouts qualify.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// One HTTP exchange with the search engine.
///
/// Implementations must be Send + Sync so an executor can be shared
/// (e.g., Arc<dyn SearchTransport>).
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Send `body` (if any) to `endpoint`, relative to the engine base URL,
    /// and return the decoded JSON response.
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, TransportError>;
}

/// reqwest-backed transport for an Elasticsearch-compatible HTTP API.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `base_url` (e.g., "http://localhost:9200").
    ///
    /// `request_timeout` is set on the client as a backstop; the executor
    /// enforces the same limit around each attempt.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| TransportError::Connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpTransport {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Full URL for an endpoint, joined with exactly one slash.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl SearchTransport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, TransportError> {
        let mut request = self.client.request(method, self.url(endpoint));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Decode(e.to_string())
            }
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connection(e.to_string())
    }
}

/// Timeout and retry settings for the executor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Limit applied to every attempt
    pub request_timeout: Duration,
    /// Total attempts, including the first
    pub max_retries: u32,
    /// Delay before retry n (0-based) is `backoff_base * 2^n`
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            request_timeout: Duration::from_secs(60),
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Parsed engine response, or the error that replaced it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Body(Value),
    Error(String),
}

/// Result of one `execute` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub response: RawResponse,
    /// Wall-clock time of the final attempt only
    pub elapsed_ms: f64,
}

/// Executes requests with timeout and retry semantics.
pub struct RequestExecutor {
    transport: Arc<dyn SearchTransport>,
    policy: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn SearchTransport>, policy: RetryPolicy) -> Self {
        RequestExecutor { transport, policy }
    }

    /// Issue a request, retrying timeouts with exponential backoff.
    pub async fn execute(&self, method: Method, endpoint: &str, body: Option<&Value>) -> Execution {
        let attempts = self.policy.max_retries.max(1);

        for attempt in 0..attempts {
            let start = Instant::now();
            let outcome = match tokio::time::timeout(
                self.policy.request_timeout,
                self.transport.send(method.clone(), endpoint, body),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            };
            let elapsed_ms = millis_since(start);

            match outcome {
                Ok(value) => {
                    return Execution {
                        response: RawResponse::Body(value),
                        elapsed_ms,
                    };
                }
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    let delay = self.policy.backoff_base * 2u32.pow(attempt);
                    tracing::warn!(
                        endpoint,
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs_f64(),
                        "Request timed out, retrying with backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(endpoint, attempts, elapsed_ms, "Request timed out on every attempt");
                    return Execution {
                        response: RawResponse::Error(TIMEOUT_EXHAUSTED.to_string()),
                        elapsed_ms,
                    };
                }
                Err(e) => {
                    tracing::warn!(endpoint, error = %e, "Request failed");
                    return Execution {
                        response: RawResponse::Error(e.to_string()),
                        elapsed_ms,
                    };
                }
            }
        }

        // Unreachable: the final attempt always returns above.
        Execution {
            response: RawResponse::Error(TIMEOUT_EXHAUSTED.to_string()),
            elapsed_ms: 0.0,
        }
    }

    /// `GET /` liveness probe. Returns the engine's banner document.
    pub async fn probe(&self) -> Execution {
        self.execute(Method::GET, "", None).await
    }
}

fn millis_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed sequence of outcomes, one per call.
    struct ScriptedTransport {
        outcomes: Mutex<Vec<Result<Value, TransportError>>>,
        calls: AtomicUsize,
        latency: Duration,
    }

    impl ScriptedTransport {
        fn new(mut outcomes: Vec<Result<Value, TransportError>>, latency: Duration) -> Self {
            outcomes.reverse();
            ScriptedTransport {
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
                latency,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SearchTransport for ScriptedTransport {
        async fn send(
            &self,
            _method: Method,
            _endpoint: &str,
            _body: Option<&Value>,
        ) -> Result<Value, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(TransportError::Connection("script exhausted".into())))
        }
    }

    fn executor(transport: Arc<ScriptedTransport>) -> RequestExecutor {
        RequestExecutor::new(transport, RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_returns_body_and_elapsed() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![Ok(json!({"took": 3}))],
            Duration::from_millis(40),
        ));
        let exec = executor(transport.clone()).execute(Method::POST, "idx/_search", None).await;

        assert_eq!(exec.response, RawResponse::Body(json!({"took": 3})));
        assert!(exec.elapsed_ms >= 40.0 && exec.elapsed_ms < 1000.0, "elapsed {}", exec.elapsed_ms);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_timeouts_exhaust_retries() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![
                Err(TransportError::Timeout),
                Err(TransportError::Timeout),
                Err(TransportError::Timeout),
            ],
            Duration::from_millis(100),
        ));
        let exec = executor(transport.clone()).execute(Method::POST, "idx/_search", None).await;

        assert_eq!(transport.calls(), 3);
        assert_eq!(exec.response, RawResponse::Error(TIMEOUT_EXHAUSTED.to_string()));
        // Only the final attempt counts: no backoff, no earlier attempts.
        assert!(exec.elapsed_ms >= 100.0 && exec.elapsed_ms < 1000.0, "elapsed {}", exec.elapsed_ms);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_between_attempts() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![
                Err(TransportError::Timeout),
                Err(TransportError::Timeout),
                Err(TransportError::Timeout),
            ],
            Duration::ZERO,
        ));
        let started = Instant::now();
        executor(transport).execute(Method::POST, "idx/_search", None).await;
        // 1s + 2s of backoff, nothing after the last attempt.
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(3), "waited {:?}", waited);
        assert!(waited < Duration::from_millis(3100), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_success() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![Err(TransportError::Timeout), Ok(json!({"ok": true}))],
            Duration::ZERO,
        ));
        let exec = executor(transport.clone()).execute(Method::POST, "idx/_search", None).await;
        assert_eq!(transport.calls(), 2);
        assert_eq!(exec.response, RawResponse::Body(json!({"ok": true})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_error_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![
                Err(TransportError::Status { status: 400, message: "parse_exception".into() }),
                Ok(json!({})),
            ],
            Duration::ZERO,
        ));
        let exec = executor(transport.clone()).execute(Method::POST, "idx/_search", None).await;
        assert_eq!(transport.calls(), 1);
        match exec.response {
            RawResponse::Error(message) => {
                assert!(message.contains("400"));
                assert!(message.contains("parse_exception"));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_transport_hits_request_timeout() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![Ok(json!({})), Ok(json!({}))],
            Duration::from_secs(120),
        ));
        let policy = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };
        let exec = RequestExecutor::new(transport.clone(), policy)
            .execute(Method::POST, "idx/_search", None)
            .await;
        assert_eq!(transport.calls(), 2);
        assert_eq!(exec.response, RawResponse::Error(TIMEOUT_EXHAUSTED.to_string()));
        assert!((exec.elapsed_ms - 60_000.0).abs() < 100.0, "elapsed {}", exec.elapsed_ms);
    }

    #[test]
    fn test_only_timeouts_are_transient() {
        assert!(TransportError::Timeout.is_transient());
        assert!(!TransportError::Connection("refused".into()).is_transient());
        assert!(!TransportError::Decode("eof".into()).is_transient());
        assert!(!TransportError::Status { status: 503, message: String::new() }.is_transient());
    }

    #[test]
    fn test_http_transport_url_join() {
        let transport = HttpTransport::new("http://localhost:9200/", Duration::from_secs(1)).unwrap();
        assert_eq!(transport.url("idx/_search"), "http://localhost:9200/idx/_search");
        assert_eq!(transport.url("/idx/_search"), "http://localhost:9200/idx/_search");
        assert_eq!(transport.url(""), "http://localhost:9200/");
    }
}
