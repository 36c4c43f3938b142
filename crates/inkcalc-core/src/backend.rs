//! Recognition backend contract and clients.
//!
//! ## Protocol
//!
//! ```json
//! POST {base_url}/calculate
//! { "image": "data:image/png;base64,...", "dict_of_vars": { "x": "5" } }
//!
//! 200 OK
//! { "data": [ { "expr": "x + 2", "result": "7", "assign": false } ] }
//!
//! 4xx/5xx
//! { "detail": "Invalid Drawing data: ..." }
//! ```

use crate::config::CalcConfig;
use crate::error::{CalcError, CalcResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

/// Message used when a failed response carries no `detail`.
pub const GENERIC_SERVER_ERROR: &str = "Server error";

/// Request body for `POST /calculate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculateRequest {
    /// Snapshot as a PNG data URI.
    pub image: String,
    /// Variable bindings accumulated so far.
    pub dict_of_vars: BTreeMap<String, String>,
}

/// One unit of backend output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub expr: String,
    pub result: String,
    /// True when this pair defines a variable.
    #[serde(default)]
    pub assign: bool,
}

impl RecognitionResult {
    pub fn new(expr: impl Into<String>, result: impl Into<String>, assign: bool) -> Self {
        Self {
            expr: expr.into(),
            result: result.into(),
            assign,
        }
    }
}

/// Success body of `POST /calculate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateResponse {
    pub data: Vec<RecognitionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Error body of a failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: serde_json::Value,
}

/// Pull a human-readable message out of an error response body.
///
/// A string `detail` is used as is; any other non-null `detail` (validation
/// errors arrive as a list) is rendered as JSON.
pub fn extract_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Boxed future returned by backends.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A recognition service.
pub trait RecognitionBackend: Send + Sync {
    /// Submit a snapshot and the current bindings; resolve to the results in order.
    fn calculate(
        &self,
        request: &CalculateRequest,
    ) -> BoxFuture<'_, CalcResult<Vec<RecognitionResult>>>;
}

/// HTTP/JSON client for the recognition service.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpBackend {
    /// Build a client for `config.base_url` with the configured timeout.
    pub fn new(config: &CalcConfig) -> CalcResult<Self> {
        let endpoint = config.calculate_url()?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CalcError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { client, endpoint })
    }

    /// The `…/calculate` URL requests go to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(&self, request: CalculateRequest) -> CalcResult<Vec<RecognitionResult>> {
        log::info!(
            "POST {} ({} bytes image, {} variables)",
            self.endpoint,
            request.image.len(),
            request.dict_of_vars.len()
        );
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_detail(&body).unwrap_or_else(|| GENERIC_SERVER_ERROR.to_string());
            log::warn!("Backend returned {}: {}", status, message);
            return Err(CalcError::Backend { message });
        }

        let body: CalculateResponse = response.json().await.map_err(map_transport_error)?;
        log::info!(
            "Backend answered {} results in {}ms",
            body.data.len(),
            start.elapsed().as_millis()
        );
        Ok(body.data)
    }
}

impl RecognitionBackend for HttpBackend {
    fn calculate(
        &self,
        request: &CalculateRequest,
    ) -> BoxFuture<'_, CalcResult<Vec<RecognitionResult>>> {
        let request = request.clone();
        Box::pin(async move { self.post(request).await })
    }
}

fn map_transport_error(e: reqwest::Error) -> CalcError {
    if e.is_timeout() {
        log::warn!("Backend request timed out: {}", e);
        CalcError::Timeout
    } else if e.is_decode() {
        CalcError::backend(format!("invalid response: {}", e))
    } else {
        log::warn!("Backend request failed: {}", e);
        CalcError::backend(e.to_string())
    }
}

/// Backend that answers every request with the same canned reply.
///
/// Records each request; useful for tests and offline runs.
#[derive(Debug)]
pub struct StaticBackend {
    reply: CalcResult<Vec<RecognitionResult>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CalculateRequest>>,
}

impl StaticBackend {
    /// Always succeed with `results`.
    pub fn new(results: Vec<RecognitionResult>) -> Self {
        Self::with_reply(Ok(results))
    }

    /// Always fail with a backend error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_reply(Err(CalcError::backend(message)))
    }

    pub fn with_reply(reply: CalcResult<Vec<RecognitionResult>>) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<CalculateRequest> {
        self.requests.lock().ok().and_then(|requests| requests.last().cloned())
    }
}

impl RecognitionBackend for StaticBackend {
    fn calculate(
        &self,
        request: &CalculateRequest,
    ) -> BoxFuture<'_, CalcResult<Vec<RecognitionResult>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let reply = self.reply.clone();
        Box::pin(async move { reply })
    }
}
