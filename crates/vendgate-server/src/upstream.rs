//! Transport to the upstream vendor API.
//!
//! [`Upstream`] is the seam between the forwarder and the network:
//! [`HttpUpstream`] posts JSON over HTTPS with `reqwest`, tests substitute
//! in-process implementations. Non-2xx statuses are not errors here: the
//! vendor wraps its own error codes in both 200 and non-200 responses, so the
//! status and body are relayed as-is.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::StatusCode;
use serde_json::Value;

/// Raw upstream response, relayed verbatim to the caller.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// HTTP status returned by the vendor.
    pub status: StatusCode,
    /// `Content-Type` header, if the vendor sent one.
    pub content_type: Option<String>,
    /// Response body bytes.
    pub body: Bytes,
}

/// Network-level failures talking to the vendor. All are retry-safe.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The call did not complete within the configured timeout.
    #[error("upstream timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Connection, TLS, or protocol failure.
    #[error("upstream unreachable: {reason}")]
    Unreachable { reason: String },
}

/// A destination that accepts a JSON POST at a vendor path.
///
/// Implementations must be safe to share across request tasks.
#[async_trait::async_trait]
pub trait Upstream: Send + Sync + 'static {
    /// POST `body` as JSON to `path` on the vendor.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] only for transport failures, never for
    /// non-2xx statuses.
    async fn post(&self, path: &str, body: &Value) -> Result<UpstreamResponse, UpstreamError>;
}

/// `reqwest`-backed upstream with a strict per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpUpstream {
    /// Build a client for `base_url`.
    ///
    /// `accept_invalid_certs` relaxes TLS certificate validation; the vendor
    /// sandbox serves a certificate that does not validate.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the TLS backend cannot be initialized.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_error(&self, err: &reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            UpstreamError::Unreachable {
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait::async_trait]
impl Upstream for HttpUpstream {
    async fn post(&self, path: &str, body: &Value) -> Result<UpstreamResponse, UpstreamError> {
        let url = format!("{}{path}", self.base_url);

        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_error(&e))?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.bytes().await.map_err(|e| self.map_error(&e))?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}
