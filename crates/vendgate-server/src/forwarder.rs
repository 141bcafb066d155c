//! Gateway forwarder: validates a canonical envelope and relays it upstream.
//!
//! Validation happens entirely before the network call, so a rejected
//! envelope never costs a billable vendor request:
//!
//! 1. `appKey` must equal the configured credential (constant-time compare).
//! 2. `version`, `encrypt`, `appKey` and `params` must all be present.
//! 3. `encrypt` must be `AES` and `params` must be valid Base64.
//!
//! The forwarder then appends `appUsername` and POSTs the envelope to the
//! same path on the vendor. The vendor's response is returned untouched.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use vendgate_core::codec::is_base64_payload;
use vendgate_core::envelope::{CanonicalEnvelope, ENCRYPTION_ALGORITHM};
use vendgate_core::error::SanitizeError;

use crate::upstream::{Upstream, UpstreamError, UpstreamResponse};

/// Field name of the vendor identity appended to every forwarded envelope.
pub const APP_USERNAME_FIELD: &str = "appUsername";

/// Errors from forwarding an envelope.
///
/// Only [`UpstreamUnreachable`](Self::UpstreamUnreachable) is retry-safe;
/// every other variant means the request itself must change.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// `appKey` does not match the configured credential.
    #[error("appKey is not authorized")]
    Unauthorized,

    /// Required envelope fields are absent.
    #[error("missing required envelope fields: {}", .fields.join(", "))]
    MissingFields { fields: Vec<&'static str> },

    /// `encrypt` names an algorithm other than AES.
    #[error("unsupported encrypt value '{found}', only AES is accepted")]
    UnsupportedEncryption { found: String },

    /// `params` is not a valid Base64 payload.
    #[error(transparent)]
    MalformedParams(#[from] SanitizeError),

    /// The vendor could not be reached.
    #[error(transparent)]
    UpstreamUnreachable(#[from] UpstreamError),
}

impl ForwardError {
    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnreachable(_))
    }
}

/// Relays canonical envelopes to the vendor.
///
/// Holds only read-only configuration, so one instance is shared by every
/// request task without locking.
pub struct Forwarder {
    upstream: Arc<dyn Upstream>,
    app_key: String,
    app_username: String,
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("app_username", &self.app_username)
            .finish_non_exhaustive()
    }
}

impl Forwarder {
    /// Create a forwarder accepting `app_key` and stamping `app_username`.
    pub fn new(upstream: Arc<dyn Upstream>, app_key: String, app_username: String) -> Self {
        Self {
            upstream,
            app_key,
            app_username,
        }
    }

    /// Validate `envelope` and POST it to `target_path` on the vendor.
    ///
    /// # Errors
    ///
    /// - [`ForwardError::Unauthorized`] if `appKey` does not match.
    /// - [`ForwardError::MissingFields`] naming every absent required field.
    /// - [`ForwardError::UnsupportedEncryption`] if `encrypt` is not `AES`.
    /// - [`ForwardError::MalformedParams`] if `params` is not valid Base64.
    /// - [`ForwardError::UpstreamUnreachable`] on network failure or timeout.
    pub async fn forward(
        &self,
        envelope: &CanonicalEnvelope,
        target_path: &str,
    ) -> Result<UpstreamResponse, ForwardError> {
        let req_id = envelope.req_id.as_deref().unwrap_or("-");

        self.validate(envelope).inspect_err(|e| {
            warn!(req_id, path = target_path, error = %e, "envelope rejected");
        })?;

        let mut body = envelope.to_json_map();
        body.insert(
            APP_USERNAME_FIELD.to_owned(),
            Value::String(self.app_username.clone()),
        );
        let body = Value::Object(body);

        let started = Instant::now();
        let result = self.upstream.post(target_path, &body).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(resp) => {
                info!(
                    req_id,
                    path = target_path,
                    status = resp.status.as_u16(),
                    elapsed_ms,
                    "envelope forwarded"
                );
                Ok(resp)
            }
            Err(e) => {
                warn!(req_id, path = target_path, elapsed_ms, error = %e, "upstream call failed");
                Err(e.into())
            }
        }
    }

    fn validate(&self, envelope: &CanonicalEnvelope) -> Result<(), ForwardError> {
        if let Some(app_key) = &envelope.app_key {
            let matches: bool = app_key.as_bytes().ct_eq(self.app_key.as_bytes()).into();
            if !matches {
                return Err(ForwardError::Unauthorized);
            }
        }

        let missing = envelope.missing_fields();
        if !missing.is_empty() {
            return Err(ForwardError::MissingFields { fields: missing });
        }

        if let Some(encrypt) = &envelope.encrypt {
            if encrypt != ENCRYPTION_ALGORITHM {
                return Err(ForwardError::UnsupportedEncryption {
                    found: encrypt.clone(),
                });
            }
        }

        if let Some(params) = &envelope.params {
            if !is_base64_payload(params) {
                return Err(SanitizeError::MalformedParams {
                    reason: "params is not a canonical base64 string".to_owned(),
                }
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::body::Bytes;
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::upstream::HttpUpstream;

    const APP_KEY: &str = "AK20241120145620";

    /// Counts calls and records the last body; never touches the network.
    #[derive(Default)]
    struct CountingUpstream {
        calls: AtomicUsize,
        last_body: Mutex<Option<Value>>,
    }

    #[async_trait::async_trait]
    impl Upstream for CountingUpstream {
        async fn post(&self, _path: &str, body: &Value) -> Result<UpstreamResponse, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_body.lock().unwrap() = Some(body.clone());
            Ok(UpstreamResponse {
                status: StatusCode::OK,
                content_type: Some("application/json".to_owned()),
                body: Bytes::from_static(br#"{"code":200,"msg":"ok"}"#),
            })
        }
    }

    fn envelope(app_key: &str) -> CanonicalEnvelope {
        CanonicalEnvelope {
            version: Some("v2".to_owned()),
            encrypt: Some("AES".to_owned()),
            app_key: Some(app_key.to_owned()),
            req_id: Some("reqId_1".to_owned()),
            params: Some("MTIzNDU2Nzg=".to_owned()),
        }
    }

    fn forwarder(upstream: Arc<dyn Upstream>) -> Forwarder {
        Forwarder::new(upstream, APP_KEY.to_owned(), "reseller01".to_owned())
    }

    #[tokio::test]
    async fn wrong_app_key_is_rejected_without_upstream_call() {
        let upstream = Arc::new(CountingUpstream::default());
        let fwd = forwarder(Arc::clone(&upstream) as Arc<dyn Upstream>);

        let err = fwd
            .forward(&envelope("AK20241120145621"), "/api/open/app/proxy/info")
            .await
            .unwrap_err();

        assert!(matches!(err, ForwardError::Unauthorized));
        assert!(!err.is_retryable());
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wrong_app_key_wins_over_missing_fields() {
        let upstream = Arc::new(CountingUpstream::default());
        let fwd = forwarder(Arc::clone(&upstream) as Arc<dyn Upstream>);
        let env = CanonicalEnvelope {
            app_key: Some("intruder".to_owned()),
            ..Default::default()
        };

        let err = fwd.forward(&env, "/x").await.unwrap_err();
        assert!(matches!(err, ForwardError::Unauthorized));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_fields_are_enumerated() {
        let upstream = Arc::new(CountingUpstream::default());
        let fwd = forwarder(Arc::clone(&upstream) as Arc<dyn Upstream>);
        let env = CanonicalEnvelope {
            app_key: Some(APP_KEY.to_owned()),
            ..Default::default()
        };

        let err = fwd.forward(&env, "/x").await.unwrap_err();
        match &err {
            ForwardError::MissingFields { fields } => {
                assert_eq!(fields, &vec!["version", "encrypt", "params"]);
            }
            other => unreachable!("unexpected error: {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "missing required envelope fields: version, encrypt, params"
        );
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_aes_encrypt_is_rejected() {
        let upstream = Arc::new(CountingUpstream::default());
        let fwd = forwarder(Arc::clone(&upstream) as Arc<dyn Upstream>);
        let mut env = envelope(APP_KEY);
        env.encrypt = Some("DES".to_owned());

        let err = fwd.forward(&env, "/x").await.unwrap_err();
        assert!(matches!(err, ForwardError::UnsupportedEncryption { .. }));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_base64_params_are_rejected() {
        let upstream = Arc::new(CountingUpstream::default());
        let fwd = forwarder(Arc::clone(&upstream) as Arc<dyn Upstream>);
        let mut env = envelope(APP_KEY);
        env.params = Some("not base64".to_owned());

        let err = fwd.forward(&env, "/x").await.unwrap_err();
        assert!(matches!(err, ForwardError::MalformedParams(_)));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_envelope_gets_app_username_and_is_forwarded_once() {
        let upstream = Arc::new(CountingUpstream::default());
        let fwd = forwarder(Arc::clone(&upstream) as Arc<dyn Upstream>);

        let resp = fwd.forward(&envelope(APP_KEY), "/x").await.unwrap();

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        let body = upstream.last_body.lock().unwrap().clone().unwrap();
        assert_eq!(
            body,
            json!({
                "version": "v2",
                "encrypt": "AES",
                "appKey": APP_KEY,
                "reqId": "reqId_1",
                "params": "MTIzNDU2Nzg=",
                "appUsername": "reseller01"
            })
        );
    }

    #[tokio::test]
    async fn relays_vendor_response_verbatim_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/open/app/order"))
            .and(body_partial_json(json!({"appUsername": "reseller01"})))
            .respond_with(
                ResponseTemplate::new(403).set_body_string(r#"{"code":403,"msg":"余额不足"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let upstream = HttpUpstream::new(&server.uri(), Duration::from_secs(5), true).unwrap();
        let fwd = forwarder(Arc::new(upstream));

        let resp = fwd
            .forward(&envelope(APP_KEY), "/api/open/app/order")
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::FORBIDDEN);
        assert_eq!(
            std::str::from_utf8(&resp.body).unwrap(),
            r#"{"code":403,"msg":"余额不足"}"#
        );
    }

    #[tokio::test]
    async fn unauthorized_makes_zero_http_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let upstream = HttpUpstream::new(&server.uri(), Duration::from_secs(5), true).unwrap();
        let fwd = forwarder(Arc::new(upstream));

        let err = fwd.forward(&envelope("nope"), "/x").await.unwrap_err();
        assert!(matches!(err, ForwardError::Unauthorized));
        // `expect(0)` is verified when the mock server drops.
    }

    #[tokio::test]
    async fn unreachable_upstream_resolves_within_timeout() {
        // 192.0.2.0/24 (TEST-NET-1) is not routable; the connect must time out.
        let upstream =
            HttpUpstream::new("http://192.0.2.1:81", Duration::from_millis(300), true).unwrap();
        let fwd = forwarder(Arc::new(upstream));

        let started = Instant::now();
        let err = fwd.forward(&envelope(APP_KEY), "/x").await.unwrap_err();

        assert!(matches!(err, ForwardError::UpstreamUnreachable(_)));
        assert!(err.is_retryable());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
