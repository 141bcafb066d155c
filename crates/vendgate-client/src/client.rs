//! Vendor client: seals parameters into an envelope, posts it to the gateway
//! and unwraps whatever comes back into a plain JSON value or a
//! [`CallError`].

use std::time::Instant;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use vendgate_core::codec;
use vendgate_core::envelope::Envelope;
use vendgate_core::error::GatewayErrorCode;
use vendgate_core::secret::SharedSecret;

use crate::config::ClientConfig;
use crate::error::CallError;

/// Vendor codes that mean success.
const SUCCESS_CODES: [&str; 2] = ["0", "200"];

/// Client for the vendor API, routed through the gateway.
#[derive(Debug, Clone)]
pub struct VendorClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl VendorClient {
    /// Build a client from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Call a vendor endpoint.
    ///
    /// `path` is the vendor path (e.g. `/api/open/app/product/query`) and
    /// `params` any JSON-serializable object. Returns the vendor's `data`
    /// field, decrypted when it arrives as a ciphertext, or `Value::Null`
    /// when the vendor sent none.
    ///
    /// # Errors
    ///
    /// Every failure is reported as a [`CallError`]; see its variants.
    pub async fn call<T: Serialize + ?Sized>(
        &self,
        path: &str,
        params: &T,
    ) -> Result<Value, CallError> {
        let envelope = Envelope::seal(
            params,
            &self.config.app_key,
            &self.config.protocol_version,
            &self.config.secret,
        )?;

        let url = if path.starts_with('/') {
            format!("{}{path}", self.config.gateway_url)
        } else {
            format!("{}/{path}", self.config.gateway_url)
        };

        let started = Instant::now();
        debug!(req_id = %envelope.req_id, path, "calling gateway");

        let response = self
            .http
            .post(&url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| transport_error(&e))?;

        debug!(
            req_id = %envelope.req_id,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis(),
            "gateway responded"
        );

        let secret = self
            .config
            .response_secret
            .as_ref()
            .unwrap_or(&self.config.secret);
        interpret_response(status, &body, secret)
    }
}

fn transport_error(err: &reqwest::Error) -> CallError {
    let message = if err.is_timeout() {
        "request to gateway timed out".to_owned()
    } else if err.is_connect() {
        "gateway connection failed".to_owned()
    } else {
        format!("gateway request failed: {err}")
    };
    warn!(error = %err, "gateway transport failure");
    CallError::UpstreamUnreachable { message }
}

/// Turn a gateway response into the caller-facing result.
///
/// Order matters: gateway error bodies first, then vendor business codes,
/// then bare non-2xx statuses, then `data` extraction.
pub(crate) fn interpret_response(
    status: StatusCode,
    body: &[u8],
    secret: &SharedSecret,
) -> Result<Value, CallError> {
    let Ok(json) = serde_json::from_slice::<Value>(body) else {
        warn!(status = status.as_u16(), len = body.len(), "response body is not JSON");
        return Err(CallError::Decryption {
            reason: "response body is not JSON".to_owned(),
        });
    };

    if !status.is_success() {
        if let Some(code) = json
            .get("error")
            .and_then(Value::as_str)
            .and_then(GatewayErrorCode::parse)
        {
            let message = text_field(&json, &["message"]).unwrap_or_else(|| code.to_string());
            return Err(CallError::from_gateway(code, message));
        }
    }

    if let Some(code) = vendor_code(&json) {
        if !SUCCESS_CODES.contains(&code.as_str()) {
            let message = text_field(&json, &["msg", "message"])
                .unwrap_or_else(|| format!("vendor returned code {code}"));
            return Err(CallError::Vendor { code, message });
        }
    } else if !status.is_success() {
        let message = text_field(&json, &["msg", "message"]).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_owned()
        });
        return Err(CallError::Vendor {
            code: status.as_u16().to_string(),
            message,
        });
    }

    match json.get("data") {
        None | Some(Value::Null) => Ok(Value::Null),
        Some(Value::String(s)) if codec::is_ciphertext_payload(s) => {
            codec::decrypt(s, secret).map_err(|e| {
                warn!(error = %e, "failed to decrypt response data");
                CallError::Decryption {
                    reason: e.to_string(),
                }
            })
        }
        Some(other) => Ok(other.clone()),
    }
}

/// The vendor's business code, as a number or a numeric-looking string.
fn vendor_code(json: &Value) -> Option<String> {
    match json.get("code")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        _ => None,
    }
}

fn text_field(json: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| json.get(*name).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}
