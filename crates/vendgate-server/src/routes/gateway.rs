//! Vendor relay routes: `POST <endpoint>` for every configured vendor path.
//!
//! Each request is parsed as JSON, sanitized into a canonical envelope,
//! validated and forwarded to the same path upstream. The vendor's status
//! and body are relayed verbatim. If the caller disconnects, Axum drops the
//! handler future and the in-flight upstream call is abandoned with it.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{MatchedPath, State};
use axum::http::{HeaderValue, header};
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use serde_json::Value;
use tracing::debug;
use vendgate_core::sanitize::sanitize;

use crate::error::AppError;
use crate::state::AppState;

/// Build the relay router with one `POST` route per endpoint path.
pub fn router(endpoints: &[String]) -> Router<Arc<AppState>> {
    endpoints
        .iter()
        .fold(Router::new(), |router, path| {
            router.route(path, post(forward_envelope))
        })
}

/// Sanitize, validate and relay one envelope.
async fn forward_envelope(
    State(state): State<Arc<AppState>>,
    matched: MatchedPath,
    body: Bytes,
) -> Result<Response, AppError> {
    let target_path = matched.as_str();

    let raw: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidBody(format!("request body is not valid JSON: {e}")))?;

    let envelope = sanitize(&raw)?;
    debug!(
        path = target_path,
        req_id = envelope.req_id.as_deref().unwrap_or("-"),
        "envelope sanitized"
    );

    let upstream = state.forwarder.forward(&envelope, target_path).await?;

    let content_type = upstream
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));

    Response::builder()
        .status(upstream.status)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(upstream.body))
        .map_err(|e| AppError::Internal(format!("failed to build relay response: {e}")))
}
