//! Shared application state for the `vendgate` gateway.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. Everything in it is read-only after startup, so
//! concurrent requests need no locks.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::forwarder::Forwarder;
use crate::upstream::{HttpUpstream, Upstream};

/// Shared application state passed to all HTTP handlers.
#[derive(Debug)]
pub struct AppState {
    /// Envelope validator and relay.
    pub forwarder: Forwarder,
    /// Vendor paths the gateway accepts.
    pub endpoints: Vec<String>,
}

impl AppState {
    /// Build state around an arbitrary upstream.
    pub fn new(upstream: Arc<dyn Upstream>, config: &ServerConfig) -> Self {
        Self {
            forwarder: Forwarder::new(
                upstream,
                config.app_key.clone(),
                config.app_username.clone(),
            ),
            endpoints: config.endpoints.clone(),
        }
    }

    /// Build state with the real HTTPS upstream described by `config`.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the HTTP client cannot be built.
    pub fn from_config(config: &ServerConfig) -> Result<Self, reqwest::Error> {
        let upstream = HttpUpstream::new(
            &config.upstream_url,
            config.upstream_timeout,
            config.accept_invalid_certs,
        )?;
        Ok(Self::new(Arc::new(upstream), config))
    }
}
