//! Server configuration for the `vendgate` gateway.
//!
//! Loaded once from `VENDGATE_*` environment variables at startup and
//! immutable afterwards. The accepted `appKey`, the upstream base URL and the
//! vendor identity are required; everything else has a default.

use std::net::SocketAddr;
use std::time::Duration;

/// Default vendor API paths the gateway relays.
pub const DEFAULT_ENDPOINTS: [&str; 8] = [
    "/api/open/app/auth/login",
    "/api/open/app/product/query",
    "/api/open/app/order",
    "/api/open/app/order/query",
    "/api/open/app/proxy/info",
    "/api/open/app/instance/open",
    "/api/open/app/instance/renew",
    "/api/open/app/instance/release",
];

/// Liveness route served by the gateway itself; never relayed.
pub const HEALTH_PATH: &str = "/health";

/// Default outbound timeout. Kept below the client's default so a stalled
/// vendor surfaces as a typed gateway error before the caller gives up.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required environment variable {var}")]
    Missing { var: &'static str },

    /// A variable is set but cannot be used.
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Gateway configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Vendor base URL; endpoint paths are appended verbatim.
    pub upstream_url: String,
    /// The single `appKey` accepted from callers.
    pub app_key: String,
    /// Identity field appended to every upstream envelope as `appUsername`.
    pub app_username: String,
    /// Outbound request timeout.
    pub upstream_timeout: Duration,
    /// Skip TLS certificate validation (the vendor sandbox needs this).
    pub accept_invalid_certs: bool,
    /// Vendor paths accepted for forwarding.
    pub endpoints: Vec<String>,
    /// Maximum number of concurrently forwarded requests.
    pub max_concurrency: usize,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("upstream_url", &self.upstream_url)
            .field("app_key", &"[REDACTED]")
            .field("app_username", &self.app_username)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("endpoints", &self.endpoints)
            .field("max_concurrency", &self.max_concurrency)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT` — port to bind on (binds to `0.0.0.0`)
    /// - `VENDGATE_BIND_ADDR` — full bind address (overrides `PORT`, default: `127.0.0.1:8300`)
    /// - `VENDGATE_UPSTREAM_URL` — vendor base URL (required)
    /// - `VENDGATE_APP_KEY` — accepted caller `appKey` (required)
    /// - `VENDGATE_APP_USERNAME` — vendor identity field (required)
    /// - `VENDGATE_UPSTREAM_TIMEOUT_SECS` — outbound timeout (default: `30`)
    /// - `VENDGATE_ACCEPT_INVALID_CERTS` — relaxed TLS validation (default: `true`)
    /// - `VENDGATE_ENDPOINTS` — comma-separated path allow-list (default: built-in list)
    /// - `VENDGATE_MAX_CONCURRENCY` — concurrent forwards (default: `256`)
    /// - `VENDGATE_LOG_LEVEL` — log filter (default: `info`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a value
    /// is unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Priority: VENDGATE_BIND_ADDR > PORT > default 127.0.0.1:8300
        let bind_addr = if let Some(addr) = lookup("VENDGATE_BIND_ADDR") {
            addr.parse().map_err(|_| ConfigError::Invalid {
                var: "VENDGATE_BIND_ADDR",
                reason: format!("'{addr}' is not a socket address"),
            })?
        } else if let Some(port) = lookup("PORT") {
            let port: u16 = port.parse().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                reason: format!("'{port}' is not a port number"),
            })?;
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(([127, 0, 0, 1], 8300))
        };

        let upstream_url = required(&lookup, "VENDGATE_UPSTREAM_URL")?;
        if !(upstream_url.starts_with("http://") || upstream_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "VENDGATE_UPSTREAM_URL",
                reason: "must start with http:// or https://".to_owned(),
            });
        }
        let upstream_url = upstream_url.trim_end_matches('/').to_owned();

        let app_key = required(&lookup, "VENDGATE_APP_KEY")?;
        let app_username = required(&lookup, "VENDGATE_APP_USERNAME")?;

        let timeout_secs = match lookup("VENDGATE_UPSTREAM_TIMEOUT_SECS") {
            Some(v) => v.parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                ConfigError::Invalid {
                    var: "VENDGATE_UPSTREAM_TIMEOUT_SECS",
                    reason: format!("'{v}' is not a positive number of seconds"),
                }
            })?,
            None => DEFAULT_UPSTREAM_TIMEOUT_SECS,
        };

        let accept_invalid_certs = lookup("VENDGATE_ACCEPT_INVALID_CERTS")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let endpoints = match lookup("VENDGATE_ENDPOINTS") {
            Some(list) => parse_endpoints(&list)?,
            None => DEFAULT_ENDPOINTS.iter().map(|p| (*p).to_owned()).collect(),
        };

        let max_concurrency = match lookup("VENDGATE_MAX_CONCURRENCY") {
            Some(v) => v.parse::<usize>().ok().filter(|n| *n > 0).ok_or_else(|| {
                ConfigError::Invalid {
                    var: "VENDGATE_MAX_CONCURRENCY",
                    reason: format!("'{v}' is not a positive integer"),
                }
            })?,
            None => 256,
        };

        let log_level = lookup("VENDGATE_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        Ok(Self {
            bind_addr,
            upstream_url,
            app_key,
            app_username,
            upstream_timeout: Duration::from_secs(timeout_secs),
            accept_invalid_certs,
            endpoints,
            max_concurrency,
            log_level,
        })
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<String, ConfigError> {
    lookup(var)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing { var })
}

/// Whether `path` can be registered as a static Axum route: absolute, no
/// empty segments, no wildcard or query syntax, and no segment starting
/// with `:` (Axum rejects those at registration time).
fn is_literal_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    !path.contains(['{', '}', '*', '?', '#'])
        && rest
            .split('/')
            .all(|segment| !segment.is_empty() && !segment.starts_with(':'))
}

/// Parse a comma-separated endpoint list, dropping blanks and duplicates.
fn parse_endpoints(list: &str) -> Result<Vec<String>, ConfigError> {
    let mut endpoints: Vec<String> = Vec::new();
    for raw in list.split(',') {
        let path = raw.trim();
        if path.is_empty() {
            continue;
        }
        if !is_literal_path(path) {
            return Err(ConfigError::Invalid {
                var: "VENDGATE_ENDPOINTS",
                reason: format!("'{path}' is not a literal absolute path"),
            });
        }
        if path == HEALTH_PATH {
            return Err(ConfigError::Invalid {
                var: "VENDGATE_ENDPOINTS",
                reason: format!("'{path}' is reserved for the gateway"),
            });
        }
        if !endpoints.iter().any(|p| p == path) {
            endpoints.push(path.to_owned());
        }
    }
    if endpoints.is_empty() {
        return Err(ConfigError::Invalid {
            var: "VENDGATE_ENDPOINTS",
            reason: "no endpoints listed".to_owned(),
        });
    }
    Ok(endpoints)
}
