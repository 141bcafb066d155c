//! Client configuration.
//!
//! Read from `VENDGATE_*` environment variables (or built directly) once and
//! immutable afterwards. Secrets are validated up front so a bad secret
//! fails at startup rather than on the first call.

use std::time::Duration;

use vendgate_core::envelope::PROTOCOL_VERSION;
use vendgate_core::secret::SharedSecret;

/// Default client timeout. Strictly longer than the gateway's default
/// upstream timeout (30s) so vendor stalls come back as typed gateway errors.
pub const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 45;

/// Default gateway address.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8300";

/// Errors raised while reading client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required environment variable {var}")]
    Missing { var: &'static str },

    /// A variable is set but cannot be used.
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway base URL; vendor paths are appended verbatim.
    pub gateway_url: String,
    /// Caller credential sent as `appKey`.
    pub app_key: String,
    /// Secret used to encrypt request params.
    pub secret: SharedSecret,
    /// Secret used to decrypt response `data`; defaults to `secret`.
    pub response_secret: Option<SharedSecret>,
    /// Envelope `version` tag.
    pub protocol_version: String,
    /// Whole-call timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Build a configuration with defaults for everything optional.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the secret is not a usable AES key.
    pub fn new(gateway_url: &str, app_key: &str, secret: &str) -> Result<Self, ConfigError> {
        let secret = SharedSecret::new(secret).map_err(|e| ConfigError::Invalid {
            var: "VENDGATE_APP_SECRET",
            reason: e.to_string(),
        })?;
        Ok(Self {
            gateway_url: gateway_url.trim_end_matches('/').to_owned(),
            app_key: app_key.to_owned(),
            secret,
            response_secret: None,
            protocol_version: PROTOCOL_VERSION.to_owned(),
            timeout: Duration::from_secs(DEFAULT_CLIENT_TIMEOUT_SECS),
        })
    }

    /// Override the whole-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Decrypt responses with a different secret than requests.
    #[must_use]
    pub fn with_response_secret(mut self, secret: SharedSecret) -> Self {
        self.response_secret = Some(secret);
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `VENDGATE_GATEWAY_URL` — gateway address (default: `http://127.0.0.1:8300`)
    /// - `VENDGATE_APP_KEY` — caller credential (required)
    /// - `VENDGATE_APP_SECRET` — shared secret, 16/24/32 bytes (required)
    /// - `VENDGATE_RESPONSE_SECRET` — response secret (default: app secret)
    /// - `VENDGATE_PROTOCOL_VERSION` — envelope version (default: `v2`)
    /// - `VENDGATE_CLIENT_TIMEOUT_SECS` — call timeout (default: `45`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let gateway_url =
            lookup("VENDGATE_GATEWAY_URL").unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_owned());
        let app_key = lookup("VENDGATE_APP_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing {
                var: "VENDGATE_APP_KEY",
            })?;
        let secret = lookup("VENDGATE_APP_SECRET").ok_or(ConfigError::Missing {
            var: "VENDGATE_APP_SECRET",
        })?;

        let mut config = Self::new(&gateway_url, app_key.trim(), &secret)?;

        if let Some(response_secret) = lookup("VENDGATE_RESPONSE_SECRET") {
            let secret =
                SharedSecret::new(&response_secret).map_err(|e| ConfigError::Invalid {
                    var: "VENDGATE_RESPONSE_SECRET",
                    reason: e.to_string(),
                })?;
            config = config.with_response_secret(secret);
        }

        if let Some(version) = lookup("VENDGATE_PROTOCOL_VERSION") {
            let version = version.trim();
            if version.is_empty() {
                return Err(ConfigError::Invalid {
                    var: "VENDGATE_PROTOCOL_VERSION",
                    reason: "must not be empty".to_owned(),
                });
            }
            version.clone_into(&mut config.protocol_version);
        }

        if let Some(v) = lookup("VENDGATE_CLIENT_TIMEOUT_SECS") {
            let secs = v.parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                ConfigError::Invalid {
                    var: "VENDGATE_CLIENT_TIMEOUT_SECS",
                    reason: format!("'{v}' is not a positive number of seconds"),
                }
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ClientConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = load(&[
            ("VENDGATE_APP_KEY", "AK1"),
            ("VENDGATE_APP_SECRET", "AK20241120145620"),
        ])
        .unwrap();
        assert_eq!(cfg.gateway_url, DEFAULT_GATEWAY_URL);
        assert_eq!(cfg.protocol_version, "v2");
        assert_eq!(cfg.timeout, Duration::from_secs(45));
        assert!(cfg.response_secret.is_none());
    }

    #[test]
    fn short_secret_is_invalid() {
        let err = load(&[("VENDGATE_APP_KEY", "AK1"), ("VENDGATE_APP_SECRET", "short")])
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "VENDGATE_APP_SECRET",
                ..
            }
        ));
    }

    #[test]
    fn missing_app_key_is_reported() {
        let err = load(&[("VENDGATE_APP_SECRET", "AK20241120145620")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                var: "VENDGATE_APP_KEY"
            }
        ));
    }

    #[test]
    fn overrides_are_read() {
        let cfg = load(&[
            ("VENDGATE_GATEWAY_URL", "http://gw.internal:9000/"),
            ("VENDGATE_APP_KEY", "AK1"),
            ("VENDGATE_APP_SECRET", "AK20241120145620"),
            ("VENDGATE_RESPONSE_SECRET", "0123456789abcdef"),
            ("VENDGATE_PROTOCOL_VERSION", "v3"),
            ("VENDGATE_CLIENT_TIMEOUT_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(cfg.gateway_url, "http://gw.internal:9000");
        assert_eq!(cfg.protocol_version, "v3");
        assert_eq!(cfg.timeout, Duration::from_secs(60));
        assert!(cfg.response_secret.is_some());
    }
}
