//! Error types for `vendgate-core`.
//!
//! Each error variant carries enough context to diagnose the problem without
//! a debugger. Errors never include key material or ciphertext, only lengths
//! and operation descriptions.

use std::fmt;

/// Errors raised while building an outbound envelope payload.
#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    /// The parameter object could not be serialized to JSON.
    #[error("failed to serialize parameters: {reason}")]
    Serialize { reason: String },

    /// The shared secret is too short to derive the IV from.
    #[error("shared secret too short: expected at least {expected} bytes, got {actual}")]
    SecretTooShort { expected: usize, actual: usize },

    /// The shared secret length is not a valid AES key size.
    #[error("unsupported AES key length: {actual} bytes (expected 16, 24 or 32)")]
    UnsupportedKeyLength { actual: usize },
}

/// Errors raised while opening an envelope payload.
///
/// The variants are kept distinct: [`InvalidBase64`](Self::InvalidBase64)
/// points at a transport bug, while [`BadPadding`](Self::BadPadding) and
/// [`InvalidPayload`](Self::InvalidPayload) point at a key mismatch or a
/// corrupted payload.
#[derive(Debug, thiserror::Error)]
pub enum DecryptionError {
    /// The input is not a well-formed Base64 payload.
    #[error("invalid base64 payload: {reason}")]
    InvalidBase64 { reason: String },

    /// PKCS#7 unpadding failed after AES-CBC decryption.
    #[error("ciphertext padding is invalid (wrong key or corrupted payload)")]
    BadPadding,

    /// The decrypted bytes are not valid UTF-8 JSON.
    #[error("decrypted payload is not valid JSON: {reason}")]
    InvalidPayload { reason: String },
}

/// Errors from the inbound payload sanitizer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SanitizeError {
    /// `params` could not be reduced to a valid Base64 string.
    #[error("malformed params: {reason}")]
    MalformedParams { reason: String },
}

/// Machine-readable error codes emitted by the gateway in its JSON error
/// body (`{"error": "<code>", "message": "..."}`).
///
/// Shared by the server, which emits them, and the client, which maps them
/// back onto its caller-facing taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorCode {
    /// `appKey` did not match the configured credential.
    Unauthorized,
    /// `params` could not be recovered as Base64.
    MalformedParams,
    /// One or more required envelope fields were absent.
    MissingFields,
    /// `encrypt` named an algorithm other than AES.
    UnsupportedEncryption,
    /// The request body was not parseable JSON.
    InvalidBody,
    /// The vendor could not be reached or timed out.
    UpstreamUnreachable,
    /// Anything else inside the gateway.
    Internal,
}

impl GatewayErrorCode {
    /// Wire representation of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::MalformedParams => "malformed_params",
            Self::MissingFields => "missing_fields",
            Self::UnsupportedEncryption => "unsupported_encryption",
            Self::InvalidBody => "invalid_body",
            Self::UpstreamUnreachable => "upstream_unreachable",
            Self::Internal => "internal_error",
        }
    }

    /// Parse a wire code. Returns `None` for codes this version doesn't know.
    pub fn parse(code: &str) -> Option<Self> {
        let parsed = match code {
            "unauthorized" => Self::Unauthorized,
            "malformed_params" => Self::MalformedParams,
            "missing_fields" => Self::MissingFields,
            "unsupported_encryption" => Self::UnsupportedEncryption,
            "invalid_body" => Self::InvalidBody,
            "upstream_unreachable" => Self::UpstreamUnreachable,
            "internal_error" => Self::Internal,
            _ => return None,
        };
        Some(parsed)
    }
}

impl fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_codes_parse_their_own_wire_form() {
        for code in [
            GatewayErrorCode::Unauthorized,
            GatewayErrorCode::MalformedParams,
            GatewayErrorCode::MissingFields,
            GatewayErrorCode::UnsupportedEncryption,
            GatewayErrorCode::InvalidBody,
            GatewayErrorCode::UpstreamUnreachable,
            GatewayErrorCode::Internal,
        ] {
            assert_eq!(GatewayErrorCode::parse(code.as_str()), Some(code));
        }
    }

    #[test]
    fn unknown_gateway_code_is_none() {
        assert_eq!(GatewayErrorCode::parse("sealed"), None);
    }

    #[test]
    fn errors_never_echo_secret_material() {
        let err = EncryptionError::SecretTooShort {
            expected: 16,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "shared secret too short: expected at least 16 bytes, got 3"
        );
    }
}
