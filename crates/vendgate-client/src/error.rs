//! Caller-facing error taxonomy.
//!
//! Every failure from the codec, the transport, the gateway and the vendor
//! is re-wrapped into one of six variants here. Surrounding code renders
//! [`CallError::user_message`] and decides on retries with
//! [`CallError::is_retryable`]; it never sees raw crypto or transport errors.

use vendgate_core::error::{EncryptionError, GatewayErrorCode};

/// Errors returned by [`VendorClient::call`](crate::VendorClient::call).
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The outbound envelope could not be built. A caller bug.
    #[error("failed to build request envelope: {0}")]
    Encryption(#[from] EncryptionError),

    /// The gateway rejected the envelope payload.
    #[error("request rejected as malformed: {message}")]
    MalformedParams { message: String },

    /// The gateway rejected the caller credential.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// The gateway or the vendor could not be reached.
    #[error("vendor unreachable: {message}")]
    UpstreamUnreachable { message: String },

    /// The response could not be decrypted or parsed.
    #[error("invalid response: {reason}")]
    Decryption { reason: String },

    /// The vendor reported a failure code of its own.
    #[error("vendor error {code}: {message}")]
    Vendor { code: String, message: String },
}

impl CallError {
    /// Map a gateway error body back onto the caller taxonomy.
    ///
    /// Envelope-shape rejections all collapse to `MalformedParams`. An
    /// internal gateway failure is reported like a vendor error so its
    /// message reaches the caller unchanged.
    pub fn from_gateway(code: GatewayErrorCode, message: String) -> Self {
        match code {
            GatewayErrorCode::Unauthorized => Self::Unauthorized { message },
            GatewayErrorCode::MalformedParams
            | GatewayErrorCode::MissingFields
            | GatewayErrorCode::UnsupportedEncryption
            | GatewayErrorCode::InvalidBody => Self::MalformedParams { message },
            GatewayErrorCode::UpstreamUnreachable => Self::UpstreamUnreachable { message },
            GatewayErrorCode::Internal => Self::Vendor {
                code: code.as_str().to_owned(),
                message,
            },
        }
    }

    /// Whether retrying the same call with backoff is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnreachable { .. })
    }

    /// A message suitable for showing to an end user. Never contains
    /// ciphertext or internal error detail; vendor messages pass through.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Encryption(_) => "The request could not be prepared. Please check the submitted data.",
            Self::MalformedParams { .. } => "The request was rejected as malformed.",
            Self::Unauthorized { .. } => "Authentication with the proxy provider failed.",
            Self::UpstreamUnreachable { .. } => {
                "The proxy provider is temporarily unreachable. Please try again later."
            }
            Self::Decryption { .. } => "The proxy provider returned an invalid response.",
            Self::Vendor { message, .. } => message,
        }
    }
}
