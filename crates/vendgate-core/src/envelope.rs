//! The vendor envelope: the five-field JSON wrapper around every call.
//!
//! ```json
//! {
//!   "version": "v2",
//!   "encrypt": "AES",
//!   "appKey": "<configured credential>",
//!   "reqId": "reqId_<unique>",
//!   "params": "<base64 ciphertext>"
//! }
//! ```
//!
//! [`Envelope`] is the fully-populated form a client builds. The gateway
//! works on [`CanonicalEnvelope`], the sanitizer's output, where any field
//! may still be absent until the forwarder checks for it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec;
use crate::error::{DecryptionError, EncryptionError};
use crate::secret::SharedSecret;

/// Protocol version tag sent by current clients.
pub const PROTOCOL_VERSION: &str = "v2";

/// The only supported `encrypt` value.
pub const ENCRYPTION_ALGORITHM: &str = "AES";

/// The five recognized envelope fields, in wire order.
pub const ENVELOPE_FIELDS: [&str; 5] = ["version", "encrypt", "appKey", "reqId", "params"];

/// Fields the gateway requires before forwarding. `reqId` is only used for
/// log correlation and may be absent.
pub const REQUIRED_FIELDS: [&str; 4] = ["version", "encrypt", "appKey", "params"];

/// The plaintext business parameters of a call: an ordered string-keyed map.
pub type ParamObject = Map<String, Value>;

/// A fully-populated outbound envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub version: String,
    pub encrypt: String,
    pub app_key: String,
    pub req_id: String,
    pub params: String,
}

impl Envelope {
    /// Encrypt `params` and wrap it in a fresh envelope with a new `reqId`.
    ///
    /// # Errors
    ///
    /// Returns [`EncryptionError`] if the parameters cannot be serialized.
    pub fn seal<T: Serialize + ?Sized>(
        params: &T,
        app_key: &str,
        version: &str,
        secret: &SharedSecret,
    ) -> Result<Self, EncryptionError> {
        Ok(Self {
            version: version.to_owned(),
            encrypt: ENCRYPTION_ALGORITHM.to_owned(),
            app_key: app_key.to_owned(),
            req_id: new_req_id(),
            params: codec::encrypt(params, secret)?,
        })
    }

    /// Decrypt this envelope's `params`.
    ///
    /// # Errors
    ///
    /// Returns [`DecryptionError`] if the payload cannot be opened.
    pub fn open(&self, secret: &SharedSecret) -> Result<Value, DecryptionError> {
        codec::decrypt(&self.params, secret)
    }
}

/// An envelope as recovered by the sanitizer: only the five recognized
/// fields, each trimmed, with `params` reduced to validated Base64.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
}

impl CanonicalEnvelope {
    /// Names of required fields that are absent, in wire order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let present = [
            self.version.is_some(),
            self.encrypt.is_some(),
            self.app_key.is_some(),
            self.params.is_some(),
        ];
        REQUIRED_FIELDS
            .iter()
            .zip(present)
            .filter(|(_, present)| !present)
            .map(|(name, _)| *name)
            .collect()
    }

    /// Serialize to a JSON object containing only the present fields.
    pub fn to_json_map(&self) -> ParamObject {
        let mut map = Map::new();
        let fields = [
            ("version", &self.version),
            ("encrypt", &self.encrypt),
            ("appKey", &self.app_key),
            ("reqId", &self.req_id),
            ("params", &self.params),
        ];
        for (name, value) in fields {
            if let Some(v) = value {
                map.insert(name.to_owned(), Value::String(v.clone()));
            }
        }
        map
    }
}

impl From<Envelope> for CanonicalEnvelope {
    fn from(env: Envelope) -> Self {
        Self {
            version: Some(env.version),
            encrypt: Some(env.encrypt),
            app_key: Some(env.app_key),
            req_id: Some(env.req_id),
            params: Some(env.params),
        }
    }
}

/// Generate a request correlation id: `reqId_<unix millis>_<8 hex chars>`.
pub fn new_req_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("reqId_{millis}_{}", &suffix[..8])
}

/// Mask a credential for logging, keeping only its first four characters.
pub fn mask_credential(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{visible}****")
}
