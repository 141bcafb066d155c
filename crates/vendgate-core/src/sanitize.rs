//! Inbound payload sanitizer.
//!
//! The gateway is the trust boundary in front of the vendor: it never
//! forwards a payload that is not provably a syntactically valid Base64
//! envelope. Intermediate proxies and manual test tools tend to mangle the
//! body (stray whitespace, extra quotes, a `params: {...}` wrapper around the
//! ciphertext), so [`sanitize`] rebuilds a [`CanonicalEnvelope`] from
//! whatever arrived:
//!
//! 1. Only `version`, `encrypt`, `appKey`, `reqId` and `params` are copied.
//!    Every other field is dropped.
//! 2. `params` loses all whitespace, quote characters, `params:` labels and
//!    braces, then the longest run of Base64 alphabet characters is kept.
//! 3. The recovered `params` must be non-empty with a length divisible by 4,
//!    otherwise the whole request is rejected.
//! 4. The other fields are only trimmed.
//!
//! The function is total: it returns a canonical envelope or a
//! [`SanitizeError`], never panics.

use serde_json::Value;
use tracing::debug;

use crate::codec::is_base64_byte;
use crate::envelope::{CanonicalEnvelope, ENVELOPE_FIELDS};
use crate::error::SanitizeError;

/// Label some tools prepend to the ciphertext.
const PARAMS_LABEL: &str = "params:";

/// Reduce a raw request body to a canonical envelope.
///
/// Non-object bodies produce an envelope with every field absent; the
/// forwarder then rejects it as missing fields. Empty or whitespace-only
/// values count as absent.
///
/// # Errors
///
/// Returns [`SanitizeError::MalformedParams`] if `params` is present but no
/// valid Base64 payload can be recovered from it.
pub fn sanitize(raw: &Value) -> Result<CanonicalEnvelope, SanitizeError> {
    let Some(body) = raw.as_object() else {
        debug!("request body is not a JSON object, no envelope fields copied");
        return Ok(CanonicalEnvelope::default());
    };

    let dropped = body
        .keys()
        .filter(|k| !ENVELOPE_FIELDS.contains(&k.as_str()))
        .count();
    if dropped > 0 {
        debug!(dropped, "dropped unrecognized envelope fields");
    }

    let params = match body.get("params").and_then(field_text) {
        Some(text) => Some(recover_params(&text)?),
        None => None,
    };

    Ok(CanonicalEnvelope {
        version: trimmed_field(body.get("version")),
        encrypt: trimmed_field(body.get("encrypt")),
        app_key: trimmed_field(body.get("appKey")),
        req_id: trimmed_field(body.get("reqId")),
        params,
    })
}

/// Recover the Base64 ciphertext from a possibly-mangled `params` value.
///
/// # Errors
///
/// Returns [`SanitizeError::MalformedParams`] if the recovered substring is
/// empty or its length is not a multiple of 4.
pub fn recover_params(raw: &str) -> Result<String, SanitizeError> {
    let stripped: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '"' && *c != '\'')
        .collect();
    let unlabeled = stripped.replace(PARAMS_LABEL, "");
    let unbraced: String = unlabeled.chars().filter(|c| *c != '{' && *c != '}').collect();

    let recovered = longest_base64_run(&unbraced);

    if recovered.is_empty() {
        return Err(SanitizeError::MalformedParams {
            reason: "no base64 payload found in params".to_owned(),
        });
    }
    if recovered.len() % 4 != 0 {
        return Err(SanitizeError::MalformedParams {
            reason: format!(
                "recovered base64 length {} is not a multiple of 4",
                recovered.len()
            ),
        });
    }

    Ok(recovered.to_owned())
}

/// Longest contiguous substring of Base64 alphabet characters. Ties go to
/// the first run.
fn longest_base64_run(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut best = (0, 0);
    let mut start = None;

    for (i, b) in bytes.iter().enumerate() {
        match (is_base64_byte(*b), start) {
            (true, None) => start = Some(i),
            (false, Some(from)) => {
                if i - from > best.1 - best.0 {
                    best = (from, i);
                }
                start = None;
            }
            _ => {}
        }
    }
    if let Some(from) = start {
        if bytes.len() - from > best.1 - best.0 {
            best = (from, bytes.len());
        }
    }

    // Run boundaries sit next to ASCII bytes, so they are char boundaries.
    s.get(best.0..best.1).unwrap_or_default()
}

/// Text form of a JSON field value. `null` is treated as absent.
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn trimmed_field(value: Option<&Value>) -> Option<String> {
    let text = value.and_then(field_text)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}
