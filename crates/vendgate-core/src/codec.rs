//! Envelope codec: AES-CBC + PKCS#7 over JSON, Base64 on the wire.
//!
//! `encrypt` serializes a parameter object to JSON, encrypts it with the
//! shared secret as key and the secret's first 16 bytes as IV, and returns
//! standard Base64. The IV is NOT prefixed to the output; the receiver
//! re-derives it from the same secret. `decrypt` reverses every step.
//!
//! Both directions are pure functions with no I/O.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{DecryptionError, EncryptionError};
use crate::secret::{AesKey, SharedSecret};

/// AES block size in bytes; every ciphertext is a multiple of it.
pub const AES_BLOCK_LEN: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Encrypt a parameter object into a Base64 envelope payload.
///
/// # Errors
///
/// Returns [`EncryptionError::Serialize`] if the object cannot be encoded as
/// JSON (for example a map with non-string keys).
pub fn encrypt<T: Serialize + ?Sized>(
    params: &T,
    secret: &SharedSecret,
) -> Result<String, EncryptionError> {
    let json = serde_json::to_vec(params).map_err(|e| EncryptionError::Serialize {
        reason: e.to_string(),
    })?;
    Ok(BASE64.encode(encrypt_bytes(&json, secret)))
}

/// Decrypt a Base64 envelope payload back into a JSON value.
///
/// # Errors
///
/// - [`DecryptionError::InvalidBase64`] if the input is not canonical Base64.
/// - [`DecryptionError::BadPadding`] if PKCS#7 unpadding fails.
/// - [`DecryptionError::InvalidPayload`] if the plaintext is not UTF-8 JSON.
pub fn decrypt(payload: &str, secret: &SharedSecret) -> Result<Value, DecryptionError> {
    decrypt_into(payload, secret)
}

/// Decrypt a Base64 envelope payload into a typed value.
///
/// # Errors
///
/// Same as [`decrypt`]; a JSON document that does not fit `T` is reported as
/// [`DecryptionError::InvalidPayload`].
pub fn decrypt_into<T: DeserializeOwned>(
    payload: &str,
    secret: &SharedSecret,
) -> Result<T, DecryptionError> {
    if !is_base64_payload(payload) {
        return Err(DecryptionError::InvalidBase64 {
            reason: format!(
                "expected a non-empty [A-Za-z0-9+/=] string with length divisible by 4, got {} chars",
                payload.len()
            ),
        });
    }

    let ciphertext = BASE64
        .decode(payload)
        .map_err(|e| DecryptionError::InvalidBase64 {
            reason: e.to_string(),
        })?;

    let plaintext = decrypt_bytes(&ciphertext, secret)?;

    let text = std::str::from_utf8(&plaintext).map_err(|e| DecryptionError::InvalidPayload {
        reason: format!("plaintext is not UTF-8: {e}"),
    })?;

    serde_json::from_str(text).map_err(|e| DecryptionError::InvalidPayload {
        reason: e.to_string(),
    })
}

/// AES-CBC encrypt raw bytes with PKCS#7 padding.
pub fn encrypt_bytes(plaintext: &[u8], secret: &SharedSecret) -> Vec<u8> {
    match secret.key() {
        AesKey::Aes128(k) => Aes128CbcEnc::new(&(*k).into(), &(*secret.iv()).into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        AesKey::Aes192(k) => Aes192CbcEnc::new(&(*k).into(), &(*secret.iv()).into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        AesKey::Aes256(k) => Aes256CbcEnc::new(&(*k).into(), &(*secret.iv()).into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
    }
}

/// AES-CBC decrypt raw bytes and strip PKCS#7 padding.
///
/// # Errors
///
/// Returns [`DecryptionError::BadPadding`] if the ciphertext is not a whole
/// number of blocks or the padding is invalid.
pub fn decrypt_bytes(ciphertext: &[u8], secret: &SharedSecret) -> Result<Vec<u8>, DecryptionError> {
    let result = match secret.key() {
        AesKey::Aes128(k) => Aes128CbcDec::new(&(*k).into(), &(*secret.iv()).into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        AesKey::Aes192(k) => Aes192CbcDec::new(&(*k).into(), &(*secret.iv()).into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        AesKey::Aes256(k) => Aes256CbcDec::new(&(*k).into(), &(*secret.iv()).into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
    };
    result.map_err(|_| DecryptionError::BadPadding)
}

/// Whether `s` is an envelope payload that decodes to a whole, non-zero
/// number of AES blocks. Short plaintext such as `"true"` or `"1234"` passes
/// [`is_base64_payload`] but not this check.
pub fn is_ciphertext_payload(s: &str) -> bool {
    is_base64_payload(s)
        && BASE64
            .decode(s)
            .is_ok_and(|bytes| !bytes.is_empty() && bytes.len() % AES_BLOCK_LEN == 0)
}

/// Whether `s` is a syntactically valid envelope payload: non-empty, only
/// `[A-Za-z0-9+/=]`, and a length divisible by 4.
pub fn is_base64_payload(s: &str) -> bool {
    !s.is_empty() && s.len() % 4 == 0 && s.bytes().all(is_base64_byte)
}

/// Whether `b` belongs to the standard Base64 alphabet (padding included).
pub fn is_base64_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use serde_json::{Map, json};

    use super::*;

    const SECRET: &str = "AK20241120145620";

    /// Arbitrary JSON values without floats (JSON text does not round-trip
    /// every `f64` bit pattern).
    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<String>().prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                proptest::collection::btree_map(any::<String>(), inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
            ]
        })
    }

    fn param_object() -> impl Strategy<Value = Value> {
        proptest::collection::btree_map("[a-zA-Z_]{1,12}", json_value(), 0..6)
            .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>()))
    }

    /// Printable ASCII secrets of every supported key length.
    fn secret_text() -> impl Strategy<Value = String> {
        prop_oneof![Just(16usize), Just(24usize), Just(32usize)].prop_flat_map(|len| {
            proptest::collection::vec(0x21u8..0x7f, len)
                .prop_map(|bytes| bytes.into_iter().map(char::from).collect::<String>())
        })
    }

    fn secret() -> SharedSecret {
        SharedSecret::new(SECRET).unwrap()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let params = json!({"type": "info", "timestamp": "1704794999"});
        let payload = encrypt(&params, &secret()).unwrap();
        let opened = decrypt(&payload, &secret()).unwrap();
        assert_eq!(opened, params);
    }

    #[test]
    fn roundtrip_preserves_nested_values() {
        let params = json!({
            "instances": [
                {"instanceNo": "c_1", "duration": 30, "autoRenew": false},
                {"instanceNo": "c_2", "duration": 7, "note": null}
            ],
            "price": 12.5,
            "tags": {"region": "us-east", "ipType": "static"}
        });
        for s in [
            "AK20241120145620",
            "0123456789abcdefghijklmn",
            "0123456789abcdefghijklmnopqrstuv",
        ] {
            let secret = SharedSecret::new(s).unwrap();
            let payload = encrypt(&params, &secret).unwrap();
            assert_eq!(decrypt(&payload, &secret).unwrap(), params);
        }
    }

    #[test]
    fn output_is_canonical_base64() {
        for params in [json!({}), json!({"a": 1}), json!({"long": "x".repeat(500)})] {
            let payload = encrypt(&params, &secret()).unwrap();
            assert!(!payload.is_empty());
            assert_eq!(payload.len() % 4, 0);
            assert!(is_base64_payload(&payload));
        }
    }

    #[test]
    fn encryption_is_deterministic_for_fixed_secret() {
        let params = json!({"type": "info"});
        let a = encrypt(&params, &secret()).unwrap();
        let b = encrypt(&params, &secret()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_object_encrypts_to_one_block() {
        // "{}" is 2 bytes, padded to a single 16-byte block = 24 Base64 chars.
        let payload = encrypt(&json!({}), &secret()).unwrap();
        assert_eq!(payload.len(), 24);
    }

    #[test]
    fn non_string_map_keys_fail_to_serialize() {
        let mut params = BTreeMap::new();
        params.insert(vec![1u8, 2], 3);
        let err = encrypt(&params, &secret()).unwrap_err();
        assert!(matches!(err, EncryptionError::Serialize { .. }));
    }

    #[test]
    fn wrong_secret_is_a_decryption_error() {
        let params = json!({"type": "info", "timestamp": "1704794999"});
        let payload = encrypt(&params, &secret()).unwrap();
        let other = SharedSecret::new("AK20241120145621").unwrap();
        let result = decrypt(&payload, &other);
        assert!(matches!(
            result,
            Err(DecryptionError::BadPadding | DecryptionError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn malformed_base64_is_distinguished() {
        let result = decrypt("not base64!", &secret());
        assert!(matches!(result, Err(DecryptionError::InvalidBase64 { .. })));

        let result = decrypt("abc", &secret());
        assert!(matches!(result, Err(DecryptionError::InvalidBase64 { .. })));

        let result = decrypt("", &secret());
        assert!(matches!(result, Err(DecryptionError::InvalidBase64 { .. })));
    }

    #[test]
    fn misplaced_padding_is_invalid_base64() {
        // Passes the alphabet/length check but is not decodable.
        let result = decrypt("A=AA", &secret());
        assert!(matches!(result, Err(DecryptionError::InvalidBase64 { .. })));
    }

    #[test]
    fn partial_block_is_bad_padding() {
        // 12 bytes of ciphertext cannot be a whole AES block.
        let payload = BASE64.encode([7u8; 12]);
        let result = decrypt(&payload, &secret());
        assert!(matches!(result, Err(DecryptionError::BadPadding)));
    }

    #[test]
    fn valid_ciphertext_of_non_json_is_invalid_payload() {
        let ciphertext = encrypt_bytes(b"definitely not json", &secret());
        let payload = BASE64.encode(ciphertext);
        let result = decrypt(&payload, &secret());
        assert!(matches!(result, Err(DecryptionError::InvalidPayload { .. })));
    }

    #[test]
    fn valid_ciphertext_of_non_utf8_is_invalid_payload() {
        let ciphertext = encrypt_bytes(&[0xff, 0xfe, 0xfd], &secret());
        let payload = BASE64.encode(ciphertext);
        let result = decrypt(&payload, &secret());
        assert!(matches!(result, Err(DecryptionError::InvalidPayload { .. })));
    }

    #[test]
    fn decrypt_into_typed_struct() {
        #[derive(serde::Deserialize, PartialEq, Debug)]
        struct Info {
            r#type: String,
            timestamp: String,
        }

        let payload = encrypt(&json!({"type": "info", "timestamp": "1"}), &secret()).unwrap();
        let info: Info = decrypt_into(&payload, &secret()).unwrap();
        assert_eq!(
            info,
            Info {
                r#type: "info".to_owned(),
                timestamp: "1".to_owned()
            }
        );
    }

    #[test]
    fn ciphertext_predicate_requires_whole_blocks() {
        let payload = encrypt(&json!({"a": 1}), &secret()).unwrap();
        assert!(is_ciphertext_payload(&payload));
        // Valid Base64, but 3 decoded bytes.
        assert!(!is_ciphertext_payload("true"));
        assert!(!is_ciphertext_payload("1234"));
        assert!(!is_ciphertext_payload("A=AA"));
        assert!(!is_ciphertext_payload(""));
    }

    #[test]
    fn base64_predicate_matches_alphabet_and_length() {
        assert!(is_base64_payload("MTIzNDU2Nzg="));
        assert!(is_base64_payload("ab+/"));
        assert!(!is_base64_payload("abc"));
        assert!(!is_base64_payload("ab-_"));
        assert!(!is_base64_payload(""));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            .. ProptestConfig::default()
        })]

        #[test]
        fn any_object_roundtrips_under_any_secret(params in param_object(), text in secret_text()) {
            let secret = SharedSecret::new(&text).unwrap();
            let payload = encrypt(&params, &secret).unwrap();
            prop_assert!(is_base64_payload(&payload));
            prop_assert!(is_ciphertext_payload(&payload));
            prop_assert_eq!(decrypt(&payload, &secret).unwrap(), params);
        }

        #[test]
        fn other_secret_never_yields_the_original(
            params in param_object(),
            text in secret_text(),
            other in secret_text(),
        ) {
            prop_assume!(text != other);
            let payload = encrypt(&params, &SharedSecret::new(&text).unwrap()).unwrap();
            let opened = decrypt(&payload, &SharedSecret::new(&other).unwrap());
            prop_assert!(opened.ok().as_ref() != Some(&params));
        }

        #[test]
        fn decrypt_never_panics_on_arbitrary_text(input in ".{0,128}") {
            let _ = decrypt(&input, &secret());
        }
    }
}
