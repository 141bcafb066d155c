//! The shared secret used by the envelope codec.
//!
//! The vendor contract uses one secret string for two things: its full UTF-8
//! bytes are the AES key, and its first 16 bytes are the CBC initialization
//! vector. The IV is therefore fixed per deployment rather than random per
//! message. This is the wire scheme the vendor expects and must be
//! reproduced exactly.
//!
//! # Security model
//!
//! - Key and IV bytes are zeroized when the secret is dropped.
//! - `Debug` output never shows the bytes.
//! - The AES variant (128/192/256) is picked from the secret's byte length.

use std::fmt;

use zeroize::Zeroize;

use crate::error::EncryptionError;

/// Length of the AES-CBC initialization vector.
pub const IV_LEN: usize = 16;

/// Minimum secret length: the IV is sliced from the first 16 bytes.
pub const MIN_SECRET_LEN: usize = IV_LEN;

/// AES key material sized by the secret's byte length.
#[derive(Clone)]
pub(crate) enum AesKey {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

impl Drop for AesKey {
    fn drop(&mut self) {
        match self {
            Self::Aes128(k) => k.zeroize(),
            Self::Aes192(k) => k.zeroize(),
            Self::Aes256(k) => k.zeroize(),
        }
    }
}

/// A validated shared secret: AES key plus the IV derived from it.
#[derive(Clone)]
pub struct SharedSecret {
    key: AesKey,
    iv: [u8; IV_LEN],
}

impl SharedSecret {
    /// Validate a secret string and derive the key and IV from it.
    ///
    /// # Errors
    ///
    /// - [`EncryptionError::SecretTooShort`] if the secret is under 16 bytes.
    /// - [`EncryptionError::UnsupportedKeyLength`] if its byte length is not
    ///   16, 24 or 32.
    pub fn new(secret: &str) -> Result<Self, EncryptionError> {
        let bytes = secret.as_bytes();
        if bytes.len() < MIN_SECRET_LEN {
            return Err(EncryptionError::SecretTooShort {
                expected: MIN_SECRET_LEN,
                actual: bytes.len(),
            });
        }

        let key = match bytes.len() {
            16 => AesKey::Aes128(copy_array(bytes)),
            24 => AesKey::Aes192(copy_array(bytes)),
            32 => AesKey::Aes256(copy_array(bytes)),
            other => return Err(EncryptionError::UnsupportedKeyLength { actual: other }),
        };

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&bytes[..IV_LEN]);

        Ok(Self { key, iv })
    }

    /// Key size in bits (128, 192 or 256).
    pub fn key_bits(&self) -> usize {
        match self.key {
            AesKey::Aes128(_) => 128,
            AesKey::Aes192(_) => 192,
            AesKey::Aes256(_) => 256,
        }
    }

    pub(crate) fn key(&self) -> &AesKey {
        &self.key
    }

    pub(crate) fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.iv.zeroize();
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret")
            .field("key_bits", &self.key_bits())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

fn copy_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
