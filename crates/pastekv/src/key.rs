//! PasteKey: a SHA-256 content hash truncated to 128 bits.
//!
//! Keys travel as unpadded URL-safe base64 (22 chars) in request paths and
//! are namespaced under `paste/` in the backend keyspace so they can share a
//! Redis database with unrelated data.
//!
//! The truncation length is a build-time constant. With 16 bytes the chance
//! of any collision among `n` live pastes is roughly `n² / 2^129`, about
//! 1.5e-21 for a billion pastes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of digest bytes kept in a key.
pub const PASTE_KEY_LEN: usize = 16;

/// Length of [`PasteKey::encode`] output for [`PASTE_KEY_LEN`] bytes.
pub const ENCODED_KEY_LEN: usize = (PASTE_KEY_LEN * 4).div_ceil(3);

/// Namespace for paste records in the backend keyspace.
pub const STORE_KEY_PREFIX: &str = "paste/";

/// A content-derived paste identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PasteKey([u8; PASTE_KEY_LEN]);

/// Errors from decoding a textual key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid key length: expected 22 chars, got {0}")]
    InvalidLength(usize),

    #[error("invalid key encoding: {0}")]
    InvalidEncoding(String),
}

impl PasteKey {
    /// Hash content and keep the first [`PASTE_KEY_LEN`] bytes.
    ///
    /// The bytes are hashed exactly as given: no trimming, no newline or
    /// unicode normalization.
    pub fn derive(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);
        let mut sum = [0u8; PASTE_KEY_LEN];
        sum.copy_from_slice(&digest[..PASTE_KEY_LEN]);
        Self(sum)
    }

    /// URL-safe base64 without padding.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Parse the output of [`PasteKey::encode`].
    ///
    /// Rejects padding, characters outside the URL-safe alphabet,
    /// non-canonical trailing bits, and anything that does not decode to
    /// exactly [`PASTE_KEY_LEN`] bytes.
    pub fn decode(text: &str) -> Result<Self, KeyError> {
        if text.len() != ENCODED_KEY_LEN {
            return Err(KeyError::InvalidLength(text.len()));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(text)
            .map_err(|e| KeyError::InvalidEncoding(e.to_string()))?;

        let sum: [u8; PASTE_KEY_LEN] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| KeyError::InvalidEncoding(format!("decoded to {} bytes", b.len())))?;

        Ok(Self(sum))
    }

    /// Key under which the paste lives in the backend.
    pub fn store_key(&self) -> String {
        format!("{}{}", STORE_KEY_PREFIX, self.encode())
    }

    /// Path of the rendered paste page.
    pub fn path(&self) -> String {
        format!("/paste/{}", self.encode())
    }

    /// Path of the raw paste body.
    pub fn raw_path(&self) -> String {
        format!("/paste/{}/raw", self.encode())
    }

    pub fn as_bytes(&self) -> &[u8; PASTE_KEY_LEN] {
        &self.0
    }
}

impl fmt::Display for PasteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for PasteKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl From<[u8; PASTE_KEY_LEN]> for PasteKey {
    fn from(sum: [u8; PASTE_KEY_LEN]) -> Self {
        Self(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_len_is_22() {
        assert_eq!(ENCODED_KEY_LEN, 22);
        let key = PasteKey::derive(b"anything");
        assert_eq!(key.encode().len(), ENCODED_KEY_LEN);
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = PasteKey::derive(b"test data");
        let b = PasteKey::derive(b"test data");
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_known_vectors() {
        // First 16 bytes of SHA-256, so keys stay stable across restarts and releases.
        assert_eq!(PasteKey::derive(b"hello world").encode(), "uU0nuZNNPgilLlLX2n2r-g");
        assert_eq!(PasteKey::derive(b"").encode(), "47DEQpj8HBSa-_TImW-5JA");
    }

    #[test]
    fn test_derive_does_not_normalize() {
        let plain = PasteKey::derive(b"hello world");
        assert_ne!(plain, PasteKey::derive(b"hello world\n"));
        assert_ne!(plain, PasteKey::derive(b" hello world"));
        assert_ne!(plain, PasteKey::derive(b"hello world\r\n"));
    }

    #[test]
    fn test_decode_roundtrip() {
        for content in [&b"a"[..], b"Concurrent Data", b"\x00\xff\x10", b""] {
            let key = PasteKey::derive(content);
            assert_eq!(PasteKey::decode(&key.encode()), Ok(key));
        }
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert_eq!(PasteKey::decode(""), Err(KeyError::InvalidLength(0)));
        assert_eq!(PasteKey::decode("uU0nuZNNPgilLlLX2n2r"), Err(KeyError::InvalidLength(20)));
        // 12-byte keys from older deployments are not accepted.
        assert_eq!(PasteKey::decode("uU0nuZNNPgilLlLX"), Err(KeyError::InvalidLength(16)));
    }

    #[test]
    fn test_decode_rejects_padding() {
        assert!(PasteKey::decode("uU0nuZNNPgilLlLX2n2r-g==").is_err());
        assert!(matches!(
            PasteKey::decode("uU0nuZNNPgilLlLX2n2r=="),
            Err(KeyError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_decode_rejects_standard_alphabet() {
        // '+' and '/' belong to the standard alphabet, not the URL-safe one.
        assert!(matches!(
            PasteKey::decode("uU0nuZNNPgilLlLX2n2r+g"),
            Err(KeyError::InvalidEncoding(_))
        ));
        assert!(matches!(
            PasteKey::decode("uU0nuZNNPgilLlLX2n2r/g"),
            Err(KeyError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_decode_rejects_non_canonical_trailing_bits() {
        // Same leading bits as "...-g" but the unused low bits are set.
        assert!(matches!(
            PasteKey::decode("uU0nuZNNPgilLlLX2n2r-h"),
            Err(KeyError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(PasteKey::decode("not-a-valid-encoding!!").is_err());
    }

    #[test]
    fn test_store_key_and_paths() {
        let key = PasteKey::derive(b"hello world");
        assert_eq!(key.store_key(), "paste/uU0nuZNNPgilLlLX2n2r-g");
        assert_eq!(key.path(), "/paste/uU0nuZNNPgilLlLX2n2r-g");
        assert_eq!(key.raw_path(), "/paste/uU0nuZNNPgilLlLX2n2r-g/raw");
    }

    #[test]
    fn test_display_and_from_str() {
        let key = PasteKey::derive(b"display test");
        let text = format!("{}", key);
        assert_eq!(text, key.encode());
        let parsed: PasteKey = text.parse().unwrap();
        assert_eq!(parsed, key);
    }
}
