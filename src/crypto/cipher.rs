// PassGuard — Credential Cipher
//
// Reversible protection of system credential secrets at rest. AES-256-CBC
// with a fresh random IV per call; envelopes are `hex(iv):hex(ciphertext)`.
// Decryption never raises: any malformed envelope or key mismatch yields
// None, and callers must treat that as "secret unavailable".

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::config::ENCRYPTION_KEY_LEN;
use crate::error::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// IV length for AES-CBC, in bytes.
const IV_LEN: usize = 16;

/// Symmetric cipher for stored secrets. Construct once at startup from the
/// validated configuration key and share by reference.
pub struct CredentialCipher {
    key: Zeroizing<[u8; ENCRYPTION_KEY_LEN]>,
}

impl CredentialCipher {
    /// Build a cipher from the configured key. The key must be exactly
    /// 32 bytes; anything else is a fatal configuration error.
    pub fn new(key: &str) -> Result<Self> {
        let bytes = key.as_bytes();
        if bytes.len() != ENCRYPTION_KEY_LEN {
            return Err(Error::Validation(format!(
                "Encryption key must be exactly {} bytes long (got {})",
                ENCRYPTION_KEY_LEN,
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; ENCRYPTION_KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Encrypt a plaintext secret into an `iv:ciphertext` envelope.
    /// Empty input yields None: empty values are never encrypted.
    pub fn encrypt(&self, plaintext: &str) -> Option<String> {
        if plaintext.is_empty() {
            return None;
        }

        let mut iv = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut iv);

        let key = GenericArray::from_slice(self.key.as_slice());
        let ciphertext = Aes256CbcEnc::new(key, &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        Some(format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)))
    }

    /// Decrypt an `iv:ciphertext` envelope back to the plaintext secret.
    /// Returns None on any malformed envelope, padding failure, or non-UTF-8
    /// output — never an error.
    pub fn decrypt(&self, envelope: &str) -> Option<Zeroizing<String>> {
        if envelope.is_empty() {
            return None;
        }

        let (iv_hex, ct_hex) = envelope.split_once(':')?;
        let iv_bytes = hex::decode(iv_hex).ok()?;
        let ciphertext = hex::decode(ct_hex).ok()?;

        let iv: [u8; IV_LEN] = iv_bytes.try_into().ok()?;

        let key = GenericArray::from_slice(self.key.as_slice());
        let plaintext = Aes256CbcDec::new(key, &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .ok()?;

        String::from_utf8(plaintext).ok().map(Zeroizing::new)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn cipher() -> CredentialCipher {
        CredentialCipher::new(KEY).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let c = cipher();
        let envelope = c.encrypt("s3cret-db-password").unwrap();
        let plain = c.decrypt(&envelope).unwrap();
        assert_eq!(plain.as_str(), "s3cret-db-password");
    }

    #[test]
    fn test_fresh_iv_produces_distinct_envelopes() {
        let c = cipher();
        let a = c.encrypt("same input").unwrap();
        let b = c.encrypt("same input").unwrap();
        assert_ne!(a, b, "Two encryptions of the same plaintext must differ");
        // Both still decrypt to the original.
        assert_eq!(c.decrypt(&a).unwrap().as_str(), "same input");
        assert_eq!(c.decrypt(&b).unwrap().as_str(), "same input");
    }

    #[test]
    fn test_envelope_shape() {
        let c = cipher();
        let envelope = c.encrypt("x").unwrap();
        let (iv_hex, ct_hex) = envelope.split_once(':').unwrap();
        assert_eq!(iv_hex.len(), IV_LEN * 2);
        assert!(hex::decode(iv_hex).is_ok());
        assert!(hex::decode(ct_hex).is_ok());
    }

    #[test]
    fn test_empty_input_yields_no_envelope() {
        assert!(cipher().encrypt("").is_none());
    }

    #[test]
    fn test_malformed_envelopes_decrypt_to_none() {
        let c = cipher();
        assert!(c.decrypt("").is_none());
        assert!(c.decrypt("no-colon-here").is_none());
        assert!(c.decrypt("nothex:deadbeef").is_none());
        assert!(c.decrypt("abcd:nothex").is_none());
        // Valid hex but a truncated IV.
        assert!(c.decrypt("abcd:deadbeef").is_none());
    }

    #[test]
    fn test_wrong_key_decrypts_to_none() {
        let envelope = cipher().encrypt("top secret").unwrap();
        let other = CredentialCipher::new("ffffffffffffffffffffffffffffffff").unwrap();
        assert!(other.decrypt(&envelope).is_none());
    }

    #[test]
    fn test_key_length_validated_at_construction() {
        assert!(CredentialCipher::new("short").is_err());
        assert!(CredentialCipher::new(&"x".repeat(31)).is_err());
        assert!(CredentialCipher::new(&"x".repeat(33)).is_err());
        assert!(CredentialCipher::new(&"x".repeat(32)).is_ok());
    }
}
