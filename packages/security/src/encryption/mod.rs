// ABOUTME: OAuth token encryption using AES-256-GCM with per-record key derivation
// ABOUTME: Stretches a master key once, then derives a fresh key per encryption from a random salt
//
// SECURITY MODEL:
//
// The master key comes from configuration and is stretched once through
// PBKDF2-HMAC-SHA256 into a working key held for the instance lifetime. Every
// encryption then draws a fresh random salt and derives a one-off record key
// from the working key, so two encryptions of the same plaintext never share
// a derived key, an IV, or a ciphertext. A leaked (iv, salt, tag) tuple
// therefore exposes exactly one record, and offline dictionary attacks
// against a single derived key gain nothing about the rest of the table.

use aes_gcm::{
    aead::{consts::U16, generic_array::GenericArray, Aead, KeyInit},
    aes::Aes256,
    AesGcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

/// AES-256-GCM with the 128-bit IV the stored-token format carries.
type TokenCipher = AesGcm<Aes256, U16>;

/// Application salt for the one-time master key stretch (constant, not secret)
const MASTER_KEY_SALT: &[u8] = b"applytrack-oauth-token-encryption-v1";

/// PBKDF2-HMAC-SHA256 rounds for both the master stretch and per-record keys
const KDF_ITERATIONS: u32 = 100_000;

const KEY_SIZE: usize = 32;
const IV_SIZE: usize = 16;
const TAG_SIZE: usize = 16;
const SALT_SIZE: usize = 32;

/// Minimum length of the configured master key
const MIN_MASTER_KEY_CHARS: usize = 32;

/// Number of colon-separated fields in the stored string format
const ENCRYPTED_PARTS: usize = 4;

/// Environment variable holding the master key
pub const TOKEN_ENCRYPTION_KEY_ENV: &str = "TOKEN_ENCRYPTION_KEY";

pub type EncryptionResult<T> = Result<T, EncryptionError>;

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("Invalid encryption configuration: {0}")]
    Configuration(String),

    #[error("Cannot encrypt an empty token")]
    EmptyPlaintext,

    #[error("Failed to encrypt token: {0}")]
    Encryption(String),

    #[error("Failed to decrypt token: {0}")]
    Decryption(String),

    #[error("Invalid encrypted token format: {0}")]
    InvalidFormat(String),
}

/// An encrypted OAuth token, ready to embed wherever the caller persists it.
///
/// All four components are independently base64 encoded. The value is
/// replaced wholesale on token rotation, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedToken {
    pub encrypted: String,
    pub iv: String,
    pub auth_tag: String,
    pub salt: String,
}

impl EncryptedToken {
    /// Join the four components into the storable
    /// `ciphertext:iv:authTag:salt` string.
    ///
    /// Field order and count are a compatibility contract: changing either
    /// breaks every previously stored token.
    pub fn to_encoded_string(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.encrypted, self.iv, self.auth_tag, self.salt
        )
    }

    /// Split a stored string back into its four components.
    pub fn from_encoded_string(encoded: &str) -> EncryptionResult<Self> {
        let parts: Vec<&str> = encoded.split(':').collect();
        if parts.len() != ENCRYPTED_PARTS {
            return Err(EncryptionError::InvalidFormat(format!(
                "Expected {} colon-separated fields, found {}",
                ENCRYPTED_PARTS,
                parts.len()
            )));
        }

        Ok(Self {
            encrypted: parts[0].to_string(),
            iv: parts[1].to_string(),
            auth_tag: parts[2].to_string(),
            salt: parts[3].to_string(),
        })
    }
}

/// Authenticated encryption service for OAuth provider tokens at rest.
///
/// Construction fails when the master key is missing or shorter than 32
/// characters; a process holding provider tokens must not start with a weak
/// key.
#[derive(Debug)]
pub struct OAuthTokenEncryption {
    working_key: [u8; KEY_SIZE],
}

impl OAuthTokenEncryption {
    /// Create the service from a configured master key.
    pub fn new(master_key: &str) -> EncryptionResult<Self> {
        if master_key.is_empty() {
            return Err(EncryptionError::Configuration(
                "Token encryption key is not set".to_string(),
            ));
        }

        if master_key.chars().count() < MIN_MASTER_KEY_CHARS {
            return Err(EncryptionError::Configuration(format!(
                "Token encryption key must be at least {} characters",
                MIN_MASTER_KEY_CHARS
            )));
        }

        let mut working_key = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(
            master_key.as_bytes(),
            MASTER_KEY_SALT,
            KDF_ITERATIONS,
            &mut working_key,
        );

        Ok(Self { working_key })
    }

    /// Create the service from the `TOKEN_ENCRYPTION_KEY` environment variable.
    pub fn from_env() -> EncryptionResult<Self> {
        let key = std::env::var(TOKEN_ENCRYPTION_KEY_ENV).map_err(|_| {
            EncryptionError::Configuration(format!("{} is not set", TOKEN_ENCRYPTION_KEY_ENV))
        })?;
        Self::new(&key)
    }

    /// Derive the one-off key for a record from the working key and its salt.
    fn derive_record_key(&self, salt: &[u8]) -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(&self.working_key, salt, KDF_ITERATIONS, &mut key);
        key
    }

    /// Encrypt a plaintext token.
    ///
    /// Draws a fresh 128-bit IV and 256-bit salt per call; the same plaintext
    /// never encrypts to the same ciphertext twice.
    pub fn encrypt(&self, token: &str) -> EncryptionResult<EncryptedToken> {
        if token.is_empty() {
            return Err(EncryptionError::EmptyPlaintext);
        }

        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);

        let record_key = self.derive_record_key(&salt);
        let cipher = TokenCipher::new(GenericArray::from_slice(&record_key));

        let mut sealed = cipher
            .encrypt(GenericArray::from_slice(&iv), token.as_bytes())
            .map_err(|e| EncryptionError::Encryption(format!("AEAD seal failed: {}", e)))?;

        // The cipher appends the 16-byte tag; the stored format keeps it as
        // its own field.
        let auth_tag = sealed.split_off(sealed.len() - TAG_SIZE);

        debug!("Encrypted OAuth token ({} ciphertext bytes)", sealed.len());

        Ok(EncryptedToken {
            encrypted: BASE64.encode(&sealed),
            iv: BASE64.encode(iv),
            auth_tag: BASE64.encode(&auth_tag),
            salt: BASE64.encode(salt),
        })
    }

    /// Encrypt a token straight into the storable string form.
    pub fn encrypt_to_string(&self, token: &str) -> EncryptionResult<String> {
        Ok(self.encrypt(token)?.to_encoded_string())
    }

    /// Decrypt an encrypted token.
    ///
    /// Fails closed: a missing component, malformed base64, or an
    /// authentication tag that does not verify all reject the call. No
    /// plaintext is ever returned from a failed verification.
    pub fn decrypt(&self, token: &EncryptedToken) -> EncryptionResult<String> {
        if token.encrypted.is_empty()
            || token.iv.is_empty()
            || token.auth_tag.is_empty()
            || token.salt.is_empty()
        {
            return Err(EncryptionError::InvalidFormat(
                "Missing encrypted token component".to_string(),
            ));
        }

        let ciphertext = decode_component(&token.encrypted, "ciphertext")?;
        let iv = decode_component(&token.iv, "iv")?;
        let auth_tag = decode_component(&token.auth_tag, "authTag")?;
        let salt = decode_component(&token.salt, "salt")?;

        if iv.len() != IV_SIZE {
            return Err(EncryptionError::InvalidFormat(format!(
                "IV must be {} bytes, found {}",
                IV_SIZE,
                iv.len()
            )));
        }
        if auth_tag.len() != TAG_SIZE {
            return Err(EncryptionError::InvalidFormat(format!(
                "Authentication tag must be {} bytes, found {}",
                TAG_SIZE,
                auth_tag.len()
            )));
        }

        let record_key = self.derive_record_key(&salt);
        let cipher = TokenCipher::new(GenericArray::from_slice(&record_key));

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&auth_tag);

        let plaintext = cipher
            .decrypt(GenericArray::from_slice(&iv), sealed.as_slice())
            .map_err(|_| {
                EncryptionError::Decryption(
                    "Authentication tag verification failed or ciphertext is corrupt".to_string(),
                )
            })?;

        String::from_utf8(plaintext).map_err(|_| {
            EncryptionError::Decryption("Decrypted token is not valid UTF-8".to_string())
        })
    }

    /// Decrypt a token from its storable string form.
    pub fn decrypt_from_string(&self, encoded: &str) -> EncryptionResult<String> {
        let token = EncryptedToken::from_encoded_string(encoded)?;
        self.decrypt(&token)
    }

    /// Check whether a string looks like a well-formed encrypted token:
    /// exactly four non-empty base64 fields. Pure; performs no decryption.
    pub fn is_valid_encrypted_string(encoded: &str) -> bool {
        let parts: Vec<&str> = encoded.split(':').collect();
        parts.len() == ENCRYPTED_PARTS
            && parts
                .iter()
                .all(|part| !part.is_empty() && BASE64.decode(part).is_ok())
    }

    /// Generate a fresh random 256-bit master key, hex encoded.
    ///
    /// Provisioning and rotation tooling only; never called at runtime.
    pub fn generate_encryption_key() -> String {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        hex::encode(key)
    }
}

fn decode_component(encoded: &str, name: &str) -> EncryptionResult<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|e| EncryptionError::InvalidFormat(format!("Invalid base64 in {}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> &'static str {
        "unit-test-master-key-0123456789abcdef"
    }

    fn service() -> OAuthTokenEncryption {
        OAuthTokenEncryption::new(test_key()).unwrap()
    }

    fn flip_first_byte(encoded: &str) -> String {
        let mut bytes = BASE64.decode(encoded).unwrap();
        bytes[0] ^= 0x01;
        BASE64.encode(bytes)
    }

    #[test]
    fn test_construction_rejects_empty_key() {
        let result = OAuthTokenEncryption::new("");
        assert!(matches!(
            result.unwrap_err(),
            EncryptionError::Configuration(_)
        ));
    }

    #[test]
    fn test_construction_rejects_short_key() {
        let result = OAuthTokenEncryption::new("too-short");
        assert!(matches!(
            result.unwrap_err(),
            EncryptionError::Configuration(_)
        ));
    }

    #[test]
    fn test_construction_accepts_32_char_key() {
        assert!(OAuthTokenEncryption::new(&"k".repeat(32)).is_ok());
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let crypto = service();
        let plaintext = "ya29.a0AfH6SMC-example-access-token";

        let encrypted = crypto.encrypt(plaintext).unwrap();
        assert_ne!(encrypted.encrypted, plaintext);

        let decrypted = crypto.decrypt(&encrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_rejects_empty_token() {
        let crypto = service();
        assert!(matches!(
            crypto.encrypt("").unwrap_err(),
            EncryptionError::EmptyPlaintext
        ));
    }

    #[test]
    fn test_fresh_iv_salt_and_ciphertext_every_call() {
        let crypto = service();
        let plaintext = "refresh-token-value";

        let first = crypto.encrypt(plaintext).unwrap();
        let second = crypto.encrypt(plaintext).unwrap();

        assert_ne!(first.iv, second.iv);
        assert_ne!(first.salt, second.salt);
        assert_ne!(first.encrypted, second.encrypted);

        assert_eq!(crypto.decrypt(&first).unwrap(), plaintext);
        assert_eq!(crypto.decrypt(&second).unwrap(), plaintext);
    }

    #[test]
    fn test_component_sizes() {
        let encrypted = service().encrypt("token").unwrap();
        assert_eq!(BASE64.decode(&encrypted.iv).unwrap().len(), IV_SIZE);
        assert_eq!(BASE64.decode(&encrypted.auth_tag).unwrap().len(), TAG_SIZE);
        assert_eq!(BASE64.decode(&encrypted.salt).unwrap().len(), SALT_SIZE);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let crypto = service();
        let mut encrypted = crypto.encrypt("access-token").unwrap();
        encrypted.encrypted = flip_first_byte(&encrypted.encrypted);
        assert!(matches!(
            crypto.decrypt(&encrypted).unwrap_err(),
            EncryptionError::Decryption(_)
        ));
    }

    #[test]
    fn test_tampered_iv_fails() {
        let crypto = service();
        let mut encrypted = crypto.encrypt("access-token").unwrap();
        encrypted.iv = flip_first_byte(&encrypted.iv);
        assert!(crypto.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_tampered_auth_tag_fails() {
        let crypto = service();
        let mut encrypted = crypto.encrypt("access-token").unwrap();
        encrypted.auth_tag = flip_first_byte(&encrypted.auth_tag);
        assert!(matches!(
            crypto.decrypt(&encrypted).unwrap_err(),
            EncryptionError::Decryption(_)
        ));
    }

    #[test]
    fn test_tampered_salt_fails() {
        let crypto = service();
        let mut encrypted = crypto.encrypt("access-token").unwrap();
        encrypted.salt = flip_first_byte(&encrypted.salt);
        assert!(crypto.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_missing_component_rejected() {
        let crypto = service();
        let mut encrypted = crypto.encrypt("access-token").unwrap();
        encrypted.auth_tag = String::new();
        assert!(matches!(
            crypto.decrypt(&encrypted).unwrap_err(),
            EncryptionError::InvalidFormat(_)
        ));
    }

    #[test]
    fn test_different_master_keys_cannot_decrypt() {
        let crypto = service();
        let other = OAuthTokenEncryption::new(&"other-master-key-".repeat(3)).unwrap();

        let encrypted = crypto.encrypt("access-token").unwrap();
        assert!(other.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_string_format_has_three_colons() {
        let encoded = service().encrypt_to_string("ya29.a0AfH6SMC").unwrap();
        assert_eq!(encoded.matches(':').count(), 3);
    }

    #[test]
    fn test_string_roundtrip() {
        let crypto = service();
        let plaintext = "ya29.a0AfH6SMC-example-access-token";

        let encoded = crypto.encrypt_to_string(plaintext).unwrap();
        assert_eq!(crypto.decrypt_from_string(&encoded).unwrap(), plaintext);
    }

    #[test]
    fn test_decrypt_from_string_rejects_wrong_part_count() {
        let crypto = service();

        for bad in ["", "abc", "a:b", "a:b:c", "a:b:c:d:e"] {
            assert!(matches!(
                crypto.decrypt_from_string(bad).unwrap_err(),
                EncryptionError::InvalidFormat(_)
            ));
        }
    }

    #[test]
    fn test_is_valid_encrypted_string() {
        let encoded = service().encrypt_to_string("token").unwrap();
        assert!(OAuthTokenEncryption::is_valid_encrypted_string(&encoded));

        assert!(!OAuthTokenEncryption::is_valid_encrypted_string(""));
        assert!(!OAuthTokenEncryption::is_valid_encrypted_string("a:b:c"));
        assert!(!OAuthTokenEncryption::is_valid_encrypted_string(
            "a:b:c:d:e"
        ));
        assert!(!OAuthTokenEncryption::is_valid_encrypted_string(
            ":::"
        ));
        assert!(!OAuthTokenEncryption::is_valid_encrypted_string(
            "not-base64!@#:YWJj:YWJj:YWJj"
        ));
    }

    #[test]
    fn test_generate_encryption_key_shape() {
        let key = OAuthTokenEncryption::generate_encryption_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));

        // Fresh entropy every call, and long enough to use as a master key
        assert_ne!(key, OAuthTokenEncryption::generate_encryption_key());
        assert!(OAuthTokenEncryption::new(&key).is_ok());
    }

    #[test]
    fn test_unicode_token_roundtrip() {
        let crypto = service();
        let plaintext = "token-with-unicode-\u{00e9}\u{4e16}\u{754c}";
        let encrypted = crypto.encrypt(plaintext).unwrap();
        assert_eq!(crypto.decrypt(&encrypted).unwrap(), plaintext);
    }
}
