// ABOUTME: Convenience helpers for the provider token triple
// ABOUTME: Encrypts and decrypts access/refresh/id tokens while preserving optional fields

use serde::{Deserialize, Serialize};

use crate::encryption::{EncryptionResult, OAuthTokenEncryption};

/// The token triple a provider exchange returns.
///
/// Holds plaintext on the way in and encoded `ciphertext:iv:authTag:salt`
/// strings on the way out; which optional fields are present is preserved
/// in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
}

/// Encrypt a provider token set for persistence.
pub fn encrypt_oauth_tokens(
    crypto: &OAuthTokenEncryption,
    tokens: &OAuthTokenSet,
) -> EncryptionResult<OAuthTokenSet> {
    Ok(OAuthTokenSet {
        access_token: crypto.encrypt_to_string(&tokens.access_token)?,
        refresh_token: tokens
            .refresh_token
            .as_deref()
            .map(|token| crypto.encrypt_to_string(token))
            .transpose()?,
        id_token: tokens
            .id_token
            .as_deref()
            .map(|token| crypto.encrypt_to_string(token))
            .transpose()?,
    })
}

/// Decrypt a persisted provider token set.
pub fn decrypt_oauth_tokens(
    crypto: &OAuthTokenEncryption,
    tokens: &OAuthTokenSet,
) -> EncryptionResult<OAuthTokenSet> {
    Ok(OAuthTokenSet {
        access_token: crypto.decrypt_from_string(&tokens.access_token)?,
        refresh_token: tokens
            .refresh_token
            .as_deref()
            .map(|token| crypto.decrypt_from_string(token))
            .transpose()?,
        id_token: tokens
            .id_token
            .as_deref()
            .map(|token| crypto.decrypt_from_string(token))
            .transpose()?,
    })
}
