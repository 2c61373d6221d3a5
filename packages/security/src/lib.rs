// ABOUTME: Applytrack security library for protecting OAuth tokens at rest
// ABOUTME: Provides authenticated encryption so a database compromise does not expose usable tokens

pub mod encryption;
pub mod tokens;

// Re-export main types
pub use encryption::{
    EncryptedToken, EncryptionError, EncryptionResult, OAuthTokenEncryption,
    TOKEN_ENCRYPTION_KEY_ENV,
};
pub use tokens::{decrypt_oauth_tokens, encrypt_oauth_tokens, OAuthTokenSet};
