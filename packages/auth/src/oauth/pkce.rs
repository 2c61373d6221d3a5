// ABOUTME: State token and PKCE (Proof Key for Code Exchange) generation
// ABOUTME: Produces 256-bit URL-safe tokens and SHA256 challenges per RFC 7636

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::{AuthError, AuthResult};

/// Raw entropy for state tokens and code verifiers. 32 bytes render to a
/// fixed 43-character base64url string.
const TOKEN_BYTES: usize = 32;

/// Generate a CSRF state token: 256 bits from the OS RNG, URL-safe encoded.
pub fn generate_state_token() -> String {
    random_urlsafe_token()
}

/// Generate a PKCE code verifier.
///
/// 32 random bytes encoded as unpadded base64url, which renders at 43
/// characters and therefore sits inside the 43-128 range RFC 7636 mandates.
pub fn generate_code_verifier() -> AuthResult<String> {
    let verifier = random_urlsafe_token();

    if verifier.len() < 43 || verifier.len() > 128 {
        return Err(AuthError::Pkce(format!(
            "Invalid code verifier length: {}",
            verifier.len()
        )));
    }

    Ok(verifier)
}

/// Compute the S256 code challenge for a verifier.
///
/// SHA-256 of the verifier, base64url encoded without padding. Deterministic
/// and side-effect free.
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Verify that a code verifier matches a code challenge.
///
/// This is normally the authorization server's job, but it is useful for
/// testing and validation.
pub fn verify_code_challenge(verifier: &str, challenge: &str) -> bool {
    generate_code_challenge(verifier) == challenge
}

fn random_urlsafe_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
