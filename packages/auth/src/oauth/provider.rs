// ABOUTME: OAuth provider definitions for job-platform sign-in
// ABOUTME: Carries per-provider endpoints, scopes, and the PKCE capability table

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AuthError, AuthResult};

/// Supported OAuth providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    GitHub,
    LinkedIn,
}

impl OAuthProvider {
    /// Whether this provider's flow carries a PKCE code verifier.
    ///
    /// This is the per-provider capability table: adding a provider means
    /// adding a match arm here, never touching the flow logic.
    pub fn uses_pkce(&self) -> bool {
        match self {
            Self::Google => true,
            Self::GitHub | Self::LinkedIn => false,
        }
    }

    /// Get authorization URL for this provider
    pub fn authorize_url(&self) -> &str {
        match self {
            Self::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            Self::GitHub => "https://github.com/login/oauth/authorize",
            Self::LinkedIn => "https://www.linkedin.com/oauth/v2/authorization",
        }
    }

    /// Get token exchange URL for this provider
    pub fn token_url(&self) -> &str {
        match self {
            Self::Google => "https://oauth2.googleapis.com/token",
            Self::GitHub => "https://github.com/login/oauth/access_token",
            Self::LinkedIn => "https://www.linkedin.com/oauth/v2/accessToken",
        }
    }

    /// Get default scopes requested for this provider
    pub fn default_scopes(&self) -> &[&str] {
        match self {
            Self::Google => &["openid", "email", "profile"],
            Self::GitHub => &["read:user", "user:email"],
            Self::LinkedIn => &["openid", "profile", "email"],
        }
    }

    /// Get all supported providers
    pub fn all() -> Vec<Self> {
        vec![Self::Google, Self::GitHub, Self::LinkedIn]
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Google => write!(f, "google"),
            Self::GitHub => write!(f, "github"),
            Self::LinkedIn => write!(f, "linkedin"),
        }
    }
}

impl FromStr for OAuthProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> AuthResult<Self> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::GitHub),
            "linkedin" => Ok(Self::LinkedIn),
            _ => Err(AuthError::Configuration(format!(
                "Unknown provider: {}. Supported: google, github, linkedin",
                s
            ))),
        }
    }
}

impl TryFrom<String> for OAuthProvider {
    type Error = AuthError;

    fn try_from(s: String) -> AuthResult<Self> {
        s.parse()
    }
}

impl TryFrom<&str> for OAuthProvider {
    type Error = AuthError;

    fn try_from(s: &str) -> AuthResult<Self> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!(
            "google".parse::<OAuthProvider>().unwrap(),
            OAuthProvider::Google
        );
        assert_eq!(
            "GOOGLE".parse::<OAuthProvider>().unwrap(),
            OAuthProvider::Google
        );
        assert_eq!(
            "github".parse::<OAuthProvider>().unwrap(),
            OAuthProvider::GitHub
        );
        assert_eq!(
            "linkedin".parse::<OAuthProvider>().unwrap(),
            OAuthProvider::LinkedIn
        );
        assert!("facebook".parse::<OAuthProvider>().is_err());
    }

    #[test]
    fn test_provider_display_round_trips() {
        for provider in OAuthProvider::all() {
            assert_eq!(
                provider.to_string().parse::<OAuthProvider>().unwrap(),
                provider
            );
        }
    }

    #[test]
    fn test_pkce_capability_table() {
        assert!(OAuthProvider::Google.uses_pkce());
        assert!(!OAuthProvider::GitHub.uses_pkce());
        assert!(!OAuthProvider::LinkedIn.uses_pkce());
    }

    #[test]
    fn test_provider_urls() {
        let google = OAuthProvider::Google;
        assert!(google.authorize_url().contains("accounts.google.com"));
        assert!(google.token_url().contains("googleapis.com"));
        assert!(OAuthProvider::GitHub.authorize_url().contains("github.com"));
    }
}
