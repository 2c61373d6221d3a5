// ABOUTME: Core type definitions for OAuth CSRF state management
// ABOUTME: Includes the write-once state record, client source, and manager configuration

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;

use crate::error::{AuthError, AuthResult};
use crate::oauth::provider::OAuthProvider;

/// Fixed lifetime of a state record from creation to expiry.
pub const STATE_TTL_SECS: i64 = 600;

/// How often the background sweeper removes expired records.
pub const CLEANUP_INTERVAL_SECS: u64 = 300;

const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEFAULT_DESKTOP_CALLBACK_URL: &str = "applytrack://auth/callback";

/// Client platform that initiated the OAuth flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientSource {
    Web,
    Desktop,
    Mobile,
}

impl fmt::Display for ClientSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Web => write!(f, "web"),
            Self::Desktop => write!(f, "desktop"),
            Self::Mobile => write!(f, "mobile"),
        }
    }
}

impl FromStr for ClientSource {
    type Err = AuthError;

    fn from_str(s: &str) -> AuthResult<Self> {
        match s.to_lowercase().as_str() {
            "web" => Ok(Self::Web),
            "desktop" => Ok(Self::Desktop),
            "mobile" => Ok(Self::Mobile),
            _ => Err(AuthError::Configuration(format!(
                "Unknown client source: {}. Supported: web, desktop, mobile",
                s
            ))),
        }
    }
}

/// One in-flight OAuth attempt, keyed by its state token.
///
/// Records are write-once: created by `create_state`, never mutated, and
/// destroyed either by a successful validation or by expiry cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthState {
    pub id: String,
    /// High-entropy CSRF token round-tripped through the provider.
    pub state: String,
    /// PKCE code verifier, present only for providers that use PKCE.
    pub code_verifier: Option<String>,
    pub provider: OAuthProvider,
    pub redirect_uri: String,
    pub source: ClientSource,
    /// Free-form key/value bag (device id, device name) handed back to the
    /// caller after validation.
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OAuthState {
    /// Check whether the record's TTL has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Input to `OAuthStateManager::create_state`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStateRequest {
    pub provider: OAuthProvider,
    pub source: ClientSource,
    /// Caller-supplied callback URL; defaulted per source when absent.
    pub redirect_uri: Option<String>,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
}

impl CreateStateRequest {
    pub fn new(provider: OAuthProvider, source: ClientSource) -> Self {
        Self {
            provider,
            source,
            redirect_uri: None,
            device_id: None,
            device_name: None,
        }
    }
}

/// Configuration for the state manager
#[derive(Debug, Clone)]
pub struct OAuthStateConfig {
    /// Base URL of the web frontend, used for web and mobile callbacks.
    pub frontend_url: String,
    /// Custom URI scheme callback for the desktop shell.
    pub desktop_callback_url: String,
    pub state_ttl: Duration,
    pub cleanup_interval: std::time::Duration,
}

impl Default for OAuthStateConfig {
    fn default() -> Self {
        Self {
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            desktop_callback_url: DEFAULT_DESKTOP_CALLBACK_URL.to_string(),
            state_ttl: Duration::seconds(STATE_TTL_SECS),
            cleanup_interval: std::time::Duration::from_secs(CLEANUP_INTERVAL_SECS),
        }
    }
}

impl OAuthStateConfig {
    /// Build configuration from environment variables, falling back to
    /// development defaults.
    pub fn from_env() -> Self {
        Self {
            frontend_url: env::var("APPLYTRACK_FRONTEND_URL")
                .unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string()),
            desktop_callback_url: env::var("APPLYTRACK_DESKTOP_CALLBACK_URL")
                .unwrap_or_else(|_| DEFAULT_DESKTOP_CALLBACK_URL.to_string()),
            ..Self::default()
        }
    }

    /// Resolve the callback URL for a client platform.
    ///
    /// Mobile currently shares the web callback pending a dedicated deep link.
    pub fn default_redirect_uri(&self, source: ClientSource) -> String {
        match source {
            ClientSource::Web | ClientSource::Mobile => {
                format!("{}/auth/callback", self.frontend_url.trim_end_matches('/'))
            }
            ClientSource::Desktop => self.desktop_callback_url.clone(),
        }
    }
}
