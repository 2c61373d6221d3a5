// ABOUTME: Applytrack authentication library providing OAuth CSRF protection
// ABOUTME: Issues single-use state tokens with PKCE support and expiry hygiene

pub mod error;
pub mod oauth;

// Re-export main types
pub use error::{AuthError, AuthResult};
pub use oauth::{
    generate_code_challenge, verify_code_challenge, ClientSource, CreateStateRequest,
    MemoryStateStore, OAuthProvider, OAuthState, OAuthStateConfig, OAuthStateManager,
    SqliteStateStore, StateStore,
};
