// ABOUTME: OAuth module providing CSRF state lifecycle and PKCE helpers
// ABOUTME: Includes the provider table, state manager, and pluggable state stores

pub mod manager;
pub mod pkce;
pub mod provider;
pub mod store;
pub mod types;

pub use manager::OAuthStateManager;
pub use pkce::{generate_code_challenge, verify_code_challenge};
pub use provider::OAuthProvider;
pub use store::{MemoryStateStore, SqliteStateStore, StateStore};
pub use types::{ClientSource, CreateStateRequest, OAuthState, OAuthStateConfig};
