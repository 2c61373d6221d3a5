// ABOUTME: OAuth state manager providing CSRF protection for authorization-code flows
// ABOUTME: Issues single-use state records, validates callbacks, and sweeps expired flows

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{
    error::{AuthError, AuthResult},
    oauth::{
        pkce,
        provider::OAuthProvider,
        store::StateStore,
        types::{CreateStateRequest, OAuthState, OAuthStateConfig},
    },
};

/// CSRF protection for OAuth authorization-code flows.
///
/// Mints one-time, time-boxed state records bound to a provider, validates
/// and consumes them on callback, and sweeps abandoned flows on a background
/// interval. The store is injected so callers and tests choose persistence.
pub struct OAuthStateManager {
    store: Arc<dyn StateStore>,
    config: OAuthStateConfig,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl OAuthStateManager {
    /// Create a new manager over an injected state store.
    ///
    /// Construction is synchronous and does not start the background sweeper;
    /// call `start_cleanup_task` from the owning server's startup sequence.
    pub fn new(store: Arc<dyn StateStore>, config: OAuthStateConfig) -> Self {
        Self {
            store,
            config,
            cleanup_task: Mutex::new(None),
        }
    }

    /// Mint a new state record for an OAuth flow.
    ///
    /// Generates the CSRF state token, a PKCE verifier when the provider uses
    /// PKCE, resolves the callback URL, and persists the record under its
    /// 10-minute TTL.
    pub async fn create_state(&self, request: CreateStateRequest) -> AuthResult<OAuthState> {
        let state = pkce::generate_state_token();

        let code_verifier = if request.provider.uses_pkce() {
            Some(pkce::generate_code_verifier()?)
        } else {
            None
        };

        let redirect_uri = request
            .redirect_uri
            .unwrap_or_else(|| self.config.default_redirect_uri(request.source));

        let mut metadata = HashMap::new();
        if let Some(device_id) = request.device_id {
            metadata.insert("device_id".to_string(), device_id);
        }
        if let Some(device_name) = request.device_name {
            metadata.insert("device_name".to_string(), device_name);
        }

        let now = Utc::now();
        let record = OAuthState {
            id: nanoid::nanoid!(),
            state,
            code_verifier,
            provider: request.provider,
            redirect_uri,
            source: request.source,
            metadata,
            created_at: now,
            expires_at: now + self.config.state_ttl,
        };

        self.store.insert(&record).await?;

        debug!(
            "Created OAuth state for provider {} from {}",
            record.provider, record.source
        );
        Ok(record)
    }

    /// Validate a callback state token and consume it.
    ///
    /// Checks run in a fixed order so the error reveals nothing beyond the
    /// two permitted categories: lookup, provider match, expiry, consume.
    /// The returned record carries the code verifier, redirect URI, and
    /// metadata the caller needs to finish the flow; a second call with the
    /// same token always fails.
    pub async fn validate_and_consume_state(
        &self,
        state: &str,
        provider: OAuthProvider,
    ) -> AuthResult<OAuthState> {
        let record = match self.store.get(state).await? {
            Some(record) => record,
            None => {
                warn!("Rejected unknown OAuth state token");
                return Err(AuthError::InvalidState);
            }
        };

        if record.provider != provider {
            // Reported identically to an unknown token; the record stays
            // live for the real provider until its TTL.
            warn!(
                "Rejected OAuth state: expected provider {}, stored {}",
                provider, record.provider
            );
            return Err(AuthError::InvalidState);
        }

        if record.is_expired() {
            // Delete before surfacing the error so a retry cannot observe
            // the record again.
            self.store.remove(state).await?;
            warn!("Rejected expired OAuth state for provider {}", provider);
            return Err(AuthError::StateExpired);
        }

        // Single-use enforcement: the atomic remove decides the winner when
        // two validations race; the loser sees None.
        match self.store.remove(state).await? {
            Some(record) => {
                debug!("Consumed OAuth state for provider {}", provider);
                Ok(record)
            }
            None => Err(AuthError::InvalidState),
        }
    }

    /// Best-effort delete of a state record. Absence is not an error.
    pub async fn delete_state(&self, state: &str) -> AuthResult<()> {
        self.store.remove(state).await?;
        Ok(())
    }

    /// Remove every record whose expiry has passed, returning the count.
    pub async fn cleanup_expired_states(&self) -> AuthResult<u64> {
        let removed = self.store.remove_expired_before(Utc::now()).await?;
        if removed > 0 {
            debug!("Removed {} expired OAuth states", removed);
        }
        Ok(removed)
    }

    /// Start the background sweeper for expired records.
    ///
    /// No-op when the sweeper is already running. Sweep failures are logged
    /// and the task keeps its schedule.
    pub fn start_cleanup_task(&self) {
        let mut task = self
            .cleanup_task
            .lock()
            .expect("cleanup task lock poisoned");

        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let store = Arc::clone(&self.store);
        let period = self.config.cleanup_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                "Started OAuth state cleanup task (interval: {}s)",
                period.as_secs()
            );

            loop {
                interval.tick().await;

                match store.remove_expired_before(Utc::now()).await {
                    Ok(0) => {}
                    Ok(removed) => info!("Swept {} expired OAuth states", removed),
                    Err(e) => error!("OAuth state cleanup sweep failed: {}", e),
                }
            }
        });

        *task = Some(handle);
    }

    /// Stop the background sweeper.
    ///
    /// Safe to call more than once and safe when the sweeper never started.
    pub fn shutdown(&self) {
        let mut task = self
            .cleanup_task
            .lock()
            .expect("cleanup task lock poisoned");

        if let Some(handle) = task.take() {
            handle.abort();
            info!("Stopped OAuth state cleanup task");
        }
    }
}

impl Drop for OAuthStateManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
