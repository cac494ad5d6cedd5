use std::sync::Arc;

use tracing::{debug, warn};

use crate::{management::KeyValueStore, utils::Clock};

pub const ACCESS_TOKEN_KEY: &str = "spotify_access_token";
pub const REFRESH_TOKEN_KEY: &str = "spotify_refresh_token";
pub const EXPIRES_AT_KEY: &str = "spotify_token_expires_at";

/// Persists the session tokens and answers "is the access token still good".
///
/// Storage failures never reach the caller: reads fail open to "absent" so the
/// user is sent back through login instead of seeing an error.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        TokenStore { store, clock }
    }

    /// Stores a token triple with expiry `now + expires_in_secs`.
    ///
    /// The three entries are written as one group. The expiry saturates
    /// rather than overflowing for absurd lifetimes.
    ///
    /// # Arguments
    ///
    /// * `access` - Access token
    /// * `refresh` - Refresh token; empty means the session cannot be renewed
    /// * `expires_in_secs` - Lifetime as reported by the token endpoint
    ///
    /// # Returns
    ///
    /// Whether the write reached the store.
    ///
    /// # Example
    ///
    /// ```
    /// if !tokens.save(&token.access_token, &refresh, token.expires_in).await {
    ///     warning!("Could not persist the session");
    /// }
    /// ```
    pub async fn save(&self, access: &str, refresh: &str, expires_in_secs: u64) -> bool {
        let lifetime_ms = i64::try_from(expires_in_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let expires_at = self.clock.now_ms().saturating_add(lifetime_ms);
        let entries = [
            (ACCESS_TOKEN_KEY, access.to_string()),
            (REFRESH_TOKEN_KEY, refresh.to_string()),
            (EXPIRES_AT_KEY, expires_at.to_string()),
        ];

        match self.store.set_many(&entries).await {
            Ok(()) => {
                debug!(expires_at, "Session tokens stored");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to store session tokens");
                false
            }
        }
    }

    /// The stored access token, unless it is missing or `now >= expires_at`.
    /// A malformed expiry counts as expired.
    pub async fn get_access_token_if_valid(&self) -> Option<String> {
        let expires_at = self.read(EXPIRES_AT_KEY).await?.parse::<i64>().ok()?;
        if self.clock.now_ms() >= expires_at {
            return None;
        }
        self.read(ACCESS_TOKEN_KEY).await
    }

    /// The stored refresh token; an empty one reads as absent.
    pub async fn get_refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
            .await
            .filter(|token| !token.is_empty())
    }

    pub async fn has_session(&self) -> bool {
        self.get_refresh_token().await.is_some()
    }

    /// Absolute expiry of the stored access token in epoch milliseconds.
    pub async fn expires_at(&self) -> Option<i64> {
        self.read(EXPIRES_AT_KEY).await?.parse().ok()
    }

    /// Removes all three session entries as one group. Failures are logged.
    pub async fn clear(&self) {
        if let Err(e) = self
            .store
            .remove_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, EXPIRES_AT_KEY])
            .await
        {
            warn!(error = %e, "Failed to clear session tokens");
        }
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Token storage read failed");
                None
            }
        }
    }
}
