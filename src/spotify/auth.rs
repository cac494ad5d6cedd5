use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::Config,
    error::{Error, Result},
    management::{KeyValueStore, TokenStore},
    types::TokenResponse,
    utils::{self, Clock},
};

/// Storage key of the transient PKCE code verifier.
pub const CODE_VERIFIER_KEY: &str = "spotify_pkce_code_verifier";

/// Sends the user agent to the provider's authorization page.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &Url);
}

/// Opens the authorization URL in the default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn navigate(&self, url: &Url) {
        if webbrowser::open(url.as_str()).is_err() {
            crate::warning!(
                "Failed to open browser. Please navigate to the following URL manually:\n{}",
                url
            );
        }
    }
}

/// `code` / `error` query parameters of the OAuth redirect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Extracts the callback parameters from a full return URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::Config(format!("invalid callback URL: {e}")))?;
        let mut params = CallbackParams::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        Ok(params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    AwaitingCallback,
    Authenticated,
}

/// OAuth 2.0 authorization-code flow with PKCE against the Spotify accounts
/// service, plus token lifecycle.
///
/// `get_valid_access_token` is the only way other components should obtain a
/// token: it never hands out a token past its recorded expiry.
pub struct AuthFlow {
    config: Config,
    http: Client,
    store: Arc<dyn KeyValueStore>,
    tokens: TokenStore,
    navigator: Arc<dyn Navigator>,
    refresh_lock: Mutex<()>,
}

impl AuthFlow {
    /// Creates the flow over a key/value store.
    ///
    /// Session tokens and the transient PKCE verifier share `store`; the
    /// [`TokenStore`] is built on top of it with `clock` deciding expiry.
    ///
    /// # Arguments
    ///
    /// * `config` - Client id, redirect URI, endpoints and requested scopes
    /// * `store` - Persistence for tokens and the pending verifier
    /// * `clock` - Time source for token expiry
    /// * `navigator` - Where `begin_login` sends the user agent
    ///
    /// # Example
    ///
    /// ```
    /// let auth = AuthFlow::new(
    ///     Config::from_env()?,
    ///     Arc::new(FileStore::default()),
    ///     Arc::new(SystemClock),
    ///     Arc::new(BrowserNavigator),
    /// );
    /// ```
    pub fn new(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            http: Client::new(),
            tokens: TokenStore::new(Arc::clone(&store), clock),
            store,
            navigator,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The persisted session tokens.
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Builds the authorize URL for the given S256 challenge.
    pub fn authorization_url(&self, code_challenge: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| Error::Config(format!("invalid authorization URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scope())
            .append_pair("code_challenge_method", "S256")
            .append_pair("code_challenge", code_challenge);
        Ok(url)
    }

    /// Starts a login: stores a fresh verifier and navigates to the provider.
    ///
    /// A new verifier is generated on every call and replaces any pending one,
    /// so only the most recent login can complete. The returned URL is the one
    /// handed to the [`Navigator`].
    ///
    /// # Example
    ///
    /// ```
    /// let url = auth.begin_login().await?;
    /// info!("If no browser opened, visit {}", url);
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if the verifier cannot be stored, since the callback could never
    /// complete without it.
    pub async fn begin_login(&self) -> Result<Url> {
        let code_verifier = utils::generate_code_verifier();
        let code_challenge = utils::generate_code_challenge(&code_verifier);
        let url = self.authorization_url(&code_challenge)?;

        self.store.set(CODE_VERIFIER_KEY, code_verifier).await?;

        info!("Redirecting to Spotify authorization");
        self.navigator.navigate(&url);
        Ok(url)
    }

    /// Completes the login from the redirect parameters.
    ///
    /// The stored verifier is consumed whatever the outcome, so a replayed or
    /// reloaded callback cannot run the exchange twice.
    ///
    /// # Arguments
    ///
    /// * `params` - The `code`/`error` pair from the redirect query
    ///
    /// # Returns
    ///
    /// `true` once the code has been exchanged and the tokens stored. A denied
    /// authorization, a missing code or verifier, a failed exchange and a
    /// failed store write all yield `false`.
    ///
    /// # Example
    ///
    /// ```
    /// let params = CallbackParams::from_url(&return_url)?;
    /// if !auth.handle_callback(&params).await {
    ///     warning!("Login failed, run `dashtune auth` again");
    /// }
    /// ```
    pub async fn handle_callback(&self, params: &CallbackParams) -> bool {
        let verifier = self.take_verifier().await;

        if let Some(error) = &params.error {
            warn!(error = %error, "Authorization was denied");
            return false;
        }
        let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
            warn!("Callback carries no authorization code");
            return false;
        };
        let Some(verifier) = verifier else {
            warn!("No pending PKCE verifier; login expired or callback replayed");
            return false;
        };

        match self.exchange_code_pkce(code, &verifier).await {
            Ok(token) => {
                let refresh = token.refresh_token.unwrap_or_default();
                let stored = self
                    .tokens
                    .save(&token.access_token, &refresh, token.expires_in)
                    .await;
                if stored {
                    info!("Authorization code exchanged for session tokens");
                }
                stored
            }
            Err(e) => {
                warn!(error = %e, "Token exchange failed");
                false
            }
        }
    }

    /// Trades the stored refresh token for a new access token.
    ///
    /// Failure is terminal for the session: tokens are cleared and `None` is
    /// returned.
    pub async fn refresh(&self) -> Option<String> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Returns an access token that is not past its recorded expiry.
    ///
    /// A stored token that is still valid is returned without any network
    /// traffic. Otherwise the refresh token is exchanged; concurrent callers
    /// wait on the same refresh and share its result.
    ///
    /// # Returns
    ///
    /// `None` when there is no session or the refresh failed. In the latter
    /// case the session has been cleared and the user must log in again.
    ///
    /// # Example
    ///
    /// ```
    /// let Some(token) = auth.get_valid_access_token().await else {
    ///     return Err(Error::NotAuthenticated);
    /// };
    /// ```
    pub async fn get_valid_access_token(&self) -> Option<String> {
        if let Some(token) = self.tokens.get_access_token_if_valid().await {
            return Some(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // another caller may have refreshed while we waited
        if let Some(token) = self.tokens.get_access_token_if_valid().await {
            return Some(token);
        }
        self.refresh_locked().await
    }

    /// Forgets the session. Safe to call without one.
    pub async fn logout(&self) {
        self.tokens.clear().await;
        info!("Session cleared");
    }

    /// Derived from storage: a refresh token means authenticated, a pending
    /// verifier means a login is waiting for its callback.
    pub async fn state(&self) -> AuthState {
        if self.tokens.has_session().await {
            return AuthState::Authenticated;
        }
        match self.store.get(CODE_VERIFIER_KEY).await {
            Ok(Some(_)) => AuthState::AwaitingCallback,
            _ => AuthState::Unauthenticated,
        }
    }

    async fn refresh_locked(&self) -> Option<String> {
        let Some(refresh_token) = self.tokens.get_refresh_token().await else {
            debug!("No refresh token stored");
            self.logout().await;
            return None;
        };

        match self.request_refresh(&refresh_token).await {
            Ok(token) => {
                // Spotify may or may not rotate the refresh token
                let refresh = token
                    .refresh_token
                    .filter(|t| !t.is_empty())
                    .unwrap_or(refresh_token);
                self.tokens
                    .save(&token.access_token, &refresh, token.expires_in)
                    .await;
                debug!(expires_in = token.expires_in, "Access token refreshed");
                Some(token.access_token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, logging out");
                self.logout().await;
                None
            }
        }
    }

    async fn take_verifier(&self) -> Option<String> {
        let verifier = match self.store.get(CODE_VERIFIER_KEY).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to read PKCE verifier");
                None
            }
        };
        if let Err(e) = self.store.remove(CODE_VERIFIER_KEY).await {
            warn!(error = %e, "Failed to delete PKCE verifier");
        }
        verifier
    }

    async fn exchange_code_pkce(&self, code: &str, verifier: &str) -> Result<TokenResponse> {
        let res = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.config.client_id.as_str()),
                ("code", code),
                ("code_verifier", verifier),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        Ok(res.json::<TokenResponse>().await?)
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let res = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        Ok(res.json::<TokenResponse>().await?)
    }
}
