use std::sync::Arc;

use reqwest::{Method, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{Error, Result},
    spotify::auth::AuthFlow,
};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Bearer-authenticated access to the Spotify Web API.
///
/// A `401` triggers exactly one refresh-and-retry; a second `401` is returned
/// to the caller as [`Error::Api`].
#[derive(Clone)]
pub struct ApiClient {
    auth: Arc<AuthFlow>,
    base_url: String,
}

impl ApiClient {
    pub fn new(auth: Arc<AuthFlow>) -> Self {
        let base_url = auth.config().api_url.trim_end_matches('/').to_string();
        Self { auth, base_url }
    }

    pub fn auth(&self) -> &Arc<AuthFlow> {
        &self.auth
    }

    /// Sends an authenticated request to `{api_url}{path}`.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP method
    /// * `path` - Path below the API base, starting with `/`
    /// * `query` - Query parameters, appended in order
    /// * `body` - Optional JSON body
    ///
    /// # Errors
    ///
    /// - [`Error::NotAuthenticated`] when no token can be obtained, before or
    ///   after the retry
    /// - [`Error::Api`] for any non-success status, carrying the provider's
    ///   `message` and `reason`
    /// - [`Error::Http`] for transport failures
    ///
    /// # Example
    ///
    /// ```
    /// let response = client
    ///     .send(Method::PUT, "/me/player/pause", &[], None)
    ///     .await?;
    /// ```
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response> {
        let token = self
            .auth
            .get_valid_access_token()
            .await
            .ok_or(Error::NotAuthenticated)?;

        let response = self.request(&method, path, query, body, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        debug!(path, "Access token rejected, refreshing once");
        let token = self.auth.refresh().await.ok_or(Error::NotAuthenticated)?;
        let response = self.request(&method, path, query, body, &token).await?;
        check_status(response).await
    }

    /// `GET` a JSON document into `T`.
    ///
    /// # Errors
    ///
    /// Everything [`ApiClient::send`] returns, plus [`Error::Http`] when the
    /// body does not decode.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send(Method::GET, path, query, None).await?;
        Ok(response.json::<T>().await?)
    }

    /// Like [`ApiClient::get_json`], but `204 No Content` (or an empty body)
    /// yields `None`.
    pub async fn get_optional_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let response = self.send(Method::GET, path, query, None).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    async fn request(
        &self,
        method: &Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        token: &str,
    ) -> Result<Response> {
        let mut request = self
            .auth
            .http()
            .request(method.clone(), format!("{}{}", self.base_url, path))
            .bearer_auth(token);

        if !query.is_empty() {
            request = request.query(query);
        }
        request = match body {
            Some(body) => request.json(body),
            // Spotify rejects body-less PUT/POST without a length
            None if *method != Method::GET => request.header(reqwest::header::CONTENT_LENGTH, 0),
            None => request,
        };

        Ok(request.send().await?)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let (message, reason) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.error.message, body.error.reason),
        Err(_) => (text, None),
    };

    Err(Error::Api {
        status: status.as_u16(),
        reason,
        message,
    })
}
