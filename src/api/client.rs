//! HTTP client for the Cutter backend
//!
//! Wraps reqwest::Client with base-address resolution from config and
//! uniform status handling: 401 is its own error kind because every v2
//! endpoint signals a bad session or identity that way.

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::Config;

/// Errors from the v2 backend surface.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 401: the backend did not accept the caller's session/identity.
    #[error("unauthorised")]
    Unauthorised,

    /// Any other non-success status.
    #[error("HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// Transport-level failure (including response decode).
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// JSON client for the Cutter backend.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client against the configured backend.
    pub fn new() -> anyhow::Result<Self> {
        let config = Config::load()?;
        Ok(Self::with_base_url(config.backend_url()))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("POST {}", url);

        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Network {
                url: url.clone(),
                source,
            })?;

        let resp = check_response(resp, &url).await?;
        resp.json()
            .await
            .map_err(|source| ApiError::Network { url, source })
    }

    /// GET and decode the JSON response.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ApiError::Network {
                url: url.clone(),
                source,
            })?;

        let resp = check_response(resp, &url).await?;
        resp.json()
            .await
            .map_err(|source| ApiError::Network { url, source })
    }
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorised);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }
    Ok(resp)
}
