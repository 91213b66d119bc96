//! Ephemeral session credential fetch.

use async_trait::async_trait;
use serde::Deserialize;

use super::error::CallError;

/// Short-lived credential minted by the backend for one realtime session.
///
/// Held only for the duration of negotiation and cleared on call end or
/// failure; never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct Credential {
    /// Bearer token authorizing a single negotiation with the realtime
    /// endpoint.
    pub client_secret: String,
    /// Target realtime model identifier.
    pub model: String,
    /// Expiry as reported by the backend. Carried opaquely for display.
    #[serde(default)]
    pub expires_at: Option<serde_json::Value>,
}

/// Credential source seam, so the session can be tested without a backend.
#[async_trait]
pub trait ProvideCredential: Send + Sync {
    async fn fetch(&self) -> Result<Credential, CallError>;
}

/// HTTP fetcher: `POST {backend}/session`, no body, single attempt.
pub struct CredentialFetcher {
    http: reqwest::Client,
    base_url: String,
}

impl CredentialFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ProvideCredential for CredentialFetcher {
    async fn fetch(&self) -> Result<Credential, CallError> {
        let url = format!("{}/session", self.base_url);
        tracing::debug!("POST {}", url);

        let resp = self.http.post(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            // Carry the reason phrase, the way the browser surfaced
            // response.statusText.
            let text = status
                .canonical_reason()
                .unwrap_or_else(|| status.as_str())
                .to_string();
            return Err(CallError::Backend(text));
        }

        let credential: Credential = resp.json().await?;
        tracing::debug!("Got session credential for model {}", credential.model);
        Ok(credential)
    }
}
