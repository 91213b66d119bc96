//! SDP offer/answer exchange with the realtime endpoint.
//!
//! The exchange protocol is transport-native: the request body is the raw
//! offer SDP (`Content-Type: application/sdp`, no JSON envelope) and a 2xx
//! response body is, in its entirety, the answer SDP. On failure the endpoint
//! returns human-readable diagnostic text instead.

use async_trait::async_trait;

use super::credentials::Credential;
use super::error::CallError;
use super::transport::{MediaTransport, SessionDescription};

/// Negotiation seam, so the session can be tested without network access.
#[async_trait]
pub trait NegotiateSession: Send + Sync {
    async fn negotiate(
        &self,
        transport: &mut dyn MediaTransport,
        credential: &Credential,
    ) -> Result<(), CallError>;
}

/// Drives the offer/answer handshake over HTTP.
pub struct SignalingNegotiator {
    http: reqwest::Client,
    endpoint: String,
}

impl SignalingNegotiator {
    /// `endpoint` is the full realtime URL, e.g.
    /// `https://api.openai.com/v1/realtime`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl NegotiateSession for SignalingNegotiator {
    async fn negotiate(
        &self,
        transport: &mut dyn MediaTransport,
        credential: &Credential,
    ) -> Result<(), CallError> {
        // The offer must be fully committed locally before it goes on the
        // wire; the endpoint expects a finalized description.
        let offer = transport.create_offer().await?;
        transport
            .set_local_description(SessionDescription::offer(offer.clone()))
            .await?;

        tracing::debug!("POST {} (model={})", self.endpoint, credential.model);
        let resp = self
            .http
            .post(&self.endpoint)
            .query(&[("model", credential.model.as_str())])
            .bearer_auth(&credential.client_secret)
            .header(reqwest::header::CONTENT_TYPE, "application/sdp")
            .body(offer)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(CallError::Negotiation(body));
        }

        // The whole body is the answer SDP.
        transport
            .set_remote_description(SessionDescription::answer(body))
            .await?;
        tracing::debug!("Negotiation complete, remote description applied");
        Ok(())
    }
}
