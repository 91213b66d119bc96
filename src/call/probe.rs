//! Negotiation probe: drive one offer/answer exchange with a canned SDP
//! offer and no media stack. Debug aid for checking credentials and realtime
//! endpoint reachability from the terminal.

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::credentials::{CredentialFetcher, ProvideCredential};
use super::error::CallError;
use super::negotiate::{NegotiateSession, SignalingNegotiator};
use super::transport::{MediaTrack, MediaTransport, RemoteTrackHandler, SessionDescription};
use crate::config::Config;

/// Transport that offers a fixed SDP blob and records what comes back.
pub struct CannedOfferTransport {
    offer: String,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
}

impl CannedOfferTransport {
    pub fn new(offer: impl Into<String>) -> Self {
        Self {
            offer: offer.into(),
            local: None,
            remote: None,
        }
    }

    /// The answer applied during negotiation, if any.
    pub fn answer(&self) -> Option<&SessionDescription> {
        self.remote.as_ref()
    }
}

#[async_trait]
impl MediaTransport for CannedOfferTransport {
    async fn create_offer(&mut self) -> Result<String, CallError> {
        Ok(self.offer.clone())
    }

    async fn set_local_description(&mut self, desc: SessionDescription) -> Result<(), CallError> {
        self.local = Some(desc);
        Ok(())
    }

    async fn set_remote_description(&mut self, desc: SessionDescription) -> Result<(), CallError> {
        self.remote = Some(desc);
        Ok(())
    }

    fn add_track(&mut self, _track: Box<dyn MediaTrack>) {}

    fn on_remote_track(&mut self, _handler: RemoteTrackHandler) {}

    fn stop_senders(&mut self) {}

    fn close(&mut self) {}
}

/// Fetch a credential and run a single negotiation with the given offer SDP.
/// Prints the answer SDP on success.
pub async fn run_probe(offer_sdp: String) -> Result<()> {
    let config = Config::load()?;

    tracing::info!("Fetching session credential...");
    let credential = CredentialFetcher::new(config.backend_url())
        .fetch()
        .await
        .context("Credential fetch failed")?;
    tracing::info!("Negotiating with model {}...", credential.model);

    let mut transport = CannedOfferTransport::new(offer_sdp);
    SignalingNegotiator::new(config.realtime_url())
        .negotiate(&mut transport, &credential)
        .await
        .context("Negotiation failed")?;

    let answer = transport
        .answer()
        .context("Negotiation completed without an answer")?;
    println!();
    println!("{}", answer.sdp);
    Ok(())
}
