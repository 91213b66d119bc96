//! Call lifecycle error taxonomy.

use thiserror::Error;

use super::CallState;

/// Everything that can go wrong while setting up or running a call.
///
/// The session never retries: any of these raised during connection setup
/// triggers a full teardown back to idle, and the message is surfaced to the
/// caller for display.
#[derive(Debug, Error)]
pub enum CallError {
    /// The backend refused to mint a session credential. Carries the HTTP
    /// status text (reason phrase) of the response.
    #[error("session backend error: {0}")]
    Backend(String),

    /// Transport-level failure reaching the backend or the realtime endpoint
    /// (unreachable host, DNS, TLS, ...).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The realtime endpoint rejected the SDP offer. Carries the response
    /// body verbatim; the endpoint returns human-readable diagnostic text,
    /// not structured JSON.
    #[error("realtime negotiation failed: {0}")]
    Negotiation(String),

    /// Microphone permission denied or no capture device available.
    #[error("could not acquire microphone: {0}")]
    MediaAcquisition(String),

    /// The media transport failed to produce or apply a session description.
    #[error("transport error: {0}")]
    Transport(String),

    /// `start()` called while a call is already in progress.
    #[error("cannot start a call while {0}")]
    InvalidState(CallState),
}
