//! Call lifecycle — credential fetch, offer/answer negotiation, media
//! attachment, and teardown.
//!
//! The pieces compose leaf-to-root: [`CredentialFetcher`] obtains a
//! short-lived realtime credential from the backend, [`SignalingNegotiator`]
//! drives the SDP offer/answer exchange against the realtime endpoint, and
//! [`CallSession`] orchestrates the whole thing and owns every live resource.
//! The real-time media stack itself sits behind the traits in [`transport`].

pub mod credentials;
pub mod error;
pub mod negotiate;
pub mod probe;
pub mod session;
pub mod transport;

pub use credentials::{Credential, CredentialFetcher, ProvideCredential};
pub use error::CallError;
pub use negotiate::{NegotiateSession, SignalingNegotiator};
pub use session::{CallOutcome, CallSession};
pub use transport::{
    CreateTransport, MediaDevices, MediaTrack, MediaTransport, RemoteSink, RemoteStream,
    RemoteTrackHandler, SdpKind, SessionDescription,
};

use std::fmt;

/// Call lifecycle state. Transitions are monotonic within one attempt:
/// Idle → Connecting → Active → Idle, or Idle → Connecting → Idle on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Connecting,
    Active,
    Ending,
}

impl CallState {
    /// Status indicator text for UI surfaces.
    pub fn as_str(self) -> &'static str {
        match self {
            CallState::Idle => "disconnected",
            CallState::Connecting => "connecting",
            CallState::Active => "connected",
            CallState::Ending => "ending",
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Test support — one-shot HTTP server
// ---------------------------------------------------------------------------
