//! Seams to the real-time media stack.
//!
//! The peer connection, microphone capture, and remote playback are external
//! collaborators; the session only needs the handful of capabilities below.
//! Integrations implement these traits over whatever WebRTC/media stack they
//! embed.

use async_trait::async_trait;

use super::error::CallError;

/// Role tag of a session description in the offer/answer handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// An opaque session description (SDP payload plus its role).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Handle to a local capture track. Dropping the handle does not release the
/// device; `stop` must be called or the microphone stays live.
pub trait MediaTrack: Send {
    fn id(&self) -> &str;
    fn stop(&mut self);
}

/// An incoming media stream from the far end. Identity is the stream id;
/// repeated track events for one stream carry the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
}

/// Callback invoked by the transport when a remote track arrives.
pub type RemoteTrackHandler = Box<dyn Fn(RemoteStream) + Send + Sync>;

/// The peer connection. Created fresh per call attempt, never reused.
#[async_trait]
pub trait MediaTransport: Send {
    /// Produce a local SDP offer describing the proposed media session.
    async fn create_offer(&mut self) -> Result<String, CallError>;

    /// Commit a description as the local end of the session.
    async fn set_local_description(&mut self, desc: SessionDescription) -> Result<(), CallError>;

    /// Apply the far end's description.
    async fn set_remote_description(&mut self, desc: SessionDescription) -> Result<(), CallError>;

    /// Attach a local capture track for sending.
    fn add_track(&mut self, track: Box<dyn MediaTrack>);

    /// Register the incoming-track callback. The transport may fire it any
    /// number of times, including repeatedly for the same stream.
    fn on_remote_track(&mut self, handler: RemoteTrackHandler);

    /// Stop every local track previously attached.
    fn stop_senders(&mut self);

    /// Close the connection. Must also stop any attached local tracks.
    fn close(&mut self);
}

/// Creates a fresh transport for each call attempt.
pub trait CreateTransport: Send + Sync {
    fn create(&self) -> Result<Box<dyn MediaTransport>, CallError>;
}

/// Device access: microphone acquisition (permission prompt included).
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open the default microphone. Permission denial and missing devices
    /// surface as [`CallError::MediaAcquisition`].
    async fn open_microphone(&self) -> Result<Vec<Box<dyn MediaTrack>>, CallError>;
}

/// Local representation of incoming audio — the playback side of the call.
#[derive(Default)]
pub struct RemoteSink {
    stream: Option<RemoteStream>,
}

impl RemoteSink {
    /// Attach an incoming stream. Re-attaching the stream already playing is
    /// a no-op so repeated track events do not reset playback. Returns
    /// whether the sink was reassigned.
    pub fn attach(&mut self, stream: RemoteStream) -> bool {
        if self.stream.as_ref().map(|s| s.id.as_str()) == Some(stream.id.as_str()) {
            return false;
        }
        self.stream = Some(stream);
        true
    }

    pub fn clear(&mut self) {
        self.stream = None;
    }

    pub fn stream(&self) -> Option<&RemoteStream> {
        self.stream.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_sink_attach_is_idempotent_per_stream() {
        let mut sink = RemoteSink::default();
        assert!(sink.attach(RemoteStream { id: "s1".into() }));
        assert!(!sink.attach(RemoteStream { id: "s1".into() }));
        assert_eq!(sink.stream().unwrap().id, "s1");
    }

    #[test]
    fn test_remote_sink_reassigns_on_new_stream() {
        let mut sink = RemoteSink::default();
        assert!(sink.attach(RemoteStream { id: "s1".into() }));
        assert!(sink.attach(RemoteStream { id: "s2".into() }));
        assert_eq!(sink.stream().unwrap().id, "s2");
    }

    #[test]
    fn test_remote_sink_clear() {
        let mut sink = RemoteSink::default();
        sink.attach(RemoteStream { id: "s1".into() });
        sink.clear();
        assert!(sink.stream().is_none());
    }
}
