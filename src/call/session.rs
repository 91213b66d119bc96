//! Call session orchestration — the lifecycle state machine.
//!
//! One session per client. `start()` runs the connection sequence in strict
//! order (credential, transport, track handler, microphone, attach,
//! negotiate); `end()` is the single teardown path and is safe from any
//! state, including while a `start()` is still suspended at one of its I/O
//! boundaries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::credentials::{Credential, ProvideCredential};
use super::error::CallError;
use super::negotiate::NegotiateSession;
use super::transport::{
    CreateTransport, MediaDevices, MediaTransport, RemoteSink, RemoteStream, RemoteTrackHandler,
};
use super::CallState;

/// How a `start()` attempt concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// Negotiation completed; the call is live.
    Connected,
    /// `end()` was called while connection setup was still in flight. Not an
    /// error; the user hung up.
    Abandoned,
}

struct Inner {
    state: CallState,
    /// Identity of the current call attempt. Bumped by both `start()` and
    /// `end()`; a suspended task whose attempt no longer matches must release
    /// whatever it holds and bow out.
    attempt: u64,
    transport: Option<Box<dyn MediaTransport>>,
    credential: Option<Credential>,
}

/// Owns every live resource of the single active call.
pub struct CallSession {
    inner: Mutex<Inner>,
    sink: Arc<Mutex<RemoteSink>>,
    /// Mirror of `Inner::attempt` readable from the synchronous track
    /// callback without touching the session lock.
    live_attempt: Arc<AtomicU64>,
    credentials: Arc<dyn ProvideCredential>,
    transports: Arc<dyn CreateTransport>,
    devices: Arc<dyn MediaDevices>,
    negotiator: Arc<dyn NegotiateSession>,
}

impl CallSession {
    pub fn new(
        credentials: Arc<dyn ProvideCredential>,
        transports: Arc<dyn CreateTransport>,
        devices: Arc<dyn MediaDevices>,
        negotiator: Arc<dyn NegotiateSession>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CallState::Idle,
                attempt: 0,
                transport: None,
                credential: None,
            }),
            sink: Arc::new(Mutex::new(RemoteSink::default())),
            live_attempt: Arc::new(AtomicU64::new(0)),
            credentials,
            transports,
            devices,
            negotiator,
        }
    }

    pub fn state(&self) -> CallState {
        self.lock_inner().state
    }

    /// Stream currently attached to the remote sink, if any.
    pub fn remote_stream(&self) -> Option<RemoteStream> {
        self.lock_sink().stream().cloned()
    }

    /// Start a call. Rejected if a call is already connecting or active.
    ///
    /// On any setup failure the session tears down completely before the
    /// error is returned; it never stays half-open.
    pub async fn start(&self) -> Result<CallOutcome, CallError> {
        let attempt = {
            let mut inner = self.lock_inner();
            if inner.state != CallState::Idle {
                return Err(CallError::InvalidState(inner.state));
            }
            inner.state = CallState::Connecting;
            inner.attempt += 1;
            self.live_attempt.store(inner.attempt, Ordering::SeqCst);
            inner.attempt
        };
        tracing::info!("Starting call");

        match self.connect(attempt).await {
            Ok(true) => {
                tracing::info!("Call connected");
                Ok(CallOutcome::Connected)
            }
            Ok(false) => {
                tracing::info!("Call attempt abandoned (hung up during setup)");
                Ok(CallOutcome::Abandoned)
            }
            Err(err) => {
                tracing::warn!("Call setup failed: {}", err);
                self.teardown(attempt);
                Err(err)
            }
        }
    }

    /// Hang up and release everything: stop local tracks, close the
    /// transport, clear the remote sink and the credential. Safe to call
    /// repeatedly and from any state; every resource is presence-checked.
    pub fn end(&self) {
        let mut inner = self.lock_inner();
        if inner.state == CallState::Idle
            && inner.transport.is_none()
            && inner.credential.is_none()
        {
            tracing::debug!("end() with no active call");
            return;
        }
        tracing::info!("Ending call");
        self.release(&mut inner);
    }

    /// The connection sequence. Returns Ok(true) when the call went active,
    /// Ok(false) when a concurrent `end()` invalidated the attempt. After
    /// every suspension point the attempt id is re-checked; on staleness the
    /// step's local resources are released here since `end()` could not see
    /// them.
    async fn connect(&self, attempt: u64) -> Result<bool, CallError> {
        // (a) credential
        let credential = self.credentials.fetch().await?;
        {
            let mut inner = self.lock_inner();
            if inner.attempt != attempt {
                return Ok(false); // hung up during fetch; credential discarded
            }
            inner.credential = Some(credential.clone());
        }

        // (b) fresh transport, (c) incoming-track handler
        let mut transport = self.transports.create()?;
        transport.on_remote_track(self.remote_track_handler(attempt));
        {
            let mut inner = self.lock_inner();
            if inner.attempt != attempt {
                transport.close();
                return Ok(false);
            }
            inner.transport = Some(transport);
        }

        // (d) microphone
        let tracks = self.devices.open_microphone().await?;
        {
            let mut inner = self.lock_inner();
            if inner.attempt != attempt {
                // Hung up during the permission prompt; the tracks were never
                // attached, so stop them here.
                for mut track in tracks {
                    track.stop();
                }
                return Ok(false);
            }
            // (e) attach local tracks
            match inner.transport.as_mut() {
                Some(transport) => {
                    for track in tracks {
                        transport.add_track(track);
                    }
                }
                None => return Ok(false),
            }
        }

        // (f) negotiate. The transport leaves the session for the duration so
        // the lock is never held across the exchange; if `end()` runs
        // meanwhile it cannot see the transport, and the staleness check
        // below finishes its job.
        let mut transport = {
            let mut inner = self.lock_inner();
            if inner.attempt != attempt {
                return Ok(false);
            }
            match inner.transport.take() {
                Some(t) => t,
                None => return Ok(false),
            }
        };
        let result = self
            .negotiator
            .negotiate(transport.as_mut(), &credential)
            .await;

        let mut inner = self.lock_inner();
        if inner.attempt != attempt {
            transport.stop_senders();
            transport.close();
            return Ok(false);
        }
        inner.transport = Some(transport);
        match result {
            Ok(()) => {
                inner.state = CallState::Active;
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }

    /// Teardown after a failed attempt, unless a concurrent `end()` (or a
    /// newer attempt) already owns cleanup.
    fn teardown(&self, attempt: u64) {
        let mut inner = self.lock_inner();
        if inner.attempt != attempt {
            return;
        }
        self.release(&mut inner);
    }

    fn release(&self, inner: &mut Inner) {
        inner.state = CallState::Ending;
        // Invalidate the in-flight attempt and any late track callbacks.
        inner.attempt += 1;
        self.live_attempt.store(inner.attempt, Ordering::SeqCst);

        if let Some(mut transport) = inner.transport.take() {
            transport.stop_senders();
            transport.close();
        }
        inner.credential = None;
        self.lock_sink().clear();
        inner.state = CallState::Idle;
    }

    /// Handler passed to the transport for incoming tracks. Guarded two
    /// ways: events from a dead attempt are dropped, and re-attaching the
    /// stream already playing is a no-op.
    fn remote_track_handler(&self, attempt: u64) -> RemoteTrackHandler {
        let sink = Arc::clone(&self.sink);
        let live = Arc::clone(&self.live_attempt);
        Box::new(move |stream: RemoteStream| {
            if live.load(Ordering::SeqCst) != attempt {
                tracing::debug!("Dropping track event from a closed call attempt");
                return;
            }
            let mut sink = sink.lock().unwrap_or_else(|e| e.into_inner());
            if sink.attach(stream) {
                tracing::debug!("Remote audio attached");
            }
        })
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_sink(&self) -> MutexGuard<'_, RemoteSink> {
        self.sink.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::{mpsc, Semaphore};

    use super::*;
    use crate::call::transport::fake::{FakeFactory, FakeTrack, TrackState, TransportState};
    use crate::call::transport::MediaTrack;
    use crate::call::SdpKind;
    use crate::call::SessionDescription;

    // -- scripted collaborators ---------------------------------------------

    struct FakeCredentials {
        fail: bool,
    }

    #[async_trait]
    impl ProvideCredential for FakeCredentials {
        async fn fetch(&self) -> Result<Credential, CallError> {
            if self.fail {
                return Err(CallError::Backend("Internal Server Error".into()));
            }
            Ok(Credential {
                client_secret: "abc".into(),
                model: "m1".into(),
                expires_at: None,
            })
        }
    }

    /// Credential provider that signals when the fetch is in flight, then
    /// suspends until the test releases it.
    struct GatedCredentials {
        entered: mpsc::UnboundedSender<()>,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl ProvideCredential for GatedCredentials {
        async fn fetch(&self) -> Result<Credential, CallError> {
            let _ = self.entered.send(());
            let _permit = self.gate.acquire().await;
            Ok(Credential {
                client_secret: "abc".into(),
                model: "m1".into(),
                expires_at: None,
            })
        }
    }

    struct FakeDevices {
        fail: bool,
        track_state: Arc<TrackState>,
    }

    #[async_trait]
    impl MediaDevices for FakeDevices {
        async fn open_microphone(&self) -> Result<Vec<Box<dyn MediaTrack>>, CallError> {
            if self.fail {
                return Err(CallError::MediaAcquisition("Permission denied".into()));
            }
            Ok(vec![Box::new(FakeTrack {
                id: "mic-0".into(),
                state: Arc::clone(&self.track_state),
            })])
        }
    }

    /// Devices that signal when the microphone prompt is reached, then
    /// suspend until the test releases them.
    struct GatedDevices {
        entered: mpsc::UnboundedSender<()>,
        gate: Arc<Semaphore>,
        track_state: Arc<TrackState>,
    }

    #[async_trait]
    impl MediaDevices for GatedDevices {
        async fn open_microphone(&self) -> Result<Vec<Box<dyn MediaTrack>>, CallError> {
            let _ = self.entered.send(());
            let _permit = self.gate.acquire().await;
            Ok(vec![Box::new(FakeTrack {
                id: "mic-0".into(),
                state: Arc::clone(&self.track_state),
            })])
        }
    }

    struct FakeNegotiator {
        fail: bool,
    }

    #[async_trait]
    impl NegotiateSession for FakeNegotiator {
        async fn negotiate(
            &self,
            transport: &mut dyn MediaTransport,
            _credential: &Credential,
        ) -> Result<(), CallError> {
            let offer = transport.create_offer().await?;
            transport
                .set_local_description(SessionDescription::offer(offer))
                .await?;
            if self.fail {
                return Err(CallError::Negotiation("Invalid offer".into()));
            }
            transport
                .set_remote_description(SessionDescription::answer("ANSWER_SDP"))
                .await?;
            Ok(())
        }
    }

    /// Negotiator that suspends mid-exchange until released.
    struct GatedNegotiator {
        entered: mpsc::UnboundedSender<()>,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl NegotiateSession for GatedNegotiator {
        async fn negotiate(
            &self,
            _transport: &mut dyn MediaTransport,
            _credential: &Credential,
        ) -> Result<(), CallError> {
            let _ = self.entered.send(());
            let _permit = self.gate.acquire().await;
            Ok(())
        }
    }

    struct Harness {
        session: Arc<CallSession>,
        transport: Arc<TransportState>,
        track: Arc<TrackState>,
    }

    fn harness(
        fail_fetch: bool,
        fail_mic: bool,
        fail_negotiate: bool,
    ) -> Harness {
        let transport = TransportState::new();
        let track = Arc::new(TrackState::default());
        let session = CallSession::new(
            Arc::new(FakeCredentials { fail: fail_fetch }),
            Arc::new(FakeFactory {
                state: Arc::clone(&transport),
            }),
            Arc::new(FakeDevices {
                fail: fail_mic,
                track_state: Arc::clone(&track),
            }),
            Arc::new(FakeNegotiator {
                fail: fail_negotiate,
            }),
        );
        Harness {
            session: Arc::new(session),
            transport,
            track,
        }
    }

    fn assert_fully_released(h: &Harness) {
        assert_eq!(h.session.state(), CallState::Idle);
        assert!(h.session.remote_stream().is_none());
        let inner = h.session.lock_inner();
        assert!(inner.transport.is_none());
        assert!(inner.credential.is_none());
    }

    // -- lifecycle ----------------------------------------------------------

    #[tokio::test]
    async fn test_successful_call_goes_active() {
        let h = harness(false, false, false);
        let outcome = h.session.start().await.unwrap();
        assert_eq!(outcome, CallOutcome::Connected);
        assert_eq!(h.session.state(), CallState::Active);

        // Microphone attached, offer committed, answer applied.
        assert_eq!(*h.transport.added_tracks.lock().unwrap(), vec!["mic-0"]);
        assert!(h.transport.local_description.lock().unwrap().is_some());
        let remote = h.transport.remote_description.lock().unwrap();
        assert_eq!(remote.as_ref().unwrap().kind, SdpKind::Answer);
    }

    #[tokio::test]
    async fn test_end_releases_everything() {
        let h = harness(false, false, false);
        h.session.start().await.unwrap();
        h.session.end();

        assert_fully_released(&h);
        assert!(h.transport.senders_stopped.load(Ordering::SeqCst));
        assert!(h.transport.closed.load(Ordering::SeqCst));
        assert!(h.track.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_end_twice_is_noop() {
        let h = harness(false, false, false);
        h.session.start().await.unwrap();
        h.session.end();
        h.session.end();
        assert_fully_released(&h);
    }

    #[tokio::test]
    async fn test_end_without_start_is_noop() {
        let h = harness(false, false, false);
        h.session.end();
        assert_eq!(h.session.state(), CallState::Idle);
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let h = harness(false, false, false);
        h.session.start().await.unwrap();
        let err = h.session.start().await.unwrap_err();
        assert!(matches!(err, CallError::InvalidState(CallState::Active)));
    }

    // -- failure points -----------------------------------------------------

    #[tokio::test]
    async fn test_credential_failure_returns_to_idle() {
        let h = harness(true, false, false);
        let err = h.session.start().await.unwrap_err();
        assert!(matches!(err, CallError::Backend(_)));
        assert_fully_released(&h);
        // The transport was never created.
        assert!(!h.transport.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_microphone_failure_returns_to_idle() {
        let h = harness(false, true, false);
        let err = h.session.start().await.unwrap_err();
        assert!(matches!(err, CallError::MediaAcquisition(_)));
        assert_fully_released(&h);
        // The transport existed by then and was closed during teardown.
        assert!(h.transport.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_negotiation_failure_returns_to_idle() {
        let h = harness(false, false, true);
        let err = h.session.start().await.unwrap_err();
        match err {
            CallError::Negotiation(body) => assert_eq!(body, "Invalid offer"),
            other => panic!("expected Negotiation error, got {:?}", other),
        }
        assert_fully_released(&h);
        assert!(h.transport.senders_stopped.load(Ordering::SeqCst));
        assert!(h.transport.closed.load(Ordering::SeqCst));
        assert!(h.track.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_transport_failure_returns_to_idle() {
        let h = harness(false, false, false);
        h.transport.fail_offer.store(true, Ordering::SeqCst);
        let err = h.session.start().await.unwrap_err();
        assert!(matches!(err, CallError::Transport(_)));
        assert_fully_released(&h);
        // The microphone was live by then; teardown must stop it.
        assert!(h.transport.closed.load(Ordering::SeqCst));
        assert!(h.track.stopped.load(Ordering::SeqCst));
    }

    // -- hangup racing a suspended start ------------------------------------

    #[tokio::test]
    async fn test_end_while_suspended_in_credential_fetch() {
        let transport = TransportState::new();
        let track = Arc::new(TrackState::default());
        let (entered_tx, mut entered_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Semaphore::new(0));

        let session = Arc::new(CallSession::new(
            Arc::new(GatedCredentials {
                entered: entered_tx,
                gate: Arc::clone(&gate),
            }),
            Arc::new(FakeFactory {
                state: Arc::clone(&transport),
            }),
            Arc::new(FakeDevices {
                fail: false,
                track_state: Arc::clone(&track),
            }),
            Arc::new(FakeNegotiator { fail: false }),
        ));

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start().await }
        });

        // Hang up while the fetch is still in flight, then let it complete.
        entered_rx.recv().await.unwrap();
        session.end();
        gate.add_permits(1);

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, CallOutcome::Abandoned);
        assert_eq!(session.state(), CallState::Idle);
        // The attempt died before the transport or microphone existed, and
        // the late-arriving credential was discarded rather than stored.
        assert!(!transport.closed.load(Ordering::SeqCst));
        assert!(transport.added_tracks.lock().unwrap().is_empty());
        assert!(!track.stopped.load(Ordering::SeqCst));
        let inner = session.lock_inner();
        assert!(inner.credential.is_none());
    }

    #[tokio::test]
    async fn test_end_while_suspended_at_microphone() {
        let transport = TransportState::new();
        let track = Arc::new(TrackState::default());
        let (entered_tx, mut entered_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Semaphore::new(0));

        let session = Arc::new(CallSession::new(
            Arc::new(FakeCredentials { fail: false }),
            Arc::new(FakeFactory {
                state: Arc::clone(&transport),
            }),
            Arc::new(GatedDevices {
                entered: entered_tx,
                gate: Arc::clone(&gate),
                track_state: Arc::clone(&track),
            }),
            Arc::new(FakeNegotiator { fail: false }),
        ));

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start().await }
        });

        // Wait until start() is suspended at the permission prompt, hang up,
        // then let it resume.
        entered_rx.recv().await.unwrap();
        session.end();
        gate.add_permits(1);

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, CallOutcome::Abandoned);
        assert_eq!(session.state(), CallState::Idle);
        // end() closed the transport; the resumed task stopped the tracks it
        // had just acquired.
        assert!(transport.closed.load(Ordering::SeqCst));
        assert!(track.stopped.load(Ordering::SeqCst));
        let inner = session.lock_inner();
        assert!(inner.transport.is_none());
        assert!(inner.credential.is_none());
    }

    #[tokio::test]
    async fn test_end_while_suspended_in_negotiation() {
        let transport = TransportState::new();
        let track = Arc::new(TrackState::default());
        let (entered_tx, mut entered_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Semaphore::new(0));

        let session = Arc::new(CallSession::new(
            Arc::new(FakeCredentials { fail: false }),
            Arc::new(FakeFactory {
                state: Arc::clone(&transport),
            }),
            Arc::new(FakeDevices {
                fail: false,
                track_state: Arc::clone(&track),
            }),
            Arc::new(GatedNegotiator {
                entered: entered_tx,
                gate: Arc::clone(&gate),
            }),
        ));

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start().await }
        });

        entered_rx.recv().await.unwrap();
        session.end();
        gate.add_permits(1);

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, CallOutcome::Abandoned);
        assert_eq!(session.state(), CallState::Idle);
        // The transport was out of the session during negotiation, so the
        // resumed task had to close it itself.
        assert!(transport.senders_stopped.load(Ordering::SeqCst));
        assert!(transport.closed.load(Ordering::SeqCst));
        assert!(track.stopped.load(Ordering::SeqCst));
    }

    // -- remote track events ------------------------------------------------

    #[tokio::test]
    async fn test_duplicate_track_events_attach_once() {
        let h = harness(false, false, false);
        h.session.start().await.unwrap();

        h.transport.emit_remote_track("s1");
        h.transport.emit_remote_track("s1");
        assert_eq!(h.session.remote_stream().unwrap().id, "s1");

        // A genuinely different stream does replace the sink.
        h.transport.emit_remote_track("s2");
        assert_eq!(h.session.remote_stream().unwrap().id, "s2");
    }

    #[tokio::test]
    async fn test_track_event_after_end_is_dropped() {
        let h = harness(false, false, false);
        h.session.start().await.unwrap();
        h.session.end();

        h.transport.emit_remote_track("s-late");
        assert!(h.session.remote_stream().is_none());
        assert_eq!(h.session.state(), CallState::Idle);
    }
}
