//! Call life-cycle state machine
//!
//! One [`CallMachine`] per endpoint. It owns the local media and the
//! peer negotiation object, emits signaling events through the
//! [`SignalSink`], and is driven by the connection task with the
//! signaling events received from the server.
//!
//! Late or stray signaling (a response after a timeout, an offer after
//! a hang-up) is dropped with a debug log rather than treated as an
//! error: the relay forwards blindly, so both ends must tolerate
//! messages that no longer match their state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use helplink_shared::events::ClientEvent;
use helplink_shared::types::{CallKind, UserId};

use crate::media::{LocalMedia, MediaError, MediaSource};
use crate::peer::{PeerConnector, PeerError, PeerLink};
use crate::signal::{SignalError, SignalSink};

/// Where the endpoint is in the call life-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// No call in progress
    Idle,
    /// Caller side: request sent, waiting for the callee's decision
    Requesting,
    /// Callee side: incoming call presented, not yet answered
    Ringing,
    /// Both sides accepted, offer/answer/candidate exchange in flight
    Negotiating,
    /// Remote media is flowing
    Connected,
}

/// Tunables for the machine.
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// How long an unanswered call may ring before it is abandoned.
    /// `None` disables the timeout.
    pub ring_timeout: Option<Duration>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ring_timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// What a `call:response` did to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Callee accepted; the offer has been sent and negotiation started
    Proceeding,
    /// Callee declined; the call was torn down
    Declined,
    /// The response did not match an outstanding request and was dropped
    Ignored,
}

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("A call is already in progress")]
    Busy,
    #[error("No incoming call to answer")]
    NoCall,
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// The per-endpoint call state machine.
pub struct CallMachine {
    media_source: Arc<dyn MediaSource>,
    connector: Arc<dyn PeerConnector>,
    signals: Arc<dyn SignalSink>,
    config: CallConfig,

    state: CallState,
    media: Option<Box<dyn LocalMedia>>,
    peer: Option<Box<dyn PeerLink>>,
    remote: Option<UserId>,
    kind: Option<CallKind>,
    ring_started: Option<Instant>,
}

impl CallMachine {
    pub fn new(
        media_source: Arc<dyn MediaSource>,
        connector: Arc<dyn PeerConnector>,
        signals: Arc<dyn SignalSink>,
        config: CallConfig,
    ) -> Self {
        Self {
            media_source,
            connector,
            signals,
            config,
            state: CallState::Idle,
            media: None,
            peer: None,
            remote: None,
            kind: None,
            ring_started: None,
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn remote(&self) -> Option<UserId> {
        self.remote
    }

    /// Start an outgoing call.
    ///
    /// Local media is acquired before anything is signaled: if the user
    /// denies capture access the remote side never learns a call was
    /// attempted. `to` names the callee when the caller is an admin;
    /// user calls leave it `None` and the server routes to the admins.
    pub async fn start_call(
        &mut self,
        kind: CallKind,
        to: Option<UserId>,
    ) -> Result<(), CallError> {
        if self.state != CallState::Idle {
            return Err(CallError::Busy);
        }

        let media = self.media_source.acquire(kind).await?;
        // Own the tracks before signaling so a send failure still
        // releases them through reset
        self.media = Some(media);

        if let Err(err) = self.signals.send(ClientEvent::CallRequest { kind, to }) {
            self.reset();
            return Err(err.into());
        }
        self.remote = to;
        self.kind = Some(kind);
        self.ring_started = Some(Instant::now());
        self.state = CallState::Requesting;
        Ok(())
    }

    /// Handle an incoming `call:incoming`.
    ///
    /// If a call is already in progress the new one is auto-rejected so
    /// the caller is not left ringing against a busy endpoint.
    pub fn on_incoming(&mut self, from: UserId, kind: CallKind) -> Result<(), CallError> {
        if self.state != CallState::Idle {
            debug!(%from, "busy, auto-rejecting incoming call");
            self.signals.send(ClientEvent::CallRespond {
                to: from,
                accepted: false,
            })?;
            return Err(CallError::Busy);
        }

        self.remote = Some(from);
        self.kind = Some(kind);
        self.ring_started = Some(Instant::now());
        self.state = CallState::Ringing;
        Ok(())
    }

    /// Answer the ringing call.
    ///
    /// Media is acquired before the accept is signaled; if acquisition
    /// fails the caller receives a reject instead of an accept that
    /// could never produce media.
    pub async fn accept(&mut self) -> Result<(), CallError> {
        if self.state != CallState::Ringing {
            return Err(CallError::NoCall);
        }
        let remote = match self.remote {
            Some(remote) => remote,
            None => return Err(CallError::NoCall),
        };
        let kind = self.kind.unwrap_or(CallKind::Audio);

        match self.media_source.acquire(kind).await {
            Ok(media) => {
                self.media = Some(media);
                if let Err(err) = self.signals.send(ClientEvent::CallRespond {
                    to: remote,
                    accepted: true,
                }) {
                    self.reset();
                    return Err(err.into());
                }
                self.ring_started = None;
                self.state = CallState::Negotiating;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "media acquisition failed, rejecting call");
                // Best-effort reject; teardown must happen either way
                let _ = self.signals.send(ClientEvent::CallRespond {
                    to: remote,
                    accepted: false,
                });
                self.reset();
                Err(err.into())
            }
        }
    }

    /// Decline the ringing call.
    pub fn reject(&mut self) -> Result<(), CallError> {
        if self.state != CallState::Ringing {
            return Err(CallError::NoCall);
        }
        if let Some(remote) = self.remote {
            self.signals.send(ClientEvent::CallRespond {
                to: remote,
                accepted: false,
            })?;
        }
        self.reset();
        Ok(())
    }

    /// Handle the callee's `call:response`.
    ///
    /// On accept the peer connection is created and the offer sent; on
    /// decline the reserved media is released. For a user caller this is
    /// also where the answering admin's identity is learned.
    pub async fn on_response(
        &mut self,
        from: UserId,
        accepted: bool,
    ) -> Result<ResponseOutcome, CallError> {
        if self.state != CallState::Requesting {
            debug!(%from, "dropping call response with no outstanding request");
            return Ok(ResponseOutcome::Ignored);
        }
        if let Some(expected) = self.remote {
            if expected != from {
                debug!(%from, "dropping call response from unexpected party");
                return Ok(ResponseOutcome::Ignored);
            }
        }

        if !accepted {
            self.reset();
            return Ok(ResponseOutcome::Declined);
        }

        self.remote = Some(from);
        self.ring_started = None;

        let result = self.begin_offer(from).await;
        if let Err(err) = result {
            warn!(error = %err, "negotiation setup failed, abandoning call");
            self.reset();
            return Err(err);
        }
        self.state = CallState::Negotiating;
        Ok(ResponseOutcome::Proceeding)
    }

    async fn begin_offer(&mut self, to: UserId) -> Result<(), CallError> {
        let mut peer = self.connector.connect()?;
        let offer = peer.create_offer().await?;
        self.signals.send(ClientEvent::WebrtcOffer { to, offer })?;
        self.peer = Some(peer);
        Ok(())
    }

    /// Handle a forwarded SDP offer (callee side, after accepting).
    pub async fn on_offer(&mut self, from: UserId, offer: Value) -> Result<(), CallError> {
        if self.state != CallState::Negotiating || self.remote != Some(from) {
            debug!(%from, "dropping offer outside an active negotiation");
            return Ok(());
        }

        let result = self.answer_offer(from, offer).await;
        if let Err(err) = result {
            warn!(error = %err, "failed to answer offer, abandoning call");
            self.reset();
            return Err(err);
        }
        Ok(())
    }

    async fn answer_offer(&mut self, from: UserId, offer: Value) -> Result<(), CallError> {
        let mut peer = match self.peer.take() {
            Some(peer) => peer,
            None => self.connector.connect()?,
        };
        let answer = peer.accept_offer(offer).await?;
        self.signals.send(ClientEvent::WebrtcAnswer { to: from, answer })?;
        self.peer = Some(peer);
        Ok(())
    }

    /// Handle a forwarded SDP answer (caller side).
    pub async fn on_answer(&mut self, from: UserId, answer: Value) -> Result<(), CallError> {
        if self.remote != Some(from) {
            debug!(%from, "dropping answer from unexpected party");
            return Ok(());
        }
        match self.peer.as_mut() {
            Some(peer) => {
                peer.apply_answer(answer).await?;
                Ok(())
            }
            None => {
                debug!(%from, "dropping answer with no peer connection");
                Ok(())
            }
        }
    }

    /// Handle a forwarded ICE candidate. Candidates may race the answer
    /// or arrive after teardown; anything the peer cannot apply is
    /// logged and dropped.
    pub async fn on_ice(&mut self, from: UserId, candidate: Value) {
        if self.remote != Some(from) {
            debug!(%from, "dropping candidate from unexpected party");
            return;
        }
        match self.peer.as_mut() {
            Some(peer) => {
                if let Err(err) = peer.add_remote_candidate(candidate).await {
                    warn!(error = %err, "ignoring unusable ICE candidate");
                }
            }
            None => debug!(%from, "dropping candidate with no peer connection"),
        }
    }

    /// Remote media started flowing; the call is up.
    pub fn on_remote_track(&mut self) {
        if self.state == CallState::Negotiating {
            self.state = CallState::Connected;
        }
    }

    /// End whatever call is in progress. Idempotent; a ringing call is
    /// declined toward the caller before teardown.
    pub fn hang_up(&mut self) {
        if self.state == CallState::Ringing {
            if let Some(remote) = self.remote {
                let _ = self.signals.send(ClientEvent::CallRespond {
                    to: remote,
                    accepted: false,
                });
            }
        }
        self.reset();
    }

    /// Advance time-based transitions. Returns true when the ring
    /// timeout expired and the call was abandoned.
    pub fn tick(&mut self, now: Instant) -> bool {
        let timeout = match self.config.ring_timeout {
            Some(timeout) => timeout,
            None => return false,
        };
        let started = match self.ring_started {
            Some(started) => started,
            None => return false,
        };
        if now.duration_since(started) < timeout {
            return false;
        }

        match self.state {
            CallState::Ringing => {
                debug!("ring timeout, declining unanswered call");
                if let Some(remote) = self.remote {
                    let _ = self.signals.send(ClientEvent::CallRespond {
                        to: remote,
                        accepted: false,
                    });
                }
                self.reset();
                true
            }
            CallState::Requesting => {
                debug!("ring timeout, abandoning unanswered request");
                self.reset();
                true
            }
            _ => false,
        }
    }

    fn reset(&mut self) {
        if let Some(mut peer) = self.peer.take() {
            peer.close();
        }
        if let Some(mut media) = self.media.take() {
            media.stop();
        }
        self.remote = None;
        self.kind = None;
        self.ring_started = None;
        self.state = CallState::Idle;
    }
}
