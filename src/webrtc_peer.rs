//! The peer session orchestrator.
//!
//! [`ServerlessPeer`] owns one [`Session`] at a time and folds the engine's
//! callbacks into three observable values: the finalized local descriptor,
//! a loading flag and a [`ConnectionState`]. Engine events are queued on an
//! internal channel and applied by whoever drives the peer
//! ([`ServerlessPeer::next_event`] + [`ServerlessPeer::handle_event`], or
//! [`ServerlessPeer::process_pending`]). Every event is stamped with the
//! generation of the session that produced it; events from a disposed or
//! replaced session are dropped.

use crate::config::SessionConfig;
use crate::error::{EngineError, PeerError};
use crate::peer::descriptor;
use crate::peer::engine::{EngineFactory, EventSink, SessionEvent};
use crate::peer::message::{self, MessageEnvelope};
use crate::peer::registry::{HandlerRegistry, Registration};
use crate::peer::state::ConnectionState;
use crate::peer::types::DescriptorKind;
use crate::session::Session;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Everything the presentation layer renders.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PeerStatus {
    pub connection_state: ConnectionState,
    pub local_descriptor: Option<String>,
    pub is_loading: bool,
}

pub struct ServerlessPeer {
    factory: Arc<dyn EngineFactory>,
    config: SessionConfig,
    session: Option<Session>,
    generation: u64,
    // engine construction failed with no session to carry the state
    faulted: bool,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    registry: HandlerRegistry,
    status: watch::Sender<PeerStatus>,
}

impl ServerlessPeer {
    /// A peer with no session yet. Call [`configure`](Self::configure) to start one.
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(PeerStatus {
            is_loading: true,
            ..PeerStatus::default()
        });
        Self {
            factory,
            config: SessionConfig::default(),
            session: None,
            generation: 0,
            faulted: false,
            events_tx,
            events_rx,
            registry: HandlerRegistry::new(),
            status,
        }
    }

    /// Build a peer and its first session.
    pub async fn create(factory: Arc<dyn EngineFactory>, config: SessionConfig) -> Result<Self, PeerError> {
        let mut peer = Self::new(factory);
        peer.configure(config).await?;
        Ok(peer)
    }

    /// Tear down the current session (if any) and build a new one from `config`.
    ///
    /// Local description generation starts right away: the data channel
    /// exists from creation, so negotiation is always needed at setup.
    pub async fn configure(&mut self, config: SessionConfig) -> Result<(), PeerError> {
        config.validate()?;

        if self.session.is_some() || self.faulted {
            self.teardown().await;
        }

        self.generation += 1;
        let generation = self.generation;
        self.config = config.clone();
        let sink = EventSink::new(generation, self.events_tx.clone());

        let parts = match self.factory.create(&config, sink).await {
            Ok(parts) => parts,
            Err(e) => {
                error!(generation, error = %e, "engine construction failed");
                self.faulted = true;
                self.publish();
                return Err(PeerError::EngineFatal(e.to_string()));
            }
        };

        let mut session = Session::new(generation, parts, &config);
        let engine = session.engine();
        let result = engine.generate_local_descriptor().await;
        match result {
            Ok(snapshot) => session.apply_snapshot(snapshot),
            Err(e) => {
                error!(session = %session.id, error = %e, "initial local description failed");
                session.fail();
            }
        }
        let failed = session.connection_state().is_terminal();
        self.session = Some(session);
        self.publish();

        if failed {
            return Err(PeerError::EngineFatal(
                "could not generate local description".into(),
            ));
        }
        Ok(())
    }

    /// Apply the descriptor the remote peer handed over out-of-band.
    ///
    /// Malformed input is reported and leaves the session untouched. When the
    /// descriptor is an offer, a matching answer is generated and becomes the
    /// new local descriptor once its gathering completes.
    pub async fn set_remote_descriptor(&mut self, blob: &str) -> Result<(), PeerError> {
        if self.session.is_none() {
            return Err(PeerError::NotReady);
        }
        let desc = descriptor::decode(blob)?;

        // apply whatever the engine already reported before moving on
        self.process_pending();

        let engine = {
            let session = self.session.as_ref().ok_or(PeerError::NotReady)?;
            if session.connection_state().is_terminal() {
                return Err(PeerError::EngineFatal(
                    "session is disconnected, create a new one".into(),
                ));
            }
            session.engine()
        };

        let kind = desc.kind;
        debug!(%kind, "applying remote descriptor");
        if let Err(e) = engine.apply_remote_descriptor(desc).await {
            return Err(self.engine_failure(e));
        }

        let session = self.session.as_mut().ok_or(PeerError::NotReady)?;
        session.mark_remote_applied();
        info!(session = %session.id, %kind, "remote descriptor applied");

        if kind == DescriptorKind::Offer {
            session.begin_answer();
            self.publish();

            match engine.generate_local_descriptor().await {
                Ok(snapshot) => {
                    if let Some(session) = self.session.as_mut() {
                        session.apply_snapshot(snapshot);
                    }
                }
                Err(e) => {
                    error!(error = %e, "answer generation failed");
                    if let Some(session) = self.session.as_mut() {
                        session.fail();
                    }
                    self.publish();
                    return Err(PeerError::EngineFatal(e.to_string()));
                }
            }
        }

        self.publish();
        Ok(())
    }

    /// Encode and send; dropped (not queued) while the data channel is not open.
    pub async fn send_message<T: Serialize>(&self, envelope: &MessageEnvelope<T>) {
        let Some(channel) = self.session.as_ref().and_then(Session::open_channel) else {
            debug!(kind = %envelope.kind, "no open data channel, dropping outgoing message");
            return;
        };
        let text = match message::encode(envelope) {
            Ok(text) => text,
            Err(e) => {
                warn!(kind = %envelope.kind, error = %e, "cannot encode outgoing message");
                return;
            }
        };
        if let Err(e) = channel.send_text(text).await {
            warn!(kind = %envelope.kind, error = %e, "send failed");
        }
    }

    /// Register the handler for `kind`, replacing any previous one.
    pub fn register_handler<T, F>(&self, kind: impl Into<String>, handler: F) -> Registration
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.registry.register(kind, handler)
    }

    /// Close the session, reset derived state and clear all handlers. Idempotent.
    pub async fn dispose(&mut self) {
        self.teardown().await;
        self.publish();
    }

    async fn teardown(&mut self) {
        // anything still queued or in flight for the old session is now stale
        self.generation += 1;
        self.faulted = false;
        if let Some(session) = self.session.take() {
            session.close().await;
        }
        self.registry.clear();
    }

    /// Wait for the next engine event. Pair with [`handle_event`](Self::handle_event).
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.generation == event.generation)
        else {
            debug!(
                generation = event.generation,
                current = self.generation,
                "dropping event from stale session"
            );
            return;
        };

        if let Some(text) = session.handle(event.event) {
            match message::decode(&text) {
                Ok(envelope) => {
                    self.registry.dispatch(envelope);
                }
                Err(e) => warn!(error = %e, "dropping undecodable message"),
            }
        }
        self.publish();
    }

    /// Apply every event queued so far without waiting. Returns how many were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn local_descriptor(&self) -> Option<&str> {
        self.session.as_ref().and_then(Session::local_descriptor)
    }

    pub fn is_loading(&self) -> bool {
        self.session.as_ref().map_or(true, Session::is_loading)
    }

    pub fn connection_state(&self) -> ConnectionState {
        match &self.session {
            Some(session) => session.connection_state(),
            None if self.faulted => ConnectionState::Disconnected,
            None => ConnectionState::Initial,
        }
    }

    pub fn has_remote_descriptor(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(Session::has_remote_descriptor)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Generation of the live session; bumps on every teardown.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> PeerStatus {
        PeerStatus {
            connection_state: self.connection_state(),
            local_descriptor: self.local_descriptor().map(str::to_string),
            is_loading: self.is_loading(),
        }
    }

    /// Receiver that sees every status change.
    pub fn subscribe(&self) -> watch::Receiver<PeerStatus> {
        self.status.subscribe()
    }

    fn publish(&self) {
        let next = self.status();
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                debug!(state = %next.connection_state, loading = next.is_loading, "status changed");
                *current = next;
                true
            }
        });
    }

    fn engine_failure(&mut self, err: EngineError) -> PeerError {
        let err = PeerError::from(err);
        if let PeerError::EngineFatal(reason) = &err {
            error!(%reason, "engine failure");
            if let Some(session) = self.session.as_mut() {
                session.fail();
            }
            self.publish();
        } else {
            warn!(error = %err, "remote descriptor rejected");
        }
        err
    }
}
