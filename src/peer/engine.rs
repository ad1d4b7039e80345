//! Seams between the orchestrator and a transport engine.
//!
//! The production engine lives in [`crate::peer::connection`]; tests script
//! their own. Engines never touch orchestrator state directly: everything
//! they observe goes through an [`EventSink`] stamped with the generation of
//! the session that created it.

use crate::config::SessionConfig;
use crate::error::EngineError;
use crate::peer::types::{EngineEvent, LocalSnapshot, SessionDescriptor};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// Event tagged with the generation of the session it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub generation: u64,
    pub event: EngineEvent,
}

/// Where an engine delivers its events.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
    live: Arc<AtomicBool>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            generation,
            tx,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Same queue and generation, but with its own off switch. Engines hand
    /// one to each underlying connection so a replaced connection goes quiet.
    pub fn scoped(&self) -> (EventSink, Detach) {
        let live = Arc::new(AtomicBool::new(true));
        let sink = EventSink {
            generation: self.generation,
            tx: self.tx.clone(),
            live: live.clone(),
        };
        (sink, Detach(live))
    }

    /// Queue an event. Silently dropped once the orchestrator is gone or the sink is detached.
    pub fn emit(&self, event: EngineEvent) {
        if !self.live.load(Ordering::Acquire) {
            trace!(generation = self.generation, ?event, "dropping event from detached sink");
            return;
        }
        trace!(generation = self.generation, ?event, "engine event");
        let _ = self.tx.send(SessionEvent {
            generation: self.generation,
            event,
        });
    }
}

/// Cuts off the sink returned alongside it by [`EventSink::scoped`].
#[derive(Debug)]
pub struct Detach(Arc<AtomicBool>);

impl Detach {
    pub fn detach(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One live peer connection.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Create an offer, or an answer if a remote offer has been applied,
    /// and install it as the local description.
    async fn generate_local_descriptor(&self) -> Result<LocalSnapshot, EngineError>;

    /// Apply the peer's descriptor. Bad input is `EngineError::Rejected`.
    async fn apply_remote_descriptor(&self, desc: SessionDescriptor) -> Result<(), EngineError>;

    async fn close(&self);
}

/// The pre-negotiated data channel.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn send_text(&self, text: String) -> Result<(), EngineError>;

    async fn close(&self);
}

/// Handles produced when a session is created.
pub struct EngineParts {
    pub engine: Arc<dyn Engine>,
    pub channel: Arc<dyn Channel>,
}

/// Builds engines. One call per session.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(&self, config: &SessionConfig, events: EventSink) -> Result<EngineParts, EngineError>;
}
