use crate::config::{DescriptorFormat, SessionConfig};
use crate::peer::descriptor;
use crate::peer::engine::{Channel, Engine, EngineParts};
use crate::peer::ice::{log_candidates, ReadinessGate};
use crate::peer::state::ConnectionState;
use crate::peer::types::{
    DescriptorKind, EngineEvent, GatheringState, LocalSnapshot, RawPhase, SessionDescriptor,
};
use crate::utils::random_id;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Pending,
    Open,
    Closed,
}

/// One live negotiation/connection. Owned by the orchestrator, rebuilt
/// rather than mutated when the configuration changes.
pub struct Session {
    pub id: String,
    pub generation: u64,
    engine: Arc<dyn Engine>,
    channel: Option<Arc<dyn Channel>>,
    channel_state: ChannelState,
    phase: RawPhase,
    has_remote_descriptor: bool,
    gate: ReadinessGate,
    // какой дескриптор сейчас собираем: offer или answer
    local_role: DescriptorKind,
    format: DescriptorFormat,
    expect_public: bool,
}

impl Session {
    pub fn new(generation: u64, parts: EngineParts, config: &SessionConfig) -> Self {
        let id = random_id();
        info!(session = %id, generation, relay = config.use_relay_server, "session created");
        Self {
            id,
            generation,
            engine: parts.engine,
            channel: Some(parts.channel),
            channel_state: ChannelState::Pending,
            phase: RawPhase::New,
            has_remote_descriptor: false,
            gate: ReadinessGate::new(),
            local_role: DescriptorKind::Offer,
            format: config.descriptor_format,
            expect_public: config.use_relay_server,
        }
    }

    pub fn engine(&self) -> Arc<dyn Engine> {
        self.engine.clone()
    }

    /// The channel, only once it is open.
    pub fn open_channel(&self) -> Option<Arc<dyn Channel>> {
        match self.channel_state {
            ChannelState::Open => self.channel.clone(),
            _ => None,
        }
    }

    pub fn has_remote_descriptor(&self) -> bool {
        self.has_remote_descriptor
    }

    pub fn local_descriptor(&self) -> Option<&str> {
        self.gate.local_descriptor()
    }

    pub fn is_loading(&self) -> bool {
        self.gate.is_loading()
    }

    pub fn connection_state(&self) -> ConnectionState {
        // connected только когда data channel уже открыт
        let phase = match (self.phase, self.channel_state) {
            (RawPhase::Connected, ChannelState::Pending) => RawPhase::Connecting,
            (phase, _) => phase,
        };
        ConnectionState::derive(phase, self.has_remote_descriptor)
    }

    /// Apply an engine event. Returns inbound message text for dispatch.
    pub fn handle(&mut self, event: EngineEvent) -> Option<String> {
        match event {
            EngineEvent::GatheringStateChanged {
                state,
                local_description,
            } => self.on_gathering(state, local_description),
            EngineEvent::ConnectionPhaseChanged(phase) => self.set_phase(phase),
            EngineEvent::ChannelOpened => {
                info!(session = %self.id, "data channel open");
                if self.channel_state == ChannelState::Pending {
                    self.channel_state = ChannelState::Open;
                }
            }
            EngineEvent::ChannelClosed => {
                info!(session = %self.id, "data channel closed");
                self.channel_state = ChannelState::Closed;
                self.set_phase(RawPhase::Closed);
            }
            EngineEvent::ChannelMessage(text) => return Some(text),
        }
        None
    }

    /// Result of a local description request, handled like a gathering event.
    pub fn apply_snapshot(&mut self, snapshot: LocalSnapshot) {
        self.on_gathering(snapshot.gathering, snapshot.descriptor);
    }

    pub fn mark_remote_applied(&mut self) {
        self.has_remote_descriptor = true;
    }

    /// A remote offer was applied: the offer we had is obsolete, an answer follows.
    pub fn begin_answer(&mut self) {
        self.local_role = DescriptorKind::Answer;
        self.gate.clear();
    }

    /// Ошибка движка: сессия окончена.
    pub fn fail(&mut self) {
        warn!(session = %self.id, "session failed");
        self.phase = RawPhase::Failed;
    }

    fn set_phase(&mut self, phase: RawPhase) {
        if self.phase.is_terminal() {
            debug!(session = %self.id, ?phase, "ignoring phase change after disconnect");
            return;
        }
        debug!(session = %self.id, from = ?self.phase, to = ?phase, "connection phase");
        self.phase = phase;
    }

    fn on_gathering(&mut self, state: GatheringState, desc: Option<SessionDescriptor>) {
        if let Some(desc) = &desc {
            if desc.kind != self.local_role {
                debug!(
                    session = %self.id,
                    got = %desc.kind,
                    want = %self.local_role,
                    "ignoring gathering result for superseded description"
                );
                return;
            }
        }

        if !state.is_complete() {
            self.gate.on_gathering_state(state, None);
            return;
        }

        let blob = desc.and_then(|desc| {
            log_candidates(&desc.sdp, self.expect_public);
            match descriptor::encode(&desc, self.format) {
                Ok(blob) => Some(blob),
                Err(e) => {
                    warn!(session = %self.id, error = %e, "cannot encode local descriptor");
                    None
                }
            }
        });
        if blob.is_some() {
            info!(session = %self.id, role = %self.local_role, "local descriptor ready");
        }
        self.gate.on_gathering_state(state, blob);
    }

    /// Release the engine and the channel.
    pub async fn close(mut self) {
        info!(session = %self.id, generation = self.generation, "closing session");
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        self.engine.close().await;
    }
}
