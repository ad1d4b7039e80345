//! In-memory engine whose events are fired by the test itself.

#![allow(dead_code)]

use async_trait::async_trait;
use serverless_webrtc::peer::{
    Channel, DescriptorKind, Engine, EngineEvent, EngineFactory, EngineParts, EventSink,
    GatheringState, LocalSnapshot, RawPhase, SessionDescriptor,
};
use serverless_webrtc::{EngineError, SessionConfig};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const OFFER_SDP: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\na=candidate:1 1 udp 2130706431 10.0.0.2 5000 typ host\r\n";
pub const ANSWER_SDP: &str = "v=0\r\no=- 3 4 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\na=candidate:1 1 udp 2130706431 10.0.0.3 6000 typ host\r\n";

#[derive(Default)]
pub struct Script {
    pub sinks: Vec<EventSink>,
    pub configs: Vec<SessionConfig>,
    pub snapshots: VecDeque<Result<LocalSnapshot, EngineError>>,
    pub applied: Vec<SessionDescriptor>,
    pub sent: Vec<String>,
    pub fail_create: bool,
    pub reject_next_apply: bool,
    pub engines_closed: usize,
    pub channels_closed: usize,
}

#[derive(Clone, Default)]
pub struct ScriptedFactory {
    pub script: Arc<Mutex<Script>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink handed to the most recent session.
    pub fn sink(&self) -> EventSink {
        self.script
            .lock()
            .unwrap()
            .sinks
            .last()
            .cloned()
            .expect("no session created yet")
    }

    pub fn emit(&self, event: EngineEvent) {
        self.sink().emit(event);
    }

    pub fn push_snapshot(&self, snapshot: Result<LocalSnapshot, EngineError>) {
        self.script.lock().unwrap().snapshots.push_back(snapshot);
    }

    pub fn sent(&self) -> Vec<String> {
        self.script.lock().unwrap().sent.clone()
    }

    pub fn applied(&self) -> Vec<SessionDescriptor> {
        self.script.lock().unwrap().applied.clone()
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.script.lock().unwrap().fail_create = fail;
    }

    pub fn reject_next_apply(&self) {
        self.script.lock().unwrap().reject_next_apply = true;
    }
}

#[async_trait]
impl EngineFactory for ScriptedFactory {
    async fn create(&self, config: &SessionConfig, events: EventSink) -> Result<EngineParts, EngineError> {
        let mut script = self.script.lock().unwrap();
        if script.fail_create {
            return Err(EngineError::Setup("scripted failure".into()));
        }
        script.sinks.push(events);
        script.configs.push(config.clone());
        Ok(EngineParts {
            engine: Arc::new(ScriptedEngine {
                script: self.script.clone(),
            }),
            channel: Arc::new(ScriptedChannel {
                script: self.script.clone(),
            }),
        })
    }
}

pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn generate_local_descriptor(&self) -> Result<LocalSnapshot, EngineError> {
        self.script
            .lock()
            .unwrap()
            .snapshots
            .pop_front()
            .unwrap_or(Ok(LocalSnapshot {
                gathering: GatheringState::Gathering,
                descriptor: None,
            }))
    }

    async fn apply_remote_descriptor(&self, desc: SessionDescriptor) -> Result<(), EngineError> {
        let mut script = self.script.lock().unwrap();
        if std::mem::take(&mut script.reject_next_apply) {
            return Err(EngineError::Rejected("scripted rejection".into()));
        }
        script.applied.push(desc);
        Ok(())
    }

    async fn close(&self) {
        self.script.lock().unwrap().engines_closed += 1;
    }
}

pub struct ScriptedChannel {
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl Channel for ScriptedChannel {
    async fn send_text(&self, text: String) -> Result<(), EngineError> {
        self.script.lock().unwrap().sent.push(text);
        Ok(())
    }

    async fn close(&self) {
        self.script.lock().unwrap().channels_closed += 1;
    }
}

pub fn offer() -> SessionDescriptor {
    SessionDescriptor::new(DescriptorKind::Offer, OFFER_SDP)
}

pub fn answer() -> SessionDescriptor {
    SessionDescriptor::new(DescriptorKind::Answer, ANSWER_SDP)
}

pub fn json(desc: &SessionDescriptor) -> String {
    serde_json::to_string(desc).unwrap()
}

pub fn gathered(desc: SessionDescriptor) -> EngineEvent {
    EngineEvent::GatheringStateChanged {
        state: GatheringState::Complete,
        local_description: Some(desc),
    }
}

pub fn gathering(desc: Option<SessionDescriptor>) -> EngineEvent {
    EngineEvent::GatheringStateChanged {
        state: GatheringState::Gathering,
        local_description: desc,
    }
}

pub fn phase(phase: RawPhase) -> EngineEvent {
    EngineEvent::ConnectionPhaseChanged(phase)
}
