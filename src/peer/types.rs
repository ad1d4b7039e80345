use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a session description in the offer/answer exchange.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DescriptorKind::Offer => "offer",
            DescriptorKind::Pranswer => "pranswer",
            DescriptorKind::Answer => "answer",
            DescriptorKind::Rollback => "rollback",
        };
        f.write_str(s)
    }
}

/// "How to reach me": the engine's session description, exchanged out-of-band.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    #[serde(rename = "type")]
    pub kind: DescriptorKind,
    pub sdp: String,
}

impl SessionDescriptor {
    pub fn new(kind: DescriptorKind, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            sdp: sdp.into(),
        }
    }
}

/// Connection phase as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawPhase {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
    /// Anything the engine reports that has no name here.
    Unknown,
}

impl RawPhase {
    /// Phases with no way back in this design.
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            RawPhase::New | RawPhase::Connecting | RawPhase::Connected
        )
    }
}

/// ICE candidate gathering progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringState {
    New,
    Gathering,
    Complete,
}

impl GatheringState {
    pub fn is_complete(self) -> bool {
        self == GatheringState::Complete
    }
}

/// Result of asking the engine for a fresh local description.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSnapshot {
    pub gathering: GatheringState,
    pub descriptor: Option<SessionDescriptor>,
}

/// The finite set of engine notifications the orchestrator consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Gathering state changed; carries the engine's self-description at that moment.
    GatheringStateChanged {
        state: GatheringState,
        local_description: Option<SessionDescriptor>,
    },
    ConnectionPhaseChanged(RawPhase),
    ChannelOpened,
    ChannelClosed,
    ChannelMessage(String),
}
