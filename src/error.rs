use thiserror::Error;

/// Errors returned to the caller of [`crate::ServerlessPeer`].
#[derive(Debug, Error)]
pub enum PeerError {
    /// No session (and therefore no engine) exists yet.
    #[error("peer connection is not ready")]
    NotReady,

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The engine failed to construct or negotiate. The session is now disconnected.
    #[error("engine failure: {0}")]
    EngineFatal(String),
}

/// Inbound data channel payload that could not be turned into an envelope.
/// Never surfaced past the dispatch boundary.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message has no string `type` field")]
    MissingType,
}

/// Errors reported by a transport engine implementation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine setup failed: {0}")]
    Setup(String),

    /// The engine refused a remote descriptor (bad SDP, wrong signaling state).
    #[error("descriptor rejected: {0}")]
    Rejected(String),

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("data channel error: {0}")]
    Channel(String),
}

impl From<EngineError> for PeerError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Rejected(reason) => PeerError::InvalidDescriptor(reason),
            other => PeerError::EngineFatal(other.to_string()),
        }
    }
}

impl From<webrtc::Error> for EngineError {
    fn from(err: webrtc::Error) -> Self {
        EngineError::Negotiation(err.to_string())
    }
}
