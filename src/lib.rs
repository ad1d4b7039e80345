//! Serverless WebRTC: two peers connect by swapping descriptor blobs
//! out-of-band (copy/paste, QR code, chat) and then talk over a single
//! pre-negotiated data channel carrying typed `{type, data}` messages.

pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod peer;
pub mod session;
pub mod utils;
pub mod webrtc_peer;

pub use config::{DescriptorFormat, ServerConfig, SessionConfig};
pub use error::{DecodeError, EngineError, PeerError};
pub use peer::connection::WebRtcEngineFactory;
pub use peer::{ConnectionState, HandlerRegistry, MessageEnvelope, Registration};
pub use webrtc_peer::{PeerStatus, ServerlessPeer};

/// Start the terminal chat demo.
pub async fn run(config: SessionConfig) -> anyhow::Result<()> {
    logger::init();
    commands::run(config).await
}
