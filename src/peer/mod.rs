pub mod connection;
pub mod data_channel;
pub mod descriptor;
pub mod engine;
pub mod ice;
pub mod message;
pub mod registry;
pub mod state;
pub mod types;

pub use engine::{Channel, Detach, Engine, EngineFactory, EngineParts, EventSink, SessionEvent};
pub use message::MessageEnvelope;
pub use registry::{HandlerRegistry, Registration};
pub use state::ConnectionState;
pub use types::{
    DescriptorKind, EngineEvent, GatheringState, LocalSnapshot, RawPhase, SessionDescriptor,
};
