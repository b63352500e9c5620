//! Pub/Sub Client Core
//!
//! Contexts that run one publish/subscribe transaction at a time against a pub/sub HTTP
//! service, and a scheduler that keeps presence alive for subscribed contexts by sending
//! periodic heartbeats from dedicated heartbeat contexts.

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod heartbeat;
pub mod logging;
pub mod reactor;
pub mod request;
pub mod response;
pub mod transport;
pub mod types;

pub use config::{ClientConfig, ConfigLoader};
pub use context::{
    ChannelRegistry, Context, ContextOptions, ContextSettings, DriveMode, Phase,
    TransactionCallback,
};
pub use error::{ConfigError, ContextError, HeartbeatError, TransportError};
pub use heartbeat::{HeartbeatConfig, HeartbeatScheduler};
pub use reactor::Reactor;
pub use request::{PublishOptions, SubscribeV2Options, TransactionParams};
pub use response::V2Message;
pub use types::{ActionType, TransactionKind, TransactionResult};
