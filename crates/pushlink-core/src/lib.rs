//! Core types for the pushlink persistent-connection client
//!
//! This crate holds the transport-independent building blocks: the connection
//! state machine, the outbound FIFO queue, the event bus, the wire message
//! types, configuration, and the error taxonomy. The tokio-facing connection
//! manager and the concrete transports live in `pushlink-client`.

pub mod bus;
pub mod config;
pub mod error;
pub mod message;
pub mod queue;
pub mod state;

pub use bus::{EventBus, EventCallback, SubscriptionId};
pub use config::{ClientConfig, ReconnectPolicy};
pub use error::{PushlinkError, Result, TransportError};
pub use message::{PendingMessage, WireMessage, PING_TYPE, PONG_TYPE};
pub use queue::{OutboundQueue, QueueStats};
pub use state::{ConnectionState, StateEvent, StateTransitionError};
