//! Tokio-facing client for the pushlink protocol
//!
//! Wires the transport-independent core (state machine, queue, event bus,
//! config) to real WebSocket transports and runs the connection lifecycle on
//! a single manager task: connect, heartbeat, queued-send replay, and
//! automatic reconnection.

pub mod heartbeat;
pub mod manager;
pub mod reconnect;
pub mod transport;

pub use manager::{ClientStatus, PushClient, EVENT_CONNECTED, EVENT_DISCONNECTED, EVENT_ERROR};
pub use transport::{
    Transport, TransportEvent, TransportFactory, TransportMode, WsTransportFactory,
    APPLICATION_EVENTS,
};

// Re-export the core so downstream users need only one dependency.
pub use pushlink_core as core;
pub use pushlink_core::{
    ClientConfig, ConnectionState, PushlinkError, ReconnectPolicy, Result, SubscriptionId,
    WireMessage,
};
