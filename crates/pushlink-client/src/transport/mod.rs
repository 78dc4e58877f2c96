//! Transport abstraction for the pushlink client
//!
//! Provides a uniform interface over the two concrete transports (primary
//! low-level socket, fallback named-event messaging) so the connection
//! manager depends only on the interface, never on variant-specific
//! behavior.

mod codec;
mod socket;

pub use codec::{FrameCodec, NamedEventCodec, SelfDescribingCodec};
pub use socket::SocketTransport;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use pushlink_core::{TransportError, WireMessage};

/// Application event names the fallback transport subscribes at connect time
pub const APPLICATION_EVENTS: [&str; 5] = [
    "task_created",
    "task_updated",
    "task_deleted",
    "sync_completed",
    "sync_notification",
];

// ----------------------------------------------------------------------------
// Transport Mode
// ----------------------------------------------------------------------------

/// Which concrete transport a connect attempt uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransportMode {
    /// Low-level socket with self-describing message framing
    Primary,
    /// Higher-level messaging protocol with named-event multiplexing
    Fallback,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Primary => "primary",
            TransportMode::Fallback => "fallback",
        }
    }
}

// ----------------------------------------------------------------------------
// Transport Events
// ----------------------------------------------------------------------------

/// Lifecycle and message events a transport reports to the manager
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is established and ready for traffic
    Opened,
    /// A decoded application message; `event` becomes the bus event name
    Message { event: String, data: Value },
    /// Heartbeat acknowledgment; consumed by the manager, never forwarded
    Pong,
    /// The connection closed
    Closed,
    /// The transport failed, before or after open
    Error { reason: String },
}

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Uniform interface over the concrete transports
///
/// `connect` initiates the connection and returns without waiting for it to
/// open; completion is observed through `TransportEvent`s on the channel the
/// transport was created with.
#[async_trait]
pub trait Transport: Send {
    /// Begin connecting to the given URL
    async fn connect(&mut self, url: &str) -> Result<(), TransportError>;

    /// Hand a message to the transport for transmission
    async fn send(&mut self, message: &WireMessage) -> Result<(), TransportError>;

    /// Tear the connection down and release resources
    async fn close(&mut self);

    /// Whether the transport can accept a send right now
    fn is_ready(&self) -> bool;

    /// Which mode this transport implements
    fn mode(&self) -> TransportMode;
}

// ----------------------------------------------------------------------------
// Transport Factory
// ----------------------------------------------------------------------------

/// Creates a transport for a connect attempt
///
/// The factory is the seam for injecting mock transports in tests and for the
/// fallback bootstrap failure path: returning an error for `Fallback` makes
/// the manager downgrade to `Primary` for the rest of the process lifetime.
pub trait TransportFactory: Send + Sync {
    fn create(
        &self,
        mode: TransportMode,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn Transport>, TransportError>;
}

/// Default factory producing WebSocket-backed transports for both modes
#[derive(Debug, Default)]
pub struct WsTransportFactory;

impl TransportFactory for WsTransportFactory {
    fn create(
        &self,
        mode: TransportMode,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn Transport>, TransportError> {
        let transport = match mode {
            TransportMode::Primary => {
                SocketTransport::new(mode, Box::new(SelfDescribingCodec), events)
            }
            TransportMode::Fallback => {
                SocketTransport::new(mode, Box::new(NamedEventCodec), events)
            }
        };
        Ok(Box::new(transport))
    }
}
