//! Wire and queue message types
//!
//! The primary transport frames every message as a self-describing JSON
//! object `{ "type": ..., "data": ..., "requestId": ... }`. Heartbeat frames
//! use the reserved `ping`/`pong` types and never reach subscribers.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved message type for heartbeat probes
pub const PING_TYPE: &str = "ping";
/// Reserved message type for heartbeat acknowledgments
pub const PONG_TYPE: &str = "pong";

// ----------------------------------------------------------------------------
// Wire Message
// ----------------------------------------------------------------------------

/// Frame exchanged with the server on the primary transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Message type; doubles as the event name on the subscriber side
    #[serde(rename = "type")]
    pub message_type: String,
    /// Opaque application payload
    #[serde(default)]
    pub data: Value,
    /// Optional caller-supplied correlation token, not interpreted here
    #[serde(default)]
    pub request_id: Option<String>,
}

impl WireMessage {
    /// Create a new wire message
    pub fn new<T: Into<String>>(message_type: T, data: Value, request_id: Option<String>) -> Self {
        Self {
            message_type: message_type.into(),
            data,
            request_id,
        }
    }

    /// Create a heartbeat probe frame
    pub fn ping() -> Self {
        Self::new(PING_TYPE, Value::Null, None)
    }

    /// Whether this frame is a heartbeat acknowledgment
    pub fn is_pong(&self) -> bool {
        self.message_type == PONG_TYPE
    }
}

// ----------------------------------------------------------------------------
// Pending Message
// ----------------------------------------------------------------------------

/// A message waiting in the outbound queue for the next open connection
#[derive(Debug, Clone)]
pub struct PendingMessage {
    pub message: WireMessage,
    /// When the message entered the queue
    pub enqueued_at: Instant,
}

impl PendingMessage {
    pub fn new(message: WireMessage) -> Self {
        Self {
            message,
            enqueued_at: Instant::now(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
