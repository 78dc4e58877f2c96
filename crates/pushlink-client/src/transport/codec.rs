//! Frame codecs for the two transport modes
//!
//! The primary mode frames every message as a self-describing
//! `{type, data, requestId}` object. The fallback mode multiplexes named
//! events: outbound messages become `{event, data, requestId}` frames and a
//! subscribe frame listing the application event names is sent right after
//! the connection opens.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use pushlink_core::{TransportError, WireMessage};

use super::{TransportEvent, APPLICATION_EVENTS};

// ----------------------------------------------------------------------------
// Codec Trait
// ----------------------------------------------------------------------------

/// Encodes outbound messages and decodes inbound text frames
pub trait FrameCodec: Send + Sync {
    /// Encode a message into a text frame
    fn encode(&self, message: &WireMessage) -> Result<String, TransportError>;

    /// Decode a text frame into a transport event; None drops the frame
    fn decode(&self, raw: &str) -> Option<TransportEvent>;

    /// Frames to transmit immediately after the connection opens
    fn on_open_frames(&self) -> Vec<String> {
        Vec::new()
    }
}

// ----------------------------------------------------------------------------
// Primary: Self-Describing Frames
// ----------------------------------------------------------------------------

/// Primary-mode codec: one generic message channel, type-tagged frames
#[derive(Debug, Default)]
pub struct SelfDescribingCodec;

impl FrameCodec for SelfDescribingCodec {
    fn encode(&self, message: &WireMessage) -> Result<String, TransportError> {
        serde_json::to_string(message).map_err(|e| TransportError::send_failed(e.to_string()))
    }

    fn decode(&self, raw: &str) -> Option<TransportEvent> {
        let message: WireMessage = match serde_json::from_str(raw) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return None;
            }
        };
        if message.is_pong() {
            return Some(TransportEvent::Pong);
        }
        Some(TransportEvent::Message {
            event: message.message_type,
            data: message.data,
        })
    }
}

// ----------------------------------------------------------------------------
// Fallback: Named-Event Frames
// ----------------------------------------------------------------------------

/// Wire shape of a fallback-mode frame
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamedEventFrame {
    event: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    request_id: Option<String>,
}

/// Fallback-mode codec: named-event multiplexing with subscribe-on-open
#[derive(Debug, Default)]
pub struct NamedEventCodec;

impl FrameCodec for NamedEventCodec {
    fn encode(&self, message: &WireMessage) -> Result<String, TransportError> {
        let frame = NamedEventFrame {
            event: message.message_type.clone(),
            data: message.data.clone(),
            request_id: message.request_id.clone(),
        };
        serde_json::to_string(&frame).map_err(|e| TransportError::send_failed(e.to_string()))
    }

    fn decode(&self, raw: &str) -> Option<TransportEvent> {
        let frame: NamedEventFrame = match serde_json::from_str(raw) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return None;
            }
        };
        if frame.event == pushlink_core::PONG_TYPE {
            return Some(TransportEvent::Pong);
        }
        Some(TransportEvent::Message {
            event: frame.event,
            data: frame.data,
        })
    }

    fn on_open_frames(&self) -> Vec<String> {
        let subscribe = serde_json::json!({
            "event": "subscribe",
            "data": { "events": APPLICATION_EVENTS },
        });
        vec![subscribe.to_string()]
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
