//! Error types for the pushlink client
//!
//! This module contains the error taxonomy used throughout pushlink: transport
//! errors, state transition errors, and the main PushlinkError type that
//! unifies them all.

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Errors reported by a concrete transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Transport construction or bootstrap failed before a connection existed
    #[error("Transport setup failed: {reason}")]
    Setup { reason: String },
    /// The transport reported a failure after the connection was established
    #[error("Transport runtime error: {reason}")]
    Runtime { reason: String },
    /// A send was attempted while the transport was not ready
    #[error("Transport not ready")]
    NotReady,
    /// The transport accepted the send but reported a delivery failure
    #[error("Send failed: {reason}")]
    SendFailed { reason: String },
}

impl TransportError {
    /// Create a setup error with a reason
    pub fn setup<T: Into<String>>(reason: T) -> Self {
        TransportError::Setup {
            reason: reason.into(),
        }
    }

    /// Create a runtime error with a reason
    pub fn runtime<T: Into<String>>(reason: T) -> Self {
        TransportError::Runtime {
            reason: reason.into(),
        }
    }

    /// Create a send failure with a reason
    pub fn send_failed<T: Into<String>>(reason: T) -> Self {
        TransportError::SendFailed {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Core Error Type
// ----------------------------------------------------------------------------

/// Core error type for the pushlink client
#[derive(Debug, thiserror::Error)]
pub enum PushlinkError {
    /// Configuration error (missing or malformed server URL, invalid policy)
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid state transition: {0}")]
    StateTransition(#[from] crate::state::StateTransitionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal channel to the manager task is gone (task stopped)
    #[error("Channel error: {message}")]
    Channel { message: String },
}

impl PushlinkError {
    /// Create a configuration error with a reason
    pub fn config<T: Into<String>>(reason: T) -> Self {
        PushlinkError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a channel error with a message
    pub fn channel<T: Into<String>>(message: T) -> Self {
        PushlinkError::Channel {
            message: message.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, PushlinkError>;
