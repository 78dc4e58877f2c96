//! Connection state machine
//!
//! Provides the single connection lifecycle state owned by the manager task.
//! Transitions are guarded: an event that is not valid for the current state
//! yields a StateTransitionError instead of silently corrupting the state.

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Lifecycle state of the managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Never connected, no attempt in flight
    Idle,
    /// A connect attempt has been initiated, waiting for the transport
    Connecting,
    /// Transport reported open, messages flow
    Open,
    /// User-initiated teardown in progress
    Closing,
    /// Not connected; either a transient drop or a terminal close
    Closed,
}

/// Events that drive state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// A connect attempt starts (initial connect or reconnect)
    ConnectStarted,
    /// The transport signalled open
    TransportOpened,
    /// The transport signalled close or a fatal error
    TransportLost,
    /// The user requested teardown
    CloseRequested,
    /// Teardown finished, the connection is terminally closed
    CloseCompleted,
}

/// Error returned for transitions the state machine does not permit
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid transition: {event:?} while {from}")]
pub struct StateTransitionError {
    pub from: &'static str,
    pub event: StateEvent,
}

impl ConnectionState {
    /// Get the state name for logging
    pub fn state_name(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Open => "Open",
            ConnectionState::Closing => "Closing",
            ConnectionState::Closed => "Closed",
        }
    }

    /// Whether the connection is open for immediate sends
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Whether a terminal close has been requested or completed
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closing | ConnectionState::Closed)
    }

    /// Apply an event, returning the next state
    ///
    /// `CloseRequested` is accepted from every state. `TransportOpened` is
    /// only valid while Connecting; the manager drops late open signals from
    /// replaced transports before they reach this point, so hitting the
    /// error arm indicates a bug in the caller.
    pub fn transition(self, event: StateEvent) -> Result<ConnectionState, StateTransitionError> {
        use ConnectionState::*;
        use StateEvent::*;

        let next = match (self, event) {
            // User close is accepted everywhere; states with a live or pending
            // transport pass through Closing while teardown runs.
            (Open, CloseRequested) | (Connecting, CloseRequested) => Closing,
            (Idle, CloseRequested) | (Closed, CloseRequested) | (Closing, CloseRequested) => Closed,
            (Closing, CloseCompleted) | (Closed, CloseCompleted) => Closed,
            (Idle, ConnectStarted) | (Closed, ConnectStarted) => Connecting,
            // Re-entering connect while already connecting restarts the attempt
            (Connecting, ConnectStarted) => Connecting,
            (Connecting, TransportOpened) => Open,
            (Open, TransportLost) | (Connecting, TransportLost) => Closed,
            // A close/error racing a user close is already handled
            (Closing, TransportLost) | (Closed, TransportLost) => self,
            (from, event) => {
                return Err(StateTransitionError {
                    from: from.state_name(),
                    event,
                })
            }
        };
        Ok(next)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
