//! Event bus
//!
//! Maps event names to ordered subscriber callbacks. Dispatch is synchronous
//! and in subscription order; a panicking subscriber is isolated and logged
//! so it can never block delivery to later subscribers or the emitter.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;
use tracing::{trace, warn};

// ----------------------------------------------------------------------------
// Subscriptions
// ----------------------------------------------------------------------------

/// Handle identifying a single registered callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Subscriber callback invoked with the event payload
pub type EventCallback = Box<dyn Fn(&Value) + Send>;

// ----------------------------------------------------------------------------
// Event Bus
// ----------------------------------------------------------------------------

/// Synchronous publish/subscribe registry keyed by event name
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<String, Vec<(SubscriptionId, EventCallback)>>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for an event name, returning its handle
    pub fn on<T: Into<String>>(&mut self, event: T, callback: EventCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(event.into())
            .or_default()
            .push((id, callback));
        id
    }

    /// Register a callback under a caller-allocated handle
    ///
    /// Used by the client handle, which hands out ids synchronously before
    /// the registration reaches the manager task.
    pub fn on_with_id<T: Into<String>>(
        &mut self,
        event: T,
        id: SubscriptionId,
        callback: EventCallback,
    ) {
        self.next_id = self.next_id.max(id.0 + 1);
        self.listeners
            .entry(event.into())
            .or_default()
            .push((id, callback));
    }

    /// Remove a single callback, or every callback for the event when no
    /// handle is given
    pub fn off(&mut self, event: &str, id: Option<SubscriptionId>) {
        match id {
            Some(id) => {
                if let Some(callbacks) = self.listeners.get_mut(event) {
                    callbacks.retain(|(cb_id, _)| *cb_id != id);
                    if callbacks.is_empty() {
                        self.listeners.remove(event);
                    }
                }
            }
            None => {
                self.listeners.remove(event);
            }
        }
    }

    /// Deliver a payload to every subscriber of the event, in subscription
    /// order
    pub fn emit(&self, event: &str, payload: &Value) {
        let Some(callbacks) = self.listeners.get(event) else {
            trace!(event, "no subscribers for event");
            return;
        };

        for (id, callback) in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
                warn!(event, subscription = id.0, "event subscriber panicked");
            }
        }
    }

    /// Number of callbacks registered for an event
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
