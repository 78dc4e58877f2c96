//! Outbound message queue
//!
//! FIFO buffer for messages that could not be transmitted immediately. The
//! manager drains it right after a successful open; a failed send goes back
//! to the front so arrival order survives partial drains.

use std::collections::VecDeque;

use tracing::warn;

use crate::message::PendingMessage;

// ----------------------------------------------------------------------------
// Outbound Queue
// ----------------------------------------------------------------------------

/// FIFO buffer of messages awaiting an open connection
#[derive(Debug, Default)]
pub struct OutboundQueue {
    messages: VecDeque<PendingMessage>,
    /// Optional bound; oldest entries are evicted when exceeded
    max_len: Option<usize>,
    stats: QueueStats,
}

/// Counters for queue activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Messages appended to the queue
    pub enqueued: u64,
    /// Messages handed back out for transmission
    pub replayed: u64,
    /// Messages evicted because the queue bound was exceeded
    pub dropped: u64,
}

impl OutboundQueue {
    /// Create an unbounded queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue that evicts its oldest entry beyond `max_len`
    pub fn bounded(max_len: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_len: Some(max_len),
            stats: QueueStats::default(),
        }
    }

    /// Append a message, evicting the oldest entry if the bound is hit
    pub fn enqueue(&mut self, message: PendingMessage) {
        if let Some(max) = self.max_len {
            while self.messages.len() >= max {
                let evicted = self.messages.pop_front();
                self.stats.dropped += 1;
                if let Some(evicted) = evicted {
                    warn!(
                        message_type = %evicted.message.message_type,
                        "outbound queue full, dropping oldest message"
                    );
                }
            }
        }
        self.messages.push_back(message);
        self.stats.enqueued += 1;
    }

    /// Take the oldest message for transmission
    pub fn pop_front(&mut self) -> Option<PendingMessage> {
        let message = self.messages.pop_front();
        if message.is_some() {
            self.stats.replayed += 1;
        }
        message
    }

    /// Put a message back at the front after a failed send, preserving order
    pub fn requeue_front(&mut self, message: PendingMessage) {
        self.stats.replayed = self.stats.replayed.saturating_sub(1);
        self.messages.push_front(message);
    }

    /// Drop every queued message
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
