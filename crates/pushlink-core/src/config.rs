//! Client configuration
//!
//! Consolidates the tunables of the connection manager: server URL, heartbeat
//! period, reconnect policy, transport preference, and the optional outbound
//! queue bound.

use core::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PushlinkError, Result};

// ----------------------------------------------------------------------------
// Reconnect Policy
// ----------------------------------------------------------------------------

/// Retry schedule used after a disconnect or failed connect attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReconnectPolicy {
    /// Retry at a fixed interval, indefinitely
    Fixed(Duration),
    /// Exponential backoff with full jitter, capped at `max`
    Backoff {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed(Duration::from_secs(5))
    }
}

impl ReconnectPolicy {
    /// Compute the delay before retry number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            ReconnectPolicy::Fixed(interval) => *interval,
            ReconnectPolicy::Backoff {
                initial,
                max,
                multiplier,
            } => {
                let raw = initial.as_secs_f64() * multiplier.powi(attempt as i32);
                let capped = raw.min(max.as_secs_f64());
                // Full jitter: uniform in [0, capped]
                let jittered = rand::thread_rng().gen_range(0.0..=capped);
                Duration::from_secs_f64(jittered)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Client Configuration
// ----------------------------------------------------------------------------

/// Configuration for a pushlink client instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server URL; `http`/`https` schemes are rewritten to `ws`/`wss`
    pub server_url: String,
    /// Heartbeat probe period while the connection is open
    pub heartbeat_interval: Duration,
    /// Retry schedule after disconnects
    pub reconnect: ReconnectPolicy,
    /// Capability flag decided by the host: prefer the fallback messaging
    /// transport over the primary socket transport
    pub prefer_fallback: bool,
    /// Optional bound on the outbound queue; oldest messages are evicted
    /// when full. None keeps the queue unbounded.
    pub max_queue_len: Option<usize>,
}

impl ClientConfig {
    /// Create a configuration with default tunables for the given URL
    pub fn new<T: Into<String>>(server_url: T) -> Self {
        Self {
            server_url: server_url.into(),
            heartbeat_interval: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
            prefer_fallback: false,
            max_queue_len: None,
        }
    }

    /// Create a configuration with fast timers for tests
    pub fn testing<T: Into<String>>(server_url: T) -> Self {
        Self {
            server_url: server_url.into(),
            heartbeat_interval: Duration::from_millis(100),
            reconnect: ReconnectPolicy::Fixed(Duration::from_millis(50)),
            prefer_fallback: false,
            max_queue_len: None,
        }
    }

    /// Prefer the fallback messaging transport
    pub fn with_fallback(mut self) -> Self {
        self.prefer_fallback = true;
        self
    }

    /// Set the reconnect policy
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Bound the outbound queue
    pub fn with_max_queue_len(mut self, len: usize) -> Self {
        self.max_queue_len = Some(len);
        self
    }

    /// Validate the configuration for consistency and feasibility
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(PushlinkError::config("server URL must not be empty"));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(PushlinkError::config(
                "heartbeat interval must be greater than zero",
            ));
        }
        match &self.reconnect {
            ReconnectPolicy::Fixed(interval) if interval.is_zero() => {
                return Err(PushlinkError::config(
                    "reconnect interval must be greater than zero",
                ));
            }
            ReconnectPolicy::Backoff {
                initial,
                max,
                multiplier,
            } => {
                if initial.is_zero() || initial > max {
                    return Err(PushlinkError::config(
                        "backoff initial delay must be nonzero and not exceed max",
                    ));
                }
                if *multiplier <= 1.0 {
                    return Err(PushlinkError::config(
                        "backoff multiplier must be greater than 1.0",
                    ));
                }
            }
            _ => {}
        }
        if self.max_queue_len == Some(0) {
            return Err(PushlinkError::config("queue bound cannot be zero"));
        }
        Ok(())
    }

    /// Resolve the dial URL, rewriting HTTP schemes to their WebSocket
    /// equivalents
    pub fn dial_url(&self) -> Result<String> {
        let mut parsed = Url::parse(self.server_url.trim())
            .map_err(|e| PushlinkError::config(format!("invalid server URL: {}", e)))?;
        let scheme = match parsed.scheme() {
            "http" => Some("ws"),
            "https" => Some("wss"),
            "ws" | "wss" => None,
            other => {
                return Err(PushlinkError::config(format!(
                    "unsupported URL scheme: {}",
                    other
                )))
            }
        };
        if let Some(scheme) = scheme {
            // set_scheme rejects ws/wss on some url versions for special
            // schemes, so rebuild from the string form instead
            let rebuilt = format!(
                "{}{}",
                scheme,
                &self.server_url.trim()[parsed.scheme().len()..]
            );
            parsed = Url::parse(&rebuilt)
                .map_err(|e| PushlinkError::config(format!("invalid server URL: {}", e)))?;
        }
        Ok(parsed.to_string())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
