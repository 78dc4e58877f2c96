//! Connection lifecycle manager
//!
//! The manager is a single tokio task that owns the connection state, the
//! outbound queue, the event bus, and both timers. Public method calls and
//! transport callbacks reach it only as channel messages, so everything runs
//! on one logical thread of control and no locking is needed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use pushlink_core::{
    ClientConfig, ConnectionState, EventBus, EventCallback, OutboundQueue, PendingMessage,
    PushlinkError, QueueStats, Result, StateEvent, SubscriptionId, WireMessage,
};

use crate::heartbeat::HeartbeatMonitor;
use crate::reconnect::ReconnectSupervisor;
use crate::transport::{
    Transport, TransportEvent, TransportFactory, TransportMode, WsTransportFactory,
};

/// Event emitted when the connection opens
pub const EVENT_CONNECTED: &str = "connected";
/// Event emitted when the connection closes
pub const EVENT_DISCONNECTED: &str = "disconnected";
/// Event emitted on transport errors
pub const EVENT_ERROR: &str = "error";

// ----------------------------------------------------------------------------
// Commands and Status
// ----------------------------------------------------------------------------

/// Messages from the public handle to the manager task
enum Command {
    Send(WireMessage),
    Subscribe {
        event: String,
        id: SubscriptionId,
        callback: EventCallback,
    },
    Unsubscribe {
        event: String,
        id: Option<SubscriptionId>,
    },
    Close,
    Status(oneshot::Sender<ClientStatus>),
}

/// Snapshot of the manager's observable state
#[derive(Debug, Clone)]
pub struct ClientStatus {
    pub state: ConnectionState,
    pub transport_mode: Option<TransportMode>,
    pub queued: usize,
    pub queue_stats: QueueStats,
    pub heartbeat_running: bool,
    pub reconnect_scheduled: bool,
    pub reconnect_attempts: u32,
}

// ----------------------------------------------------------------------------
// Public Handle
// ----------------------------------------------------------------------------

/// Handle to a running connection manager
///
/// Cheap to clone; every clone talks to the same manager task. Dropping the
/// last handle tears the connection down.
#[derive(Clone, Debug)]
pub struct PushClient {
    commands: mpsc::UnboundedSender<Command>,
    next_subscription: Arc<AtomicU64>,
}

impl PushClient {
    /// Validate the configuration, spawn the manager task, and initiate the
    /// first connect attempt
    pub fn init(config: ClientConfig, factory: Arc<dyn TransportFactory>) -> Result<Self> {
        config.validate()?;
        let dial_url = config.dial_url()?;
        let (commands, command_rx) = mpsc::unbounded_channel();
        let task = ClientTask::new(config, dial_url, factory, command_rx);
        tokio::spawn(task.run());
        Ok(Self {
            commands,
            next_subscription: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Initialize with the default WebSocket transport factory
    pub fn init_websocket(config: ClientConfig) -> Result<Self> {
        Self::init(config, Arc::new(WsTransportFactory))
    }

    /// Send a message, or queue it if the connection is not ready
    ///
    /// Fire-and-forget: failures surface only through `error`/`disconnected`
    /// events, never as a return value.
    pub fn send<T: Into<String>>(
        &self,
        message_type: T,
        payload: Value,
        correlation_id: Option<String>,
    ) {
        let message = WireMessage::new(message_type, payload, correlation_id);
        let _ = self.commands.send(Command::Send(message));
    }

    /// Subscribe a callback to an event name
    pub fn on<T, F>(&self, event: T, callback: F) -> SubscriptionId
    where
        T: Into<String>,
        F: Fn(&Value) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let _ = self.commands.send(Command::Subscribe {
            event: event.into(),
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Remove one subscription, or every subscription for the event when no
    /// handle is given
    pub fn off(&self, event: &str, id: Option<SubscriptionId>) {
        let _ = self.commands.send(Command::Unsubscribe {
            event: event.to_string(),
            id,
        });
    }

    /// Tear the connection down
    ///
    /// Terminal: pending queued messages are dropped and later sends are
    /// queued but never flushed. Subscriptions keep working.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    /// Fetch a snapshot of the manager's observable state
    pub async fn status(&self) -> Result<ClientStatus> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Status(tx))
            .map_err(|_| PushlinkError::channel("manager task stopped"))?;
        rx.await
            .map_err(|_| PushlinkError::channel("manager task stopped"))
    }
}

// ----------------------------------------------------------------------------
// Manager Task
// ----------------------------------------------------------------------------

/// The connection manager actor
struct ClientTask {
    config: ClientConfig,
    dial_url: String,
    factory: Arc<dyn TransportFactory>,
    commands: mpsc::UnboundedReceiver<Command>,

    state: ConnectionState,
    transport: Option<Box<dyn Transport>>,
    /// Receiver for the current transport only; replaced on every connect so
    /// callbacks from a replaced transport have no reader (stale guard)
    transport_events: Option<mpsc::UnboundedReceiver<TransportEvent>>,

    queue: OutboundQueue,
    bus: EventBus,
    heartbeat: HeartbeatMonitor,
    reconnect: ReconnectSupervisor,

    /// Set after a fallback bootstrap failure; one-way downgrade to Primary
    fallback_unavailable: bool,
}

impl ClientTask {
    fn new(
        config: ClientConfig,
        dial_url: String,
        factory: Arc<dyn TransportFactory>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let queue = match config.max_queue_len {
            Some(max) => OutboundQueue::bounded(max),
            None => OutboundQueue::new(),
        };
        let heartbeat = HeartbeatMonitor::new(config.heartbeat_interval);
        let reconnect = ReconnectSupervisor::new(config.reconnect.clone());
        Self {
            config,
            dial_url,
            factory,
            commands,
            state: ConnectionState::Idle,
            transport: None,
            transport_events: None,
            queue,
            bus: EventBus::new(),
            heartbeat,
            reconnect,
            fallback_unavailable: false,
        }
    }

    async fn run(mut self) {
        self.connect().await;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        // Every handle is gone; tear down and stop
                        self.teardown().await;
                        break;
                    }
                },
                event = Self::next_event(&mut self.transport_events) => match event {
                    Some(event) => self.handle_transport_event(event).await,
                    None => {
                        // Transport dropped its sender without a final event
                        self.transport_events = None;
                    }
                },
                _ = self.heartbeat.tick() => self.send_heartbeat().await,
                _ = self.reconnect.fired() => self.handle_retry().await,
            }
        }
    }

    /// Receive from the current transport, pending forever when there is none
    async fn next_event(
        events: &mut Option<mpsc::UnboundedReceiver<TransportEvent>>,
    ) -> Option<TransportEvent> {
        match events {
            Some(receiver) => receiver.recv().await,
            None => futures::future::pending().await,
        }
    }

    // ------------------------------------------------------------------
    // Command handling
    // ------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send(message) => self.try_send(message).await,
            Command::Subscribe {
                event,
                id,
                callback,
            } => self.bus.on_with_id(event, id, callback),
            Command::Unsubscribe { event, id } => self.bus.off(&event, id),
            Command::Close => self.teardown().await,
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn status(&self) -> ClientStatus {
        ClientStatus {
            state: self.state,
            transport_mode: self.transport.as_ref().map(|t| t.mode()),
            queued: self.queue.len(),
            queue_stats: self.queue.stats(),
            heartbeat_running: self.heartbeat.is_running(),
            reconnect_scheduled: self.reconnect.is_scheduled(),
            reconnect_attempts: self.reconnect.attempts(),
        }
    }

    /// Transmit now if open and ready, otherwise queue; a reported send
    /// failure also queues the message for replay
    async fn try_send(&mut self, message: WireMessage) {
        if self.state.is_open() {
            if let Some(transport) = self.transport.as_mut() {
                if transport.is_ready() {
                    match transport.send(&message).await {
                        Ok(()) => return,
                        Err(e) => {
                            warn!(
                                error = %e,
                                message_type = %message.message_type,
                                "send failed, queueing message for replay"
                            );
                            self.queue.enqueue(PendingMessage::new(message));
                            return;
                        }
                    }
                }
            }
        }
        debug!(message_type = %message.message_type, "connection not ready, queueing message");
        self.queue.enqueue(PendingMessage::new(message));
    }

    // ------------------------------------------------------------------
    // Connect / disconnect
    // ------------------------------------------------------------------

    async fn connect(&mut self) {
        // At most one live transport: close the old one before dialing
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.transport_events = None;

        if !self.apply(StateEvent::ConnectStarted) {
            return;
        }
        info!(url = %self.dial_url, "connecting");

        let Some((mut transport, events)) = self.create_transport() else {
            self.apply(StateEvent::TransportLost);
            self.schedule_reconnect();
            return;
        };

        match transport.connect(&self.dial_url).await {
            Ok(()) => {
                self.transport = Some(transport);
                self.transport_events = Some(events);
            }
            Err(e) => {
                warn!(error = %e, "transport setup failed");
                self.apply(StateEvent::TransportLost);
                self.schedule_reconnect();
            }
        }
    }

    /// Create a transport for the selected mode, downgrading to Primary for
    /// the rest of the process lifetime when fallback bootstrap fails
    fn create_transport(
        &mut self,
    ) -> Option<(
        Box<dyn Transport>,
        mpsc::UnboundedReceiver<TransportEvent>,
    )> {
        let mode = if self.config.prefer_fallback && !self.fallback_unavailable {
            TransportMode::Fallback
        } else {
            TransportMode::Primary
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        match self.factory.create(mode, events_tx) {
            Ok(transport) => Some((transport, events_rx)),
            Err(e) if mode == TransportMode::Fallback => {
                warn!(error = %e, "fallback transport unavailable, downgrading to primary");
                self.fallback_unavailable = true;
                let (events_tx, events_rx) = mpsc::unbounded_channel();
                match self.factory.create(TransportMode::Primary, events_tx) {
                    Ok(transport) => Some((transport, events_rx)),
                    Err(e) => {
                        warn!(error = %e, "primary transport creation failed");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "transport creation failed");
                None
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                if !self.apply(StateEvent::TransportOpened) {
                    return;
                }
                info!("connection open");
                self.reconnect.reset();
                self.heartbeat.start();
                let mode = self.transport.as_ref().map(|t| t.mode().as_str());
                self.bus.emit(EVENT_CONNECTED, &json!({ "transport": mode }));
                self.drain_queue().await;
            }
            TransportEvent::Message { event, data } => self.bus.emit(&event, &data),
            TransportEvent::Pong => debug!("heartbeat acknowledged"),
            TransportEvent::Closed => {
                debug!("transport closed");
                self.bus
                    .emit(EVENT_DISCONNECTED, &json!({ "message": "connection closed" }));
                self.handle_connection_lost();
            }
            TransportEvent::Error { reason } => {
                warn!(%reason, "transport error");
                self.bus.emit(EVENT_ERROR, &json!({ "error": reason }));
                self.handle_connection_lost();
            }
        }
    }

    fn handle_connection_lost(&mut self) {
        self.apply(StateEvent::TransportLost);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        self.heartbeat.stop();
        self.reconnect.schedule();
    }

    /// Flush the queue strictly in arrival order while the connection stays
    /// open; a failed send goes back to the front and stops the drain
    async fn drain_queue(&mut self) {
        while self.state.is_open() {
            let Some(pending) = self.queue.pop_front() else {
                break;
            };
            let Some(transport) = self.transport.as_mut() else {
                self.queue.requeue_front(pending);
                break;
            };
            if let Err(e) = transport.send(&pending.message).await {
                warn!(
                    error = %e,
                    message_type = %pending.message.message_type,
                    "drain interrupted, message stays queued"
                );
                self.queue.requeue_front(pending);
                break;
            }
        }
    }

    async fn send_heartbeat(&mut self) {
        // The monitor runs only while Open, but the probe still takes the
        // regular send path so a racing disconnect queues it harmlessly.
        self.try_send(WireMessage::ping()).await;
    }

    async fn handle_retry(&mut self) {
        if self.state.is_open() {
            return;
        }
        info!(attempt = self.reconnect.attempts(), "reconnect timer fired");
        self.connect().await;
    }

    /// User-initiated terminal teardown
    async fn teardown(&mut self) {
        info!("closing connection");
        self.heartbeat.stop();
        self.reconnect.cancel();
        self.apply(StateEvent::CloseRequested);
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.transport_events = None;
        self.queue.clear();
        if self.state == ConnectionState::Closing {
            self.apply(StateEvent::CloseCompleted);
        }
    }

    /// Apply a state machine event; invalid transitions are logged, not fatal
    fn apply(&mut self, event: StateEvent) -> bool {
        match self.state.transition(event) {
            Ok(next) => {
                if next != self.state {
                    debug!(
                        from = self.state.state_name(),
                        to = next.state_name(),
                        "connection state changed"
                    );
                }
                self.state = next;
                true
            }
            Err(e) => {
                warn!(error = %e, "ignoring invalid state transition");
                false
            }
        }
    }
}
