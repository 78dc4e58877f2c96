//! End-to-end tests for the connection manager
//!
//! A mock transport factory stands in for the WebSocket layer so every
//! lifecycle path (open, heartbeat, disconnect, replay, fallback downgrade,
//! terminal close) can be driven deterministically on a paused clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::advance;

use pushlink_client::core::TransportError;
use pushlink_client::{
    ClientConfig, ConnectionState, PushClient, PushlinkError, Transport, TransportEvent,
    TransportFactory, TransportMode, WireMessage, EVENT_CONNECTED, EVENT_DISCONNECTED,
    EVENT_ERROR,
};

// ----------------------------------------------------------------------------
// Mock Transport
// ----------------------------------------------------------------------------

/// State shared between a mock transport and the test body
struct MockShared {
    mode: TransportMode,
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: Mutex<Vec<WireMessage>>,
    ready: AtomicBool,
    fail_sends: AtomicBool,
    closed: AtomicBool,
}

impl MockShared {
    /// Report the connection as open
    fn open(&self) {
        self.ready.store(true, Ordering::SeqCst);
        self.events.send(TransportEvent::Opened).unwrap();
    }

    /// Report the connection as lost
    fn drop_connection(&self) {
        self.ready.store(false, Ordering::SeqCst);
        self.events.send(TransportEvent::Closed).unwrap();
    }

    /// Report a transport failure
    fn fail(&self, reason: &str) {
        self.ready.store(false, Ordering::SeqCst);
        self.events
            .send(TransportEvent::Error {
                reason: reason.to_string(),
            })
            .unwrap();
    }

    /// Deliver an inbound event as if decoded off the wire
    fn emit(&self, event: TransportEvent) {
        self.events.send(event).unwrap();
    }

    fn sent_types(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.message_type.clone())
            .collect()
    }
}

struct MockTransport {
    shared: Arc<MockShared>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, _url: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&mut self, message: &WireMessage) -> Result<(), TransportError> {
        if !self.shared.ready.load(Ordering::SeqCst) {
            return Err(TransportError::NotReady);
        }
        if self.shared.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::send_failed("mock send failure"));
        }
        self.shared.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn close(&mut self) {
        self.shared.ready.store(false, Ordering::SeqCst);
        self.shared.closed.store(true, Ordering::SeqCst);
    }

    fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst)
    }

    fn mode(&self) -> TransportMode {
        self.shared.mode
    }
}

#[derive(Default)]
struct MockFactory {
    /// Every requested mode, including attempts that failed
    attempts: Mutex<Vec<TransportMode>>,
    connections: Mutex<Vec<Arc<MockShared>>>,
    fail_fallback: AtomicBool,
    fail_all: AtomicBool,
}

impl MockFactory {
    fn attempts(&self) -> Vec<TransportMode> {
        self.attempts.lock().unwrap().clone()
    }

    fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    fn connection(&self, index: usize) -> Arc<MockShared> {
        Arc::clone(&self.connections.lock().unwrap()[index])
    }

    fn last(&self) -> Arc<MockShared> {
        Arc::clone(self.connections.lock().unwrap().last().unwrap())
    }
}

impl TransportFactory for MockFactory {
    fn create(
        &self,
        mode: TransportMode,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn Transport>, TransportError> {
        self.attempts.lock().unwrap().push(mode);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(TransportError::setup("mock transport unavailable"));
        }
        if mode == TransportMode::Fallback && self.fail_fallback.load(Ordering::SeqCst) {
            return Err(TransportError::setup("mock fallback unavailable"));
        }
        let shared = Arc::new(MockShared {
            mode,
            events,
            sent: Mutex::new(Vec::new()),
            ready: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });
        self.connections.lock().unwrap().push(Arc::clone(&shared));
        Ok(Box::new(MockTransport { shared }))
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn start(config: ClientConfig) -> (PushClient, Arc<MockFactory>) {
    let factory = Arc::new(MockFactory::default());
    let client =
        PushClient::init(config, Arc::clone(&factory) as Arc<dyn TransportFactory>).unwrap();
    (client, factory)
}

/// Let the manager task process everything already in its channels
async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

fn collect(client: &PushClient, event: &str) -> Arc<Mutex<Vec<Value>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.on(event, move |payload: &Value| {
        sink.lock().unwrap().push(payload.clone());
    });
    seen
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_init_rejects_bad_config() {
    let factory: Arc<dyn TransportFactory> = Arc::new(MockFactory::default());

    let err = PushClient::init(ClientConfig::new(""), Arc::clone(&factory)).unwrap_err();
    assert!(matches!(err, PushlinkError::Configuration { .. }));

    let err = PushClient::init(ClientConfig::new("ftp://push.example.com"), factory).unwrap_err();
    assert!(matches!(err, PushlinkError::Configuration { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_connect_flushes_queue_once() {
    let (client, factory) = start(ClientConfig::testing("http://localhost:5001/ws"));
    let connected = collect(&client, EVENT_CONNECTED);

    // Sent before the connection opens, so it must be queued
    client.send("hello", json!({"n": 1}), Some("r1".into()));
    settle().await;

    let status = client.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::Connecting);
    assert_eq!(status.queued, 1);

    factory.last().open();
    settle().await;

    assert_eq!(connected.lock().unwrap().len(), 1);
    assert_eq!(
        connected.lock().unwrap()[0],
        json!({"transport": "primary"})
    );

    let sent = factory.last().sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message_type, "hello");
    assert_eq!(sent[0].data, json!({"n": 1}));
    assert_eq!(sent[0].request_id.as_deref(), Some("r1"));

    let status = client.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::Open);
    assert_eq!(status.queued, 0);
    assert!(status.heartbeat_running);
    assert!(!status.reconnect_scheduled);
}

#[tokio::test(start_paused = true)]
async fn test_messages_dispatch_to_subscribers() {
    let (client, factory) = start(ClientConfig::testing("ws://localhost:5001/ws"));
    let seen = collect(&client, "task_created");
    settle().await;
    factory.last().open();
    settle().await;

    factory.last().emit(TransportEvent::Message {
        event: "task_created".into(),
        data: json!({"id": 7}),
    });
    settle().await;
    assert_eq!(*seen.lock().unwrap(), vec![json!({"id": 7})]);

    // Removing every subscriber for the event stops delivery
    client.off("task_created", None);
    settle().await;
    factory.last().emit(TransportEvent::Message {
        event: "task_created".into(),
        data: json!({"id": 8}),
    });
    settle().await;
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pong_never_reaches_subscribers() {
    let (client, factory) = start(ClientConfig::testing("ws://localhost:5001/ws"));
    let pongs = collect(&client, "pong");
    settle().await;
    factory.last().open();
    settle().await;

    factory.last().emit(TransportEvent::Pong);
    settle().await;
    assert!(pongs.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_pings_on_interval() {
    // testing() config probes every 100ms
    let (client, factory) = start(ClientConfig::testing("ws://localhost:5001/ws"));
    settle().await;
    factory.last().open();
    settle().await;

    advance(Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(factory.last().sent_types(), vec!["ping"]);

    advance(Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(factory.last().sent_types(), vec!["ping", "ping"]);

    let _ = client;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_emits_event_and_reconnects() {
    let (client, factory) = start(ClientConfig::testing("ws://localhost:5001/ws"));
    let connected = collect(&client, EVENT_CONNECTED);
    let disconnected = collect(&client, EVENT_DISCONNECTED);
    settle().await;
    factory.last().open();
    settle().await;

    factory.last().drop_connection();
    settle().await;

    assert_eq!(disconnected.lock().unwrap().len(), 1);
    let status = client.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::Closed);
    assert!(status.reconnect_scheduled);
    assert!(!status.heartbeat_running);

    // Only the retry timer may create a new connection
    settle().await;
    assert_eq!(factory.connection_count(), 1);

    advance(Duration::from_millis(50)).await;
    settle().await;
    assert_eq!(factory.connection_count(), 2);

    factory.last().open();
    settle().await;
    assert_eq!(connected.lock().unwrap().len(), 2);
    let status = client.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::Open);
    assert_eq!(status.reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_emits_and_retries() {
    let (client, factory) = start(ClientConfig::testing("ws://localhost:5001/ws"));
    let errors = collect(&client, EVENT_ERROR);
    settle().await;
    factory.last().open();
    settle().await;

    factory.last().fail("connection reset");
    settle().await;

    assert_eq!(
        *errors.lock().unwrap(),
        vec![json!({"error": "connection reset"})]
    );
    let status = client.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::Closed);
    assert!(status.reconnect_scheduled);
}

#[tokio::test(start_paused = true)]
async fn test_replay_preserves_order() {
    let (client, factory) = start(ClientConfig::testing("ws://localhost:5001/ws"));
    client.send("first", json!(1), None);
    client.send("second", json!(2), None);
    client.send("third", json!(3), None);
    settle().await;

    factory.last().open();
    settle().await;

    assert_eq!(
        factory.last().sent_types(),
        vec!["first", "second", "third"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_requeues_for_replay() {
    let (client, factory) = start(ClientConfig::testing("ws://localhost:5001/ws"));
    settle().await;
    factory.last().open();
    settle().await;

    factory.last().fail_sends.store(true, Ordering::SeqCst);
    client.send("important", json!({"k": true}), None);
    settle().await;

    assert!(factory.last().sent_types().is_empty());
    let status = client.status().await.unwrap();
    assert_eq!(status.queued, 1);

    // The message survives the reconnect and drains on the next open
    factory.connection(0).drop_connection();
    settle().await;
    advance(Duration::from_millis(50)).await;
    settle().await;
    factory.last().open();
    settle().await;

    assert_eq!(factory.last().sent_types(), vec!["important"]);
    let status = client.status().await.unwrap();
    assert_eq!(status.queued, 0);
}

#[tokio::test(start_paused = true)]
async fn test_fallback_preferred_when_available() {
    let (client, factory) = start(
        ClientConfig::testing("ws://localhost:5001/ws").with_fallback(),
    );
    let connected = collect(&client, EVENT_CONNECTED);
    settle().await;

    assert_eq!(factory.attempts(), vec![TransportMode::Fallback]);
    factory.last().open();
    settle().await;
    assert_eq!(
        connected.lock().unwrap()[0],
        json!({"transport": "fallback"})
    );
}

#[tokio::test(start_paused = true)]
async fn test_fallback_downgrade_is_sticky() {
    let factory = Arc::new(MockFactory::default());
    factory.fail_fallback.store(true, Ordering::SeqCst);
    let client = PushClient::init(
        ClientConfig::testing("ws://localhost:5001/ws").with_fallback(),
        Arc::clone(&factory) as Arc<dyn TransportFactory>,
    )
    .unwrap();
    settle().await;

    // First attempt tried fallback, failed, and downgraded within the same
    // connect call
    assert_eq!(
        factory.attempts(),
        vec![TransportMode::Fallback, TransportMode::Primary]
    );
    factory.last().open();
    settle().await;

    // Downgrade persists: the reconnect after a drop goes straight to primary
    factory.last().drop_connection();
    settle().await;
    advance(Duration::from_millis(50)).await;
    settle().await;
    assert_eq!(
        factory.attempts(),
        vec![
            TransportMode::Fallback,
            TransportMode::Primary,
            TransportMode::Primary,
        ]
    );

    let _ = client;
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_keeps_retrying() {
    let factory = Arc::new(MockFactory::default());
    factory.fail_all.store(true, Ordering::SeqCst);
    let client = PushClient::init(
        ClientConfig::testing("ws://localhost:5001/ws"),
        Arc::clone(&factory) as Arc<dyn TransportFactory>,
    )
    .unwrap();
    settle().await;

    let status = client.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::Closed);
    assert!(status.reconnect_scheduled);

    advance(Duration::from_millis(50)).await;
    settle().await;
    advance(Duration::from_millis(50)).await;
    settle().await;
    assert_eq!(factory.attempts().len(), 3);

    // Recovery: the next retry succeeds and the attempt counter clears
    factory.fail_all.store(false, Ordering::SeqCst);
    advance(Duration::from_millis(50)).await;
    settle().await;
    factory.last().open();
    settle().await;

    let status = client.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::Open);
    assert_eq!(status.reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_close_is_terminal() {
    let (client, factory) = start(ClientConfig::testing("ws://localhost:5001/ws"));
    settle().await;
    factory.last().open();
    settle().await;

    client.send("queued_then_dropped", json!(null), None);
    factory.last().fail_sends.store(true, Ordering::SeqCst);
    client.send("stuck", json!(null), None);
    settle().await;

    client.close();
    settle().await;

    let status = client.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::Closed);
    assert_eq!(status.queued, 0);
    assert!(!status.heartbeat_running);
    assert!(!status.reconnect_scheduled);
    assert!(factory.last().closed.load(Ordering::SeqCst));

    // No reconnect ever fires, and later sends queue without flushing
    advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(factory.connection_count(), 1);

    client.send("after_close", json!(null), None);
    settle().await;
    let status = client.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::Closed);
    assert_eq!(status.queued, 1);
}

#[tokio::test(start_paused = true)]
async fn test_bounded_queue_evicts_oldest() {
    let (client, factory) = start(
        ClientConfig::testing("ws://localhost:5001/ws").with_max_queue_len(2),
    );
    client.send("a", json!(null), None);
    client.send("b", json!(null), None);
    client.send("c", json!(null), None);
    settle().await;

    let status = client.status().await.unwrap();
    assert_eq!(status.queued, 2);
    assert_eq!(status.queue_stats.dropped, 1);

    factory.last().open();
    settle().await;
    assert_eq!(factory.last().sent_types(), vec!["b", "c"]);
}
