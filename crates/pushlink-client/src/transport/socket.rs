//! WebSocket-backed transport
//!
//! Both transport modes run over the same socket pump; they differ only in
//! the frame codec. `connect` spawns the pump task and returns immediately;
//! the manager observes open/close/error through the event channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use pushlink_core::{TransportError, WireMessage};

use super::{FrameCodec, Transport, TransportEvent, TransportMode};

// ----------------------------------------------------------------------------
// Socket Transport
// ----------------------------------------------------------------------------

/// WebSocket transport; framing is delegated to the codec
pub struct SocketTransport {
    mode: TransportMode,
    codec: Arc<dyn FrameCodec>,
    events: mpsc::UnboundedSender<TransportEvent>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    ready: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
}

impl SocketTransport {
    pub fn new(
        mode: TransportMode,
        codec: Box<dyn FrameCodec>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            mode,
            codec: Arc::from(codec),
            events,
            outbound: None,
            ready: Arc::new(AtomicBool::new(false)),
            pump: None,
        }
    }
}

#[async_trait]
impl Transport for SocketTransport {
    async fn connect(&mut self, url: &str) -> Result<(), TransportError> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.outbound = Some(outbound_tx);

        let pump = run_pump(
            url.to_string(),
            Arc::clone(&self.codec),
            self.events.clone(),
            outbound_rx,
            Arc::clone(&self.ready),
        );
        self.pump = Some(tokio::spawn(pump));
        Ok(())
    }

    async fn send(&mut self, message: &WireMessage) -> Result<(), TransportError> {
        if !self.is_ready() {
            return Err(TransportError::NotReady);
        }
        let frame = self.codec.encode(message)?;
        let outbound = self.outbound.as_ref().ok_or(TransportError::NotReady)?;
        outbound
            .send(frame)
            .map_err(|_| TransportError::send_failed("socket writer is gone"))
    }

    async fn close(&mut self) {
        let was_ready = self.ready.swap(false, Ordering::SeqCst);
        // Dropping the outbound sender makes an open pump send a Close frame
        // and wind down on its own.
        self.outbound = None;
        if let Some(pump) = self.pump.take() {
            if !was_ready {
                // Still dialing or already dead; nothing to close gracefully.
                pump.abort();
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn mode(&self) -> TransportMode {
        self.mode
    }
}

// ----------------------------------------------------------------------------
// Socket Pump
// ----------------------------------------------------------------------------

/// Dials the server and shuttles frames in both directions until the
/// connection dies or the transport is closed locally
async fn run_pump(
    url: String,
    codec: Arc<dyn FrameCodec>,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    ready: Arc<AtomicBool>,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let _ = events.send(TransportEvent::Error {
                reason: e.to_string(),
            });
            return;
        }
    };
    let (mut sink, mut source) = stream.split();

    for frame in codec.on_open_frames() {
        if let Err(e) = sink.send(Message::Text(frame)).await {
            let _ = events.send(TransportEvent::Error {
                reason: e.to_string(),
            });
            return;
        }
    }

    ready.store(true, Ordering::SeqCst);
    let _ = events.send(TransportEvent::Opened);
    debug!(%url, "socket pump running");

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        ready.store(false, Ordering::SeqCst);
                        let _ = events.send(TransportEvent::Error { reason: e.to_string() });
                        break;
                    }
                }
                // Local close: the transport owner dropped the sender
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = codec.decode(&text) {
                        let _ = events.send(event);
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    ready.store(false, Ordering::SeqCst);
                    let _ = events.send(TransportEvent::Closed);
                    break;
                }
                Some(Ok(_)) => {
                    // Control frames and binary payloads are not part of the
                    // protocol; ignore them.
                }
                Some(Err(e)) => {
                    ready.store(false, Ordering::SeqCst);
                    warn!(error = %e, "socket read failed");
                    let _ = events.send(TransportEvent::Error { reason: e.to_string() });
                    break;
                }
            },
        }
    }

    ready.store(false, Ordering::SeqCst);
    debug!(%url, "socket pump stopped");
}
