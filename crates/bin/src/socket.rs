//! Chunk-server sockets over tokio-tungstenite.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use client::error::ConnectError;
use client::network::{Connection, LinkState, Transport, ws_url};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tracing::{debug, error, info, warn};

const CONNECTING: u8 = 0;
const OPEN: u8 = 1;
const CLOSED: u8 = 2;

#[derive(Default)]
struct Shared {
    inbox: Mutex<Vec<String>>,
    /// One of `CONNECTING`, `OPEN`, `CLOSED`. Only ever moves forward.
    state: AtomicU8,
}

impl Shared {
    fn advance(&self, to: u8) -> u8 {
        self.state.fetch_max(to, Ordering::AcqRel)
    }

    fn link_state(&self) -> LinkState {
        match self.state.load(Ordering::Acquire) {
            CONNECTING => LinkState::Connecting,
            OPEN => LinkState::Open,
            _ => LinkState::Closed,
        }
    }
}

/// Sends go through a channel to the socket task, so anything sent before
/// the handshake completes is delivered once it does.
pub struct SocketConnection {
    outbound: mpsc::UnboundedSender<Message>,
    shared: Arc<Shared>,
}

impl SocketConnection {
    fn open(address: &str) -> Result<Self, ConnectError> {
        let request = ws_url(address)
            .into_client_request()
            .map_err(|e| ConnectError::new(address, e.to_string()))?;
        let (outbound, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        tokio::spawn(run_socket(request, rx, shared.clone()));
        Ok(Self { outbound, shared })
    }
}

impl Connection for SocketConnection {
    fn send(&mut self, text: String) {
        if self.state() == LinkState::Closed {
            debug!("Dropping send on closed socket");
            return;
        }
        if self.outbound.send(Message::text(text)).is_err() {
            debug!("Socket task gone, dropping send");
        }
    }

    fn drain(&mut self) -> Vec<String> {
        match self.shared.inbox.lock() {
            Ok(mut inbox) => std::mem::take(&mut *inbox),
            Err(_) => Vec::new(),
        }
    }

    fn close(&mut self) {
        if self.shared.advance(CLOSED) != CLOSED {
            let _ = self.outbound.send(Message::Close(None));
        }
    }

    fn state(&self) -> LinkState {
        self.shared.link_state()
    }
}

/// Handle one socket: connect, then pump the outbound channel and the read
/// half until either side closes.
async fn run_socket(request: Request, mut outbound: mpsc::UnboundedReceiver<Message>, shared: Arc<Shared>) {
    let url = request.uri().to_string();
    let ws_stream = match tokio_tungstenite::connect_async(request).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            error!("Failed to connect to {}: {}", url, e);
            shared.advance(CLOSED);
            return;
        }
    };
    info!("Connected to {}", url);
    shared.advance(OPEN);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = outbound.recv() => {
                match msg {
                    Some(msg) => {
                        let closing = matches!(msg, Message::Close(_));
                        if let Err(e) = write.send(msg).await {
                            warn!("Send to {} failed: {}", url, e);
                            break;
                        }
                        if closing {
                            break;
                        }
                    }
                    // Connection handle dropped.
                    None => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(mut inbox) = shared.inbox.lock() {
                            inbox.push(text.as_str().to_owned());
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("{} closed the connection", url);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", url, e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }
        }
    }

    shared.advance(CLOSED);
    debug!("Socket task for {} finished", url);
}

/// Must be used from inside a tokio runtime.
pub struct SocketTransport;

impl Transport for SocketTransport {
    fn connect(&mut self, address: &str) -> Result<Box<dyn Connection>, ConnectError> {
        Ok(Box::new(SocketConnection::open(address)?))
    }
}
