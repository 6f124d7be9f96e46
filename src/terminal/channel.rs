//! Terminal WebSocket channel implementation

use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use tracing::{debug, info, warn};

use super::types::{RequestSettings, Result, TerminalError};

/// Events produced by an open channel, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// An inbound text frame
    Text(String),
    /// The connection ended without a local `close()`
    Closed { reason: String },
}

/// Full-duplex WebSocket connection to one terminal.
///
/// A background task owns the socket; outbound frames are queued to it and
/// inbound frames are forwarded on the event receiver returned by `open`.
pub struct TerminalChannel {
    url: String,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

impl TerminalChannel {
    /// Connect and resolve once the handshake has completed
    pub async fn open(
        url: &str,
        settings: &RequestSettings,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ChannelEvent>)> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TerminalError::Channel(format!("Invalid channel URL {}: {}", url, e)))?;

        for (name, value) in settings.header_pairs() {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TerminalError::Channel(format!("Invalid header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| TerminalError::Channel(format!("Invalid header {}: {}", name, e)))?;
            request.headers_mut().insert(header, value);
        }

        debug!("Opening terminal channel {}", url);
        let (ws_stream, _) = connect_async(request).await.map_err(|e| {
            TerminalError::Channel(format!("Failed to connect to WebSocket: {}", e))
        })?;
        info!("Connected to terminal channel at {}", url);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_channel(
            ws_stream,
            outbound_rx,
            event_tx,
            url.to_string(),
        ));

        let channel = Self {
            url: url.to_string(),
            outbound: Mutex::new(Some(outbound_tx)),
        };
        Ok((channel, event_rx))
    }

    /// Queue a text frame for sending
    pub fn send(&self, text: String) -> Result<()> {
        let outbound = self.outbound.lock();
        match outbound.as_ref() {
            Some(tx) => tx
                .send(Message::Text(text))
                .map_err(|_| TerminalError::Channel("WebSocket connection closed".to_string())),
            None => Err(TerminalError::Channel("WebSocket not connected".to_string())),
        }
    }

    /// Flush queued frames and close the connection; idempotent
    pub fn close(&self) {
        if self.outbound.lock().take().is_some() {
            debug!("Closing terminal channel {}", self.url);
        }
    }
}

async fn run_channel(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    event_tx: mpsc::UnboundedSender<ChannelEvent>,
    url: String,
) {
    let (mut sink, mut stream) = ws_stream.split();
    let mut close_reason: Option<String> = None;

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(message) => {
                        if let Err(e) = sink.send(message).await {
                            warn!("Failed to write to {}: {}", url, e);
                            let _ = event_tx.send(ChannelEvent::Closed {
                                reason: format!("WebSocket send error: {}", e),
                            });
                            return;
                        }
                    }
                    None => {
                        if let Err(e) = sink.close().await {
                            debug!("Error closing WebSocket connection {}: {}", url, e);
                        }
                        info!("Closed terminal channel {}", url);
                        return;
                    }
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received frame on {}: {}", url, text);
                        if event_tx.send(ChannelEvent::Text(text)).is_err() {
                            debug!("Channel listener for {} went away", url);
                            let _ = sink.close().await;
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        // Keep reading so the close handshake completes.
                        close_reason = Some(match frame {
                            Some(frame) => format!(
                                "closed by server ({} {})",
                                u16::from(frame.code),
                                frame.reason
                            ),
                            None => "closed by server".to_string(),
                        });
                    }
                    Some(Ok(other)) => {
                        debug!("Ignoring non-text frame on {}: {:?}", url, other);
                    }
                    Some(Err(e)) => {
                        let reason = close_reason
                            .take()
                            .unwrap_or_else(|| format!("WebSocket message error: {}", e));
                        let _ = event_tx.send(ChannelEvent::Closed { reason });
                        return;
                    }
                    None => {
                        let reason = close_reason
                            .take()
                            .unwrap_or_else(|| "connection closed".to_string());
                        let _ = event_tx.send(ChannelEvent::Closed { reason });
                        return;
                    }
                }
            }
        }
    }
}
