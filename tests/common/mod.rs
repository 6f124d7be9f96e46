//! Mock terminal server used by the integration tests
//!
//! HTTP endpoints are served by `wiremock`; this module provides the
//! WebSocket side, which echoes `stdin` frames back as `stdout`.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::Message;

#[derive(Default)]
struct ServerState {
    accepted: AtomicUsize,
    closed: AtomicUsize,
    paths: Mutex<Vec<String>>,
    authorization: Mutex<Vec<Option<String>>>,
    frames: Mutex<Vec<String>>,
}

/// WebSocket endpoint speaking the terminal wire protocol
pub struct MockTerminalServer {
    ws_url: String,
    state: Arc<ServerState>,
}

impl MockTerminalServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(ServerState::default());

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle_connection(stream, accept_state.clone()));
            }
        });

        Self {
            ws_url: format!("ws://{}/", addr),
            state,
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Completed WebSocket handshakes
    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    /// Connections that have ended
    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.state.paths.lock().unwrap().clone()
    }

    pub fn authorization(&self) -> Vec<Option<String>> {
        self.state.authorization.lock().unwrap().clone()
    }

    /// Text frames received from clients, in order
    pub fn frames(&self) -> Vec<String> {
        self.state.frames.lock().unwrap().clone()
    }

    pub async fn wait_for_closed(&self, count: usize) -> bool {
        wait_until(|| self.closed() >= count).await
    }

    pub async fn wait_for_frames(&self, count: usize) -> bool {
        wait_until(|| self.frames().len() >= count).await
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<ServerState>) {
    let handshake_state = state.clone();
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        handshake_state
            .paths
            .lock()
            .unwrap()
            .push(request.uri().path().to_string());
        handshake_state.authorization.lock().unwrap().push(
            request
                .headers()
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
        );
        Ok(response)
    };

    let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
        return;
    };
    state.accepted.fetch_add(1, Ordering::SeqCst);

    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Text(text)) => {
                state.frames.lock().unwrap().push(text.clone());
                let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                match items.first().and_then(Value::as_str) {
                    Some("stdin") => {
                        let mut reply = vec![json!("stdout")];
                        reply.extend(items[1..].iter().cloned());
                        if ws
                            .send(Message::Text(Value::Array(reply).to_string()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some("disconnect") => {
                        let _ = ws
                            .send(Message::Text(json!(["disconnect", 1]).to_string()))
                            .await;
                        let _ = ws.close(None).await;
                    }
                    _ => {}
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    state.closed.fetch_add(1, Ordering::SeqCst);
}

/// A listener that accepts TCP connections but never answers the handshake
pub struct HangingServer {
    ws_url: String,
}

impl HangingServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        Self {
            ws_url: format!("ws://{}/", addr),
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }
}

/// Poll `check` for up to five seconds
pub async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}
