//! Terminal session lifecycle and message pump

use std::future::IntoFuture;
use std::sync::{Arc, Weak};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::channel::{ChannelEvent, TerminalChannel};
use super::events::EventBus;
use super::protocol::{channel_url, normalize_base_url, ws_url_from_base};
use super::registry::SessionRegistry;
use super::rest::TerminalRestClient;
use super::types::{
    DEFAULT_BASE_URL, RequestSettings, Result, SessionOptions, SessionState, TerminalError,
    TerminalMessage,
};

/// Create a terminal session or connect to an existing one.
///
/// If `registry` already tracks a connection for the requested name, that
/// connection is returned instead of opening a second channel.
pub fn create_session(options: SessionOptions, registry: &SessionRegistry) -> PendingConnection {
    if let Some(name) = options.requested_name() {
        if let Some(existing) = registry.get(name) {
            debug!("Reusing connection for terminal {}", name);
            return existing;
        }
    }
    TerminalSession::new(options, registry.clone()).connect()
}

/// Client side of one remote pseudo-terminal
pub struct TerminalSession {
    base_url: String,
    ws_url: String,
    settings: RequestSettings,
    rest: TerminalRestClient,
    registry: SessionRegistry,
    status_tx: watch::Sender<SessionState>,
    status_rx: watch::Receiver<SessionState>,
    inner: Mutex<SessionInner>,
    message_received: EventBus<TerminalMessage>,
}

#[derive(Default)]
struct SessionInner {
    name: Option<String>,
    url: Option<String>,
    channel: Option<TerminalChannel>,
    driver: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

impl TerminalSession {
    /// Create an unconnected session
    pub fn new(options: SessionOptions, registry: SessionRegistry) -> Arc<Self> {
        let name = options.requested_name().map(str::to_string);
        let base_url = normalize_base_url(options.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL));
        let ws_url = match options.ws_url.as_deref() {
            Some(ws_url) => normalize_base_url(ws_url),
            None => ws_url_from_base(&base_url),
        };
        let settings = options.settings.unwrap_or_default();
        let (status_tx, status_rx) = watch::channel(SessionState::Unconnected);

        Arc::new(Self {
            rest: TerminalRestClient::new(base_url.clone(), settings.clone()),
            base_url,
            ws_url,
            settings,
            registry,
            status_tx,
            status_rx,
            inner: Mutex::new(SessionInner {
                name,
                ..Default::default()
            }),
            message_received: EventBus::new(),
        })
    }

    /// Session name; `None` until the server has assigned one
    pub fn name(&self) -> Option<String> {
        self.inner.lock().name.clone()
    }

    /// WebSocket URL; `None` until the channel has opened
    pub fn url(&self) -> Option<String> {
        self.inner.lock().url.clone()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn state(&self) -> SessionState {
        self.status_rx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.status_rx.borrow(), SessionState::Connected)
    }

    pub fn is_disposed(&self) -> bool {
        matches!(*self.status_rx.borrow(), SessionState::Disposed)
    }

    /// Subscribe to decoded messages from the server
    pub fn message_received(&self) -> mpsc::UnboundedReceiver<TerminalMessage> {
        self.message_received.subscribe()
    }

    /// Watch lifecycle transitions, including an unexpected channel close
    pub fn status_changed(&self) -> watch::Receiver<SessionState> {
        self.status_tx.subscribe()
    }

    /// Start connecting, or join the attempt already under way.
    ///
    /// Must be called from within a Tokio runtime. A disposed session never
    /// reconnects; its outcome is `TerminalError::Disposed`.
    pub fn connect(self: &Arc<Self>) -> PendingConnection {
        let mut inner = self.inner.lock();
        if !matches!(*self.status_rx.borrow(), SessionState::Unconnected) {
            return self.pending();
        }

        match inner.name.clone() {
            Some(name) => self.registry.claim(&name, || {
                self.set_state(SessionState::ChannelOpening);
                inner.driver = Some(self.spawn_driver(Some(name.clone())));
                self.pending()
            }),
            None => {
                self.set_state(SessionState::NamePending);
                inner.driver = Some(self.spawn_driver(None));
                self.pending()
            }
        }
    }

    /// Send a message to the terminal
    pub fn send(&self, message: &TerminalMessage) -> Result<()> {
        let inner = self.inner.lock();
        match self.state() {
            SessionState::Connected => {}
            SessionState::Closed(reason) => {
                return Err(TerminalError::Channel(format!(
                    "terminal channel closed: {}",
                    reason
                )));
            }
            SessionState::Disposed => {
                return Err(TerminalError::Usage("session is disposed".to_string()));
            }
            other => {
                return Err(TerminalError::Usage(format!(
                    "session is not connected ({:?})",
                    other
                )));
            }
        }

        let frame = message.to_frame()?;
        let channel = inner
            .channel
            .as_ref()
            .ok_or_else(|| TerminalError::Channel("WebSocket not connected".to_string()))?;
        debug!("Sending {} message", message.kind);
        channel.send(frame)
    }

    /// Shut down the remote terminal, then dispose this session
    pub async fn shutdown(&self) -> Result<()> {
        let name = self
            .name()
            .ok_or_else(|| TerminalError::Usage("terminal session has no name".to_string()))?;
        self.rest.delete_terminal(&name).await?;
        self.dispose();
        Ok(())
    }

    /// Release the channel, the registry entry and all subscribers; idempotent
    pub fn dispose(&self) {
        let mut inner = self.inner.lock();
        if self.is_disposed() {
            return;
        }

        if let Some(driver) = inner.driver.take() {
            driver.abort();
        }
        if let Some(pump) = inner.pump.take() {
            pump.abort();
        }
        if let Some(channel) = inner.channel.take() {
            channel.close();
        }
        if let Some(name) = inner.name.as_deref() {
            self.registry.remove(name, self);
        }
        self.set_state(SessionState::Disposed);
        self.message_received.close();

        info!(
            "Disposed terminal session {}",
            inner.name.as_deref().unwrap_or("<unnamed>")
        );
    }

    pub(crate) fn pending(self: &Arc<Self>) -> PendingConnection {
        PendingConnection {
            session: self.clone(),
            status: self.status_tx.subscribe(),
        }
    }

    // Callers hold `inner` so transitions stay consistent with it.
    fn set_state(&self, state: SessionState) {
        self.status_tx.send_replace(state);
    }

    fn spawn_driver(self: &Arc<Self>, name: Option<String>) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            if let Err(e) = session.drive(name).await {
                session.fail(e);
            }
        })
    }

    async fn drive(self: &Arc<Self>, name: Option<String>) -> Result<()> {
        let name = match name {
            Some(name) => name,
            None => {
                let model = self.rest.create_terminal().await?;
                self.assign_name(model.name)?
            }
        };

        let url = channel_url(&self.ws_url, &name)?;
        let (channel, events) = TerminalChannel::open(&url, &self.settings).await?;
        self.attach_channel(url, channel, events)
    }

    fn assign_name(self: &Arc<Self>, name: String) -> Result<String> {
        let mut inner = self.inner.lock();
        if self.is_disposed() {
            return Err(TerminalError::Disposed);
        }
        if name.is_empty() {
            return Err(TerminalError::Protocol(
                "server returned an empty terminal name".to_string(),
            ));
        }

        inner.name = Some(name.clone());
        if let Some(previous) = self.registry.register(&name, self.pending()) {
            warn!(
                "Terminal {} was still registered to another session; replacing it",
                name
            );
            drop(previous);
        }
        self.set_state(SessionState::ChannelOpening);
        debug!("Server assigned terminal name {}", name);
        Ok(name)
    }

    fn attach_channel(
        self: &Arc<Self>,
        url: String,
        channel: TerminalChannel,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        if self.is_disposed() {
            channel.close();
            return Err(TerminalError::Disposed);
        }

        info!("Terminal session connected at {}", url);
        inner.url = Some(url);
        inner.channel = Some(channel);
        inner.pump = Some(self.spawn_pump(events));
        self.set_state(SessionState::Connected);
        Ok(())
    }

    fn fail(&self, err: TerminalError) {
        let mut inner = self.inner.lock();
        if self.state().is_settled() {
            return;
        }

        error!(
            "Failed to connect terminal {}: {}",
            inner.name.as_deref().unwrap_or("<unnamed>"),
            err
        );
        if let Some(channel) = inner.channel.take() {
            channel.close();
        }
        if let Some(name) = inner.name.as_deref() {
            self.registry.remove(name, self);
        }
        self.set_state(SessionState::Failed(err));
        self.message_received.close();
    }

    fn spawn_pump(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> JoinHandle<()> {
        let session: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(session) = session.upgrade() else {
                    break;
                };
                match event {
                    ChannelEvent::Text(text) => session.handle_frame(&text),
                    ChannelEvent::Closed { reason } => {
                        session.handle_closed(reason);
                        break;
                    }
                }
            }
        })
    }

    fn handle_frame(&self, text: &str) {
        match TerminalMessage::from_frame(text) {
            Ok(message) => {
                self.message_received.emit(message);
            }
            Err(e) => {
                debug!("Dropping terminal frame: {}", e);
            }
        }
    }

    fn handle_closed(&self, reason: String) {
        let mut inner = self.inner.lock();
        if !matches!(*self.status_rx.borrow(), SessionState::Connected) {
            return;
        }

        warn!(
            "Terminal {} channel closed: {}",
            inner.name.as_deref().unwrap_or("<unnamed>"),
            reason
        );
        inner.channel.take();
        inner.pump.take();
        if let Some(name) = inner.name.as_deref() {
            self.registry.remove(name, self);
        }
        self.set_state(SessionState::Closed(reason));
        self.message_received.close();
    }
}

impl std::fmt::Debug for TerminalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSession")
            .field("name", &self.name())
            .field("base_url", &self.base_url)
            .field("ws_url", &self.ws_url)
            .field("state", &self.state())
            .finish()
    }
}

/// Shared outcome of a session's connect attempt.
///
/// Any number of clones may await it; all observe the same result.
#[derive(Clone)]
pub struct PendingConnection {
    session: Arc<TerminalSession>,
    status: watch::Receiver<SessionState>,
}

impl PendingConnection {
    /// The session being connected
    pub fn session(&self) -> &Arc<TerminalSession> {
        &self.session
    }

    pub fn is_settled(&self) -> bool {
        self.status.borrow().is_settled()
    }

    /// Wait for the channel to open
    pub async fn wait(mut self) -> Result<Arc<TerminalSession>> {
        let state = match self.status.wait_for(SessionState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => SessionState::Disposed,
        };

        match state {
            SessionState::Connected => Ok(self.session),
            SessionState::Failed(err) => Err(err),
            SessionState::Closed(reason) => Err(TerminalError::Channel(reason)),
            _ => Err(TerminalError::Disposed),
        }
    }
}

impl IntoFuture for PendingConnection {
    type Output = Result<Arc<TerminalSession>>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

impl std::fmt::Debug for PendingConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingConnection")
            .field("name", &self.session.name())
            .field("state", &*self.status.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconnected(name: Option<&str>) -> Arc<TerminalSession> {
        let mut options = SessionOptions::new().with_base_url("http://localhost:8888");
        options.name = name.map(str::to_string);
        TerminalSession::new(options, SessionRegistry::new())
    }

    #[test]
    fn test_new_session_defaults() {
        let session = unconnected(Some("1"));
        assert_eq!(session.name().as_deref(), Some("1"));
        assert_eq!(session.base_url(), "http://localhost:8888/");
        assert_eq!(session.ws_url(), "ws://localhost:8888/");
        assert_eq!(session.url(), None);
        assert_eq!(session.state(), SessionState::Unconnected);
    }

    #[test]
    fn test_explicit_ws_url() {
        let options = SessionOptions::new()
            .with_base_url("https://hub.example/user/a/")
            .with_ws_url("wss://ws.example/user/a");
        let session = TerminalSession::new(options, SessionRegistry::new());
        assert_eq!(session.ws_url(), "wss://ws.example/user/a/");
    }

    #[test]
    fn test_send_before_connect_is_usage_error() {
        let session = unconnected(Some("1"));
        let result = session.send(&TerminalMessage::stdin("ls\n"));
        assert!(matches!(result, Err(TerminalError::Usage(_))));
    }

    #[test]
    fn test_dispose_before_connect() {
        let session = unconnected(None);
        let mut messages = session.message_received();
        session.dispose();
        session.dispose();

        assert!(session.is_disposed());
        assert!(matches!(
            session.send(&TerminalMessage::stdin("x")),
            Err(TerminalError::Usage(_))
        ));
        tokio_test::block_on(async {
            assert!(messages.recv().await.is_none());
        });
    }

    #[tokio::test]
    async fn test_disposed_session_never_connects() {
        let session = unconnected(Some("5"));
        session.dispose();

        let result = session.connect().await;
        assert_eq!(result.unwrap_err(), TerminalError::Disposed);
        assert_eq!(session.state(), SessionState::Disposed);
    }

    #[tokio::test]
    async fn test_shutdown_without_name_is_usage_error() {
        let session = unconnected(None);
        let result = session.shutdown().await;
        assert!(matches!(result, Err(TerminalError::Usage(_))));
    }
}
